//! Blending of corner radiance encodings

use crate::graph::EvaluationMapping;
use probecrate_core::ShL2;

/// Linear blend `Σ weights[i] * encodings[corners[i]]`.
///
/// Weights are used as given. Zero weights are skipped so a one-hot weight
/// vector reproduces the corner encoding bit for bit.
pub fn interpolate(corners: &[usize; 4], weights: &[f32; 4], encodings: &[ShL2]) -> ShL2 {
    let mut blended = ShL2::zero();
    for (&corner, &weight) in corners.iter().zip(weights.iter()) {
        if weight == 0.0 {
            continue;
        }
        if weight == 1.0 {
            blended += encodings[corner];
        } else {
            blended.add_scaled(&encodings[corner], weight);
        }
    }
    blended
}

/// Interpolate the encoding seen by a mapped evaluation point
pub fn interpolate_mapping(mapping: &EvaluationMapping, encodings: &[ShL2]) -> Option<ShL2> {
    if !mapping.is_mapped() {
        return None;
    }
    Some(interpolate(&mapping.corners, &mapping.weights, encodings))
}
