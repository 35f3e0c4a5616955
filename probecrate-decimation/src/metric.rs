//! Color comparison metrics
//!
//! A metric moves colors into a working space (identity, luma/chroma, or luma
//! only) and applies fixed per-channel weights before they are compared.

use nalgebra::{Matrix3, Vector3};
use probecrate_core::Color;
use serde::{Deserialize, Serialize};

/// BT.601 RGB -> YCbCr
const YCBCR: Matrix3<f32> = Matrix3::new(
    0.299, 0.587, 0.114,
    -0.168_736, -0.331_264, 0.5,
    0.5, -0.418_688, -0.081_312,
);

/// Working space and channel weights used to compare colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Metric {
    /// Plain RGB, equal weights
    #[default]
    Rgb,
    /// YCbCr with the error concentrated on the chroma channels
    Chrominance,
    /// Luma only, replicated across all three components
    Luminance,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Rgb, Metric::Chrominance, Metric::Luminance];

    /// Fixed per-channel weights
    pub fn weights(&self) -> Vector3<f32> {
        match self {
            Metric::Rgb => Vector3::new(0.33, 0.33, 0.33),
            Metric::Chrominance => Vector3::new(0.1, 0.45, 0.45),
            Metric::Luminance => Vector3::new(1.0, 0.0, 0.0),
        }
    }

    /// Number of leading channels that carry information
    pub fn active_channels(&self) -> usize {
        match self {
            Metric::Luminance => 1,
            Metric::Rgb | Metric::Chrominance => 3,
        }
    }

    /// Move a color into this metric's working space
    pub fn transform(&self, color: &Color) -> Vector3<f32> {
        match self {
            Metric::Rgb => *color,
            Metric::Chrominance => YCBCR * color,
            Metric::Luminance => {
                let luma = YCBCR.row(0).transpose().dot(color);
                Vector3::new(luma, luma, luma)
            }
        }
    }

    /// Weighted working-space difference `w * (T(estimate) - T(reference))`
    pub fn difference(&self, estimate: &Color, reference: &Color) -> Vector3<f32> {
        self.weights()
            .component_mul(&(self.transform(estimate) - self.transform(reference)))
    }

    /// Weighted working-space values `(w * T(estimate), w * T(reference))`
    pub fn evaluation_pair(&self, estimate: &Color, reference: &Color) -> (Vector3<f32>, Vector3<f32>) {
        let w = self.weights();
        (
            w.component_mul(&self.transform(estimate)),
            w.component_mul(&self.transform(reference)),
        )
    }
}
