//! Barycentric coordinates and containment predicates for tetrahedra
//!
//! Two formulations are provided. `barycentric` uses scalar triple products
//! (sub-volume ratios) and is the one used for point location.
//! `barycentric_by_inverse` solves the same 3x3 system with a general matrix
//! inverse and exists to cross-check the fast path.

use nalgebra::{Matrix3, Vector3};
use probecrate_core::Point3f;

/// Relative volume below which a tetrahedron is treated as flat
const DEGENERATE_VOLUME: f64 = 1e-9;

#[inline]
fn to_f64(p: &Point3f) -> Vector3<f64> {
    Vector3::new(p.x as f64, p.y as f64, p.z as f64)
}

#[inline]
fn triple(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> f64 {
    a.dot(&b.cross(c))
}

/// Six times the signed volume of tetrahedron `(a, b, c, d)`
pub fn signed_volume6(a: &Point3f, b: &Point3f, c: &Point3f, d: &Point3f) -> f64 {
    let a = to_f64(a);
    triple(&(to_f64(b) - a), &(to_f64(c) - a), &(to_f64(d) - a))
}

fn is_flat(volume6: f64, u: &Vector3<f64>, v: &Vector3<f64>, w: &Vector3<f64>) -> bool {
    let scale = u.norm().max(v.norm()).max(w.norm());
    scale == 0.0 || volume6.abs() <= DEGENERATE_VOLUME * scale * scale * scale
}

/// Barycentric weights of `p` with respect to `tet`, by volume ratios.
///
/// Returns `None` for a flat tetrahedron. The weights always sum to one; a
/// negative weight means `p` lies outside the face opposite that corner.
pub fn barycentric(p: &Point3f, tet: &[Point3f; 4]) -> Option<[f32; 4]> {
    let a = to_f64(&tet[0]);
    let u = to_f64(&tet[1]) - a;
    let v = to_f64(&tet[2]) - a;
    let w = to_f64(&tet[3]) - a;
    let q = to_f64(p) - a;

    let total = triple(&u, &v, &w);
    if is_flat(total, &u, &v, &w) {
        return None;
    }

    let wb = triple(&q, &v, &w) / total;
    let wc = triple(&u, &q, &w) / total;
    let wd = triple(&u, &v, &q) / total;
    let wa = 1.0 - wb - wc - wd;

    Some([wa as f32, wb as f32, wc as f32, wd as f32])
}

/// Barycentric weights of `p` by inverting the edge matrix
pub fn barycentric_by_inverse(p: &Point3f, tet: &[Point3f; 4]) -> Option<[f32; 4]> {
    let a = to_f64(&tet[0]);
    let u = to_f64(&tet[1]) - a;
    let v = to_f64(&tet[2]) - a;
    let w = to_f64(&tet[3]) - a;

    if is_flat(triple(&u, &v, &w), &u, &v, &w) {
        return None;
    }

    let edges = Matrix3::from_columns(&[u, v, w]);
    let inverse = edges.try_inverse()?;
    let lambda = inverse * (to_f64(p) - a);

    Some([
        (1.0 - lambda.x - lambda.y - lambda.z) as f32,
        lambda.x as f32,
        lambda.y as f32,
        lambda.z as f32,
    ])
}

/// Whether a weight vector describes a point inside (or on) its tetrahedron
pub fn is_inside(weights: &[f32; 4], tolerance: f32) -> bool {
    let sum: f32 = weights.iter().sum();
    weights.iter().all(|&w| w >= -tolerance) && (sum - 1.0).abs() <= tolerance.max(1e-4)
}
