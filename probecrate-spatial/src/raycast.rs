//! Ray casting against tetrahedron faces

use nalgebra::Vector3;
use probecrate_core::{Point3f, Vector3f};

const PARALLEL_EPS: f64 = 1e-12;
const EDGE_EPS: f64 = 1e-7;
const MIN_T: f64 = 1e-7;

/// The four faces of a tetrahedron as corner slots, paired with the slot
/// each face excludes
pub const TETRAHEDRON_FACES: [([usize; 3], usize); 4] = [
    ([1, 2, 3], 0),
    ([0, 2, 3], 1),
    ([0, 1, 3], 2),
    ([0, 1, 2], 3),
];

/// A ray–triangle hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    /// Ray parameter, strictly positive
    pub t: f64,
    /// Barycentric weights of the hit point for the triangle's three corners
    pub weights: [f32; 3],
}

/// Möller–Trumbore ray/triangle intersection.
///
/// `direction` does not need to be normalized; `t` is expressed in its units.
pub fn ray_triangle(
    origin: &Point3f,
    direction: &Vector3f,
    a: &Point3f,
    b: &Point3f,
    c: &Point3f,
) -> Option<TriangleHit> {
    let o = Vector3::new(origin.x as f64, origin.y as f64, origin.z as f64);
    let d = Vector3::new(direction.x as f64, direction.y as f64, direction.z as f64);
    let a = Vector3::new(a.x as f64, a.y as f64, a.z as f64);
    let e1 = Vector3::new(b.x as f64, b.y as f64, b.z as f64) - a;
    let e2 = Vector3::new(c.x as f64, c.y as f64, c.z as f64) - a;

    let h = d.cross(&e2);
    let det = e1.dot(&h);
    if det.abs() < PARALLEL_EPS {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = o - a;
    let u = inv_det * s.dot(&h);
    if !(-EDGE_EPS..=1.0 + EDGE_EPS).contains(&u) {
        return None;
    }

    let q = s.cross(&e1);
    let v = inv_det * d.dot(&q);
    if v < -EDGE_EPS || u + v > 1.0 + EDGE_EPS {
        return None;
    }

    let t = inv_det * e2.dot(&q);
    if t <= MIN_T {
        return None;
    }

    Some(TriangleHit {
        t,
        weights: [(1.0 - u - v) as f32, u as f32, v as f32],
    })
}
