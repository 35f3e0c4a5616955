//! Delaunay tetrahedralization for probe sets
//!
//! A reference implementation of the `Tetrahedralizer` service using the
//! Bowyer–Watson algorithm. Probe layouts are frequently regular grids, which
//! are maximally cospherical, so insertion runs on a copy of the input that is
//! jittered by a tiny deterministic offset. Cavities are chosen with lifted
//! determinant predicates and shrunk until every new cell is positively
//! oriented, so the output always tiles the hull even where a near-cospherical
//! decision goes the wrong way. Cells are then filtered against the original
//! coordinates so zero-volume slivers never reach the index.

use crate::barycentric::signed_volume6;
use nalgebra::{Matrix4, Vector3};
use probecrate_core::{bounding_box, Error, Point3f, Result, Tetrahedralization, Tetrahedralizer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Distance of the enclosing tetrahedron's corners, in bounding-box diagonals
const SUPER_MARGIN: f64 = 60.0;

/// Configuration for Delaunay tetrahedralization
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelaunayConfig {
    /// Points closer than this are merged into the first one seen
    pub merge_tolerance: f32,
    /// Jitter amplitude relative to the bounding-box diagonal
    pub jitter: f64,
    /// Seed for the jitter sequence
    pub seed: u64,
    /// Cells whose volume relative to the diagonal cubed falls below this are dropped
    pub min_relative_volume: f64,
}

impl Default for DelaunayConfig {
    fn default() -> Self {
        Self {
            merge_tolerance: 1e-5,
            jitter: 1e-7,
            seed: 0x5eed,
            min_relative_volume: 1e-9,
        }
    }
}

/// Bowyer–Watson tetrahedralizer
#[derive(Debug, Clone, Default)]
pub struct DelaunayTetrahedralizer {
    pub config: DelaunayConfig,
}

impl DelaunayTetrahedralizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DelaunayConfig) -> Self {
        Self { config }
    }

    pub fn with_merge_tolerance(mut self, tolerance: f32) -> Self {
        self.config.merge_tolerance = tolerance;
        self
    }

    fn bowyer_watson(&self, positions: &[Point3f]) -> Result<Vec<[usize; 4]>> {
        let n = positions.len();
        let (min, max) = match bounding_box(positions) {
            Some(bounds) => bounds,
            None => return Ok(Vec::new()),
        };
        let diagonal = (max - min).norm() as f64;
        if diagonal == 0.0 {
            return Ok(Vec::new());
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let amplitude = self.config.jitter * diagonal;
        let mut points: Vec<Vector3<f64>> = positions
            .iter()
            .map(|p| {
                Vector3::new(
                    p.x as f64 + rng.gen_range(-amplitude..=amplitude),
                    p.y as f64 + rng.gen_range(-amplitude..=amplitude),
                    p.z as f64 + rng.gen_range(-amplitude..=amplitude),
                )
            })
            .collect();

        let center = Vector3::new(
            (min.x + max.x) as f64 * 0.5,
            (min.y + max.y) as f64 * 0.5,
            (min.z + max.z) as f64 * 0.5,
        );
        let reach = SUPER_MARGIN * diagonal;
        for corner in [
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(1.0, -1.0, -1.0),
            Vector3::new(-1.0, 1.0, -1.0),
            Vector3::new(-1.0, -1.0, 1.0),
        ] {
            points.push(center + corner * reach);
        }

        let mut cells = vec![positively_oriented(&points, [n, n + 1, n + 2, n + 3])
            .ok_or_else(|| Error::Algorithm("Enclosing tetrahedron is degenerate".to_string()))?];

        for i in 0..n {
            let p = &points[i];
            let container = cells
                .iter()
                .position(|&cell| strictly_contains(&points, cell, p))
                .ok_or_else(|| {
                    Error::Algorithm(format!("Point {} lies on a face of the current mesh", i))
                })?;

            let mut in_cavity: Vec<bool> = cells
                .iter()
                .map(|&cell| insphere(&points, cell, p) > 0.0)
                .collect();
            in_cavity[container] = true;

            // Shrink until every boundary face sees `i` from inside the cavity
            let boundary = loop {
                let boundary = cavity_boundary(&cells, &in_cavity);
                let hidden: Vec<usize> = boundary
                    .iter()
                    .filter(|&&(owner, slot)| replaced_orientation(&points, cells[owner], slot, p) <= 0.0)
                    .map(|&(owner, _)| owner)
                    .collect();
                if hidden.is_empty() {
                    break boundary;
                }
                if hidden.contains(&container) {
                    return Err(Error::Algorithm(format!(
                        "Degenerate cavity while inserting point {}",
                        i
                    )));
                }
                for owner in hidden {
                    in_cavity[owner] = false;
                }
            };

            let mut next: Vec<[usize; 4]> = boundary
                .iter()
                .map(|&(owner, slot)| {
                    let mut cell = cells[owner];
                    cell[slot] = i;
                    cell
                })
                .collect();
            next.extend(
                cells
                    .iter()
                    .zip(&in_cavity)
                    .filter(|(_, bad)| !**bad)
                    .map(|(&cell, _)| cell),
            );
            cells = next;
        }

        let min_volume = self.config.min_relative_volume * diagonal * diagonal * diagonal;
        let tetrahedra = cells
            .into_iter()
            .filter(|cell| cell.iter().all(|&v| v < n))
            .filter(|&[a, b, c, d]| {
                signed_volume6(&positions[a], &positions[b], &positions[c], &positions[d]).abs() / 6.0
                    > min_volume
            })
            .collect();

        Ok(tetrahedra)
    }
}

impl Tetrahedralizer for DelaunayTetrahedralizer {
    fn tetrahedralize(&self, points: &[Point3f]) -> Result<Tetrahedralization> {
        let positions = merge_duplicates(points, self.config.merge_tolerance);
        if positions.len() < 4 {
            return Ok(Tetrahedralization {
                indices: Vec::new(),
                positions,
            });
        }

        let indices = self.bowyer_watson(&positions)?.into_iter().flatten().collect();
        Ok(Tetrahedralization { indices, positions })
    }
}

/// Keep the first of every group of points closer than `tolerance`
pub fn merge_duplicates(points: &[Point3f], tolerance: f32) -> Vec<Point3f> {
    let tolerance_sq = tolerance * tolerance;
    let mut kept: Vec<Point3f> = Vec::with_capacity(points.len());
    for p in points {
        if !kept.iter().any(|k| (k - p).norm_squared() <= tolerance_sq) {
            kept.push(*p);
        }
    }
    kept
}

/// Six times the signed volume of `abcd`, positive when `d` lies on the
/// side of `abc` that makes the corners counter-clockwise
fn orient3d(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>, d: &Vector3<f64>) -> f64 {
    (b - a).dot(&(c - a).cross(&(d - a)))
}

/// Lifted in-sphere determinant of a positively oriented cell, positive when
/// `e` lies strictly inside its circumsphere.
///
/// Rows are taken relative to `e`, so no circumcenter is ever formed.
fn insphere(points: &[Vector3<f64>], cell: [usize; 4], e: &Vector3<f64>) -> f64 {
    let row = |v: usize| {
        let d = points[v] - e;
        [d.x, d.y, d.z, d.norm_squared()]
    };
    let [a, b, c, d] = cell.map(row);
    let lifted = Matrix4::new(
        a[0], a[1], a[2], a[3],
        b[0], b[1], b[2], b[3],
        c[0], c[1], c[2], c[3],
        d[0], d[1], d[2], d[3],
    );
    -lifted.determinant()
}

/// Orientation of `cell` with the corner in `slot` swapped for `p`
fn replaced_orientation(
    points: &[Vector3<f64>],
    cell: [usize; 4],
    slot: usize,
    p: &Vector3<f64>,
) -> f64 {
    let mut corners = cell.map(|v| &points[v]);
    corners[slot] = p;
    orient3d(corners[0], corners[1], corners[2], corners[3])
}

fn strictly_contains(points: &[Vector3<f64>], cell: [usize; 4], p: &Vector3<f64>) -> bool {
    (0..4).all(|slot| replaced_orientation(points, cell, slot, p) > 0.0)
}

/// `cell` reordered to positive orientation, or `None` when it is flat
fn positively_oriented(points: &[Vector3<f64>], mut cell: [usize; 4]) -> Option<[usize; 4]> {
    let [a, b, c, d] = cell.map(|v| &points[v]);
    let volume = orient3d(a, b, c, d);
    if volume == 0.0 {
        return None;
    }
    if volume < 0.0 {
        cell.swap(0, 1);
    }
    Some(cell)
}

/// Faces owned by exactly one cavity cell, as `(cell, opposite slot)`
fn cavity_boundary(cells: &[[usize; 4]], in_cavity: &[bool]) -> Vec<(usize, usize)> {
    let mut faces: HashMap<[usize; 3], Option<(usize, usize)>> = HashMap::new();
    for (index, cell) in cells.iter().enumerate() {
        if !in_cavity[index] {
            continue;
        }
        for slot in 0..4 {
            let mut key = [0usize; 3];
            let mut k = 0;
            for (other, &v) in cell.iter().enumerate() {
                if other != slot {
                    key[k] = v;
                    k += 1;
                }
            }
            key.sort_unstable();
            faces
                .entry(key)
                .and_modify(|owner| *owner = None)
                .or_insert(Some((index, slot)));
        }
    }
    let mut boundary: Vec<(usize, usize)> = faces.into_values().flatten().collect();
    boundary.sort_unstable();
    boundary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barycentric::{barycentric, is_inside};

    fn cube_corners() -> Vec<Point3f> {
        let mut corners = Vec::new();
        for x in [0.0, 1.0] {
            for y in [0.0, 1.0] {
                for z in [0.0, 1.0] {
                    corners.push(Point3f::new(x, y, z));
                }
            }
        }
        corners
    }

    fn total_volume(t: &Tetrahedralization) -> f64 {
        t.cells()
            .map(|[a, b, c, d]| {
                signed_volume6(&t.positions[a], &t.positions[b], &t.positions[c], &t.positions[d]).abs()
                    / 6.0
            })
            .sum()
    }

    #[test]
    fn test_single_tetrahedron() {
        let points = vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
            Point3f::new(0.0, 0.0, 1.0),
        ];
        let t = DelaunayTetrahedralizer::new().tetrahedralize(&points).unwrap();
        assert!(t.validate().is_ok());
        assert_eq!(t.len(), 1);
        assert_eq!(t.positions.len(), 4);
    }

    #[test]
    fn test_cube_fills_volume() {
        let t = DelaunayTetrahedralizer::new().tetrahedralize(&cube_corners()).unwrap();
        assert!(t.validate().is_ok());
        assert!(t.len() >= 5);
        assert!((total_volume(&t) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_cube_center_is_located() {
        let t = DelaunayTetrahedralizer::new().tetrahedralize(&cube_corners()).unwrap();
        let center = Point3f::new(0.5, 0.5, 0.5);
        let found = t.cells().any(|[a, b, c, d]| {
            let tet = [t.positions[a], t.positions[b], t.positions[c], t.positions[d]];
            barycentric(&center, &tet).map_or(false, |w| is_inside(&w, 1e-5))
        });
        assert!(found);
    }

    #[test]
    fn test_grid_fills_volume() {
        let mut points = Vec::new();
        for x in 0..3 {
            for y in 0..3 {
                for z in 0..3 {
                    points.push(Point3f::new(x as f32, y as f32 * 0.5, z as f32 * 2.0));
                }
            }
        }
        let t = DelaunayTetrahedralizer::new().tetrahedralize(&points).unwrap();
        assert!(t.validate().is_ok());
        assert!((total_volume(&t) - 8.0).abs() < 1e-3);
    }

    #[test]
    fn test_duplicates_are_merged() {
        let mut points = cube_corners();
        points.push(Point3f::new(1.0, 1.0, 1.0));
        points.push(Point3f::new(0.0, 0.0, 1e-7));
        let t = DelaunayTetrahedralizer::new().tetrahedralize(&points).unwrap();
        assert_eq!(t.positions.len(), 8);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_coplanar_points_give_no_cells() {
        let points = vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
            Point3f::new(1.0, 1.0, 0.0),
            Point3f::new(0.5, 0.3, 0.0),
        ];
        let t = DelaunayTetrahedralizer::new().tetrahedralize(&points).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.positions.len(), 5);
    }

    #[test]
    fn test_too_few_points() {
        let t = DelaunayTetrahedralizer::new()
            .tetrahedralize(&[Point3f::origin(), Point3f::new(1.0, 0.0, 0.0)])
            .unwrap();
        assert!(t.is_empty());
    }

    fn lattice(n: usize) -> Vec<Point3f> {
        let mut points = Vec::with_capacity(n * n * n);
        for x in 0..n {
            for y in 0..n {
                for z in 0..n {
                    points.push(Point3f::new(x as f32, y as f32, z as f32));
                }
            }
        }
        points
    }

    fn containing_cells(t: &Tetrahedralization, p: &Point3f) -> usize {
        t.cells()
            .filter(|&[a, b, c, d]| {
                let tet = [t.positions[a], t.positions[b], t.positions[c], t.positions[d]];
                barycentric(p, &tet).map_or(false, |w| w.iter().all(|&x| x > 1e-4))
            })
            .count()
    }

    #[test]
    fn test_orientation_and_insphere_signs() {
        let points = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        ];
        assert!((orient3d(&points[0], &points[1], &points[2], &points[3]) - 1.0).abs() < 1e-12);
        assert_eq!(positively_oriented(&points, [1, 0, 2, 3]), Some([0, 1, 2, 3]));

        let cell = [0, 1, 2, 3];
        assert!((insphere(&points, cell, &Vector3::new(0.5, 0.5, 0.5)) - 0.75).abs() < 1e-9);
        assert!(insphere(&points, cell, &Vector3::new(3.0, 3.0, 3.0)) < 0.0);
        // (1, 1, 0) is on the circumsphere centred at (0.5, 0.5, 0.5)
        assert!(insphere(&points, cell, &Vector3::new(1.0, 1.0, 0.0)).abs() < 1e-9);
        assert!(strictly_contains(&points, cell, &Vector3::new(0.1, 0.1, 0.1)));
        assert!(!strictly_contains(&points, cell, &Vector3::new(0.5, 0.5, 0.5)));
    }

    #[test]
    fn test_large_lattices_partition_their_hull() {
        for n in [6usize, 7] {
            let t = DelaunayTetrahedralizer::new().tetrahedralize(&lattice(n)).unwrap();
            assert!(t.validate().is_ok());
            let expected = ((n - 1) * (n - 1) * (n - 1)) as f64;
            assert!(
                (total_volume(&t) - expected).abs() < 1e-3,
                "{}^3 lattice covers {} instead of {}",
                n,
                total_volume(&t),
                expected
            );
        }
    }

    #[test]
    fn test_lattice_interior_points_lie_in_one_cell() {
        let mut rng = StdRng::seed_from_u64(99);
        for n in [6usize, 7] {
            let t = DelaunayTetrahedralizer::new().tetrahedralize(&lattice(n)).unwrap();
            let extent = (n - 1) as f32;
            for _ in 0..300 {
                let p = Point3f::new(
                    rng.gen_range(0.01..extent - 0.01),
                    rng.gen_range(0.01..extent - 0.01),
                    rng.gen_range(0.01..extent - 0.01),
                );
                assert!(containing_cells(&t, &p) <= 1, "{:?} is inside several cells", p);
            }
        }
    }

    #[test]
    fn test_lattice_with_missing_point_partitions_hull() {
        let mut points = lattice(6);
        points.remove(2 * 36 + 3 * 6 + 2);
        let t = DelaunayTetrahedralizer::new().tetrahedralize(&points).unwrap();
        assert!((total_volume(&t) - 125.0).abs() < 1e-3);
    }
}
