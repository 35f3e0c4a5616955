//! Tetrahedron graph: the spatial index over the current probe set
//!
//! The graph owns the tetrahedral decomposition of the probe positions and
//! one cached `EvaluationMapping` per evaluation point. Point location is a
//! brute-force scan over every cell with an axis-aligned bounds rejection in
//! front of the barycentric test; points outside every cell fall back to a
//! ray cast toward the probe centroid.

use crate::barycentric::{barycentric, is_inside};
use crate::raycast::{ray_triangle, TETRAHEDRON_FACES};
use probecrate_core::{centroid, Error, Point3f, Result, Tetrahedralizer};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for point location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialConfig {
    /// Map evaluation points on the rayon pool
    pub parallel: bool,
    /// Slack on barycentric weights when testing containment
    pub containment_tolerance: f32,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            containment_tolerance: 1e-5,
        }
    }
}

impl SpatialConfig {
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_containment_tolerance(mut self, tolerance: f32) -> Self {
        self.containment_tolerance = tolerance;
        self
    }
}

/// How an evaluation point was attached to the decomposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MappingKind {
    /// Inside (or on the boundary of) a tetrahedron
    Contained,
    /// Outside every tetrahedron, attached to the first face hit by a ray
    /// toward the probe centroid
    Fallback,
    /// No tetrahedron and no face could be found
    Unmapped,
}

/// Cached location of one evaluation point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMapping {
    pub kind: MappingKind,
    /// Index into the graph's tetrahedra, `None` when unmapped
    pub tetrahedron: Option<usize>,
    /// Probe indices of the four corners
    pub corners: [usize; 4],
    /// Barycentric weights per corner
    pub weights: [f32; 4],
    /// Positions of the four corners, used to compare against the baseline
    pub corner_positions: [Point3f; 4],
    /// Whether this mapping differs from the committed baseline
    pub changed: bool,
}

impl EvaluationMapping {
    pub fn unmapped() -> Self {
        Self {
            kind: MappingKind::Unmapped,
            tetrahedron: None,
            corners: [0; 4],
            weights: [0.0; 4],
            corner_positions: [Point3f::origin(); 4],
            changed: true,
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.kind != MappingKind::Unmapped
    }

    fn same_location(&self, other: &EvaluationMapping) -> bool {
        self.is_mapped()
            && other.is_mapped()
            && self.corner_positions == other.corner_positions
            && self.weights == other.weights
    }
}

/// Counts of each mapping kind produced by one mapping call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingStats {
    pub contained: usize,
    pub fallback: usize,
    pub unmapped: usize,
}

impl MappingStats {
    pub fn total(&self) -> usize {
        self.contained + self.fallback + self.unmapped
    }

    fn record(&mut self, kind: MappingKind) {
        match kind {
            MappingKind::Contained => self.contained += 1,
            MappingKind::Fallback => self.fallback += 1,
            MappingKind::Unmapped => self.unmapped += 1,
        }
    }
}

/// Result of mapping a set of evaluation points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingOutcome {
    /// Every point was contained or fallback-mapped
    Mapped(MappingStats),
    /// At least one point could not be attached; the probe configuration is
    /// unusable and the caller should try another one
    Invalid(MappingStats),
}

impl MappingOutcome {
    pub fn stats(&self) -> MappingStats {
        match self {
            MappingOutcome::Mapped(stats) | MappingOutcome::Invalid(stats) => *stats,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, MappingOutcome::Mapped(_))
    }
}

/// Result of rebuilding the decomposition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TetrahedralizeStatus {
    /// The oracle used every input position
    Complete { tetrahedra: usize },
    /// The oracle merged near-duplicate positions; indices refer to the
    /// reduced position list
    Collapsed {
        tetrahedra: usize,
        input: usize,
        output: usize,
    },
}

impl TetrahedralizeStatus {
    pub fn tetrahedra(&self) -> usize {
        match self {
            TetrahedralizeStatus::Complete { tetrahedra }
            | TetrahedralizeStatus::Collapsed { tetrahedra, .. } => *tetrahedra,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        matches!(self, TetrahedralizeStatus::Collapsed { .. })
    }
}

#[derive(Debug, Clone)]
struct Cell {
    corners: [usize; 4],
    min: Point3f,
    max: Point3f,
}

impl Cell {
    fn new(corners: [usize; 4], positions: &[Point3f]) -> Self {
        let mut min = positions[corners[0]];
        let mut max = min;
        for &c in &corners[1..] {
            let p = positions[c];
            min = min.inf(&p);
            max = max.sup(&p);
        }
        Self { corners, min, max }
    }

    fn bounds_contain(&self, p: &Point3f, slack: f32) -> bool {
        p.x >= self.min.x - slack
            && p.y >= self.min.y - slack
            && p.z >= self.min.z - slack
            && p.x <= self.max.x + slack
            && p.y <= self.max.y + slack
            && p.z <= self.max.z + slack
    }
}

/// Spatial index over the current probe set
#[derive(Debug, Clone, Default)]
pub struct TetrahedronGraph {
    config: SpatialConfig,
    cells: Vec<Cell>,
    positions: Vec<Point3f>,
    mappings: Vec<EvaluationMapping>,
    baseline: Vec<EvaluationMapping>,
}

impl TetrahedronGraph {
    pub fn new(config: SpatialConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SpatialConfig {
        &self.config
    }

    /// Drop the decomposition, the mappings and the baseline
    pub fn clear(&mut self) {
        self.cells.clear();
        self.positions.clear();
        self.mappings.clear();
        self.baseline.clear();
    }

    /// Rebuild the decomposition of `positions` from scratch
    pub fn tetrahedralize<T: Tetrahedralizer + ?Sized>(
        &mut self,
        oracle: &T,
        positions: &[Point3f],
    ) -> Result<TetrahedralizeStatus> {
        let result = oracle.tetrahedralize(positions)?;
        result.validate()?;
        if result.positions.len() > positions.len() {
            return Err(Error::InvalidData(format!(
                "tetrahedralization returned {} positions for {} inputs",
                result.positions.len(),
                positions.len()
            )));
        }

        self.cells = result
            .cells()
            .map(|corners| Cell::new(corners, &result.positions))
            .collect();
        let tetrahedra = self.cells.len();
        let output = result.positions.len();
        self.positions = result.positions;

        if output < positions.len() {
            Ok(TetrahedralizeStatus::Collapsed {
                tetrahedra,
                input: positions.len(),
                output,
            })
        } else {
            Ok(TetrahedralizeStatus::Complete { tetrahedra })
        }
    }

    /// Positions the current tetrahedra index into
    pub fn positions(&self) -> &[Point3f] {
        &self.positions
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn tetrahedron_count(&self) -> usize {
        self.cells.len()
    }

    pub fn tetrahedra(&self) -> impl Iterator<Item = [usize; 4]> + '_ {
        self.cells.iter().map(|c| c.corners)
    }

    pub fn mappings(&self) -> &[EvaluationMapping] {
        &self.mappings
    }

    pub fn mapping(&self, index: usize) -> Option<&EvaluationMapping> {
        self.mappings.get(index)
    }

    /// Number of mappings that differ from the committed baseline
    pub fn changed_count(&self) -> usize {
        self.mappings.iter().filter(|m| m.changed).count()
    }

    /// Remember the current mappings as the reference for `changed` flags
    pub fn commit_baseline(&mut self) {
        self.baseline = self.mappings.clone();
    }

    pub fn has_baseline(&self) -> bool {
        !self.baseline.is_empty()
    }

    /// Attach every evaluation point to a tetrahedron of the current
    /// decomposition.
    ///
    /// `probe_positions` must be the list the decomposition was built over
    /// (the oracle's output positions); a length mismatch is an error rather
    /// than a silent use of stale indices.
    pub fn map_evaluation_points(
        &mut self,
        probe_positions: &[Point3f],
        eval_positions: &[Point3f],
    ) -> Result<MappingOutcome> {
        if probe_positions.len() != self.positions.len() {
            return Err(Error::InvalidData(format!(
                "decomposition was built over {} positions but {} were supplied",
                self.positions.len(),
                probe_positions.len()
            )));
        }

        let target = centroid(probe_positions);
        let locate = |p: &Point3f| self.locate(probe_positions, target.as_ref(), p);
        let mut mappings: Vec<EvaluationMapping> = if self.config.parallel {
            eval_positions.par_iter().map(locate).collect()
        } else {
            eval_positions.iter().map(locate).collect()
        };

        let compare = self.baseline.len() == mappings.len();
        let mut stats = MappingStats::default();
        for (i, mapping) in mappings.iter_mut().enumerate() {
            mapping.changed = !(compare && mapping.same_location(&self.baseline[i]));
            stats.record(mapping.kind);
        }
        self.mappings = mappings;

        if stats.unmapped == 0 {
            Ok(MappingOutcome::Mapped(stats))
        } else {
            Ok(MappingOutcome::Invalid(stats))
        }
    }

    fn corner_positions(positions: &[Point3f], corners: &[usize; 4]) -> [Point3f; 4] {
        [
            positions[corners[0]],
            positions[corners[1]],
            positions[corners[2]],
            positions[corners[3]],
        ]
    }

    fn locate(
        &self,
        positions: &[Point3f],
        target: Option<&Point3f>,
        p: &Point3f,
    ) -> EvaluationMapping {
        let tolerance = self.config.containment_tolerance;

        // First containing cell wins
        for (index, cell) in self.cells.iter().enumerate() {
            if !cell.bounds_contain(p, tolerance) {
                continue;
            }
            let corner_positions = Self::corner_positions(positions, &cell.corners);
            if let Some(weights) = barycentric(p, &corner_positions) {
                if is_inside(&weights, tolerance) {
                    return EvaluationMapping {
                        kind: MappingKind::Contained,
                        tetrahedron: Some(index),
                        corners: cell.corners,
                        weights,
                        corner_positions,
                        changed: true,
                    };
                }
            }
        }

        match target {
            Some(target) => self.cast_toward(positions, target, p),
            None => EvaluationMapping::unmapped(),
        }
    }

    fn cast_toward(&self, positions: &[Point3f], target: &Point3f, p: &Point3f) -> EvaluationMapping {
        let direction = target - p;
        if direction.norm_squared() <= f32::EPSILON {
            return EvaluationMapping::unmapped();
        }

        let mut best: Option<(f64, usize, usize, [f32; 3], [usize; 3])> = None;
        for (index, cell) in self.cells.iter().enumerate() {
            for (face, excluded) in TETRAHEDRON_FACES {
                let a = positions[cell.corners[face[0]]];
                let b = positions[cell.corners[face[1]]];
                let c = positions[cell.corners[face[2]]];
                if let Some(hit) = ray_triangle(p, &direction, &a, &b, &c) {
                    if best.map_or(true, |(t, ..)| hit.t < t) {
                        best = Some((hit.t, index, excluded, hit.weights, face));
                    }
                }
            }
        }

        match best {
            Some((_, index, excluded, triangle, face)) => {
                let cell = &self.cells[index];
                let mut weights = [0.0f32; 4];
                for (slot, w) in face.iter().zip(triangle) {
                    weights[*slot] = w;
                }
                weights[excluded] = 0.0;
                EvaluationMapping {
                    kind: MappingKind::Fallback,
                    tetrahedron: Some(index),
                    corners: cell.corners,
                    weights,
                    corner_positions: Self::corner_positions(positions, &cell.corners),
                    changed: true,
                }
            }
            None => EvaluationMapping::unmapped(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delaunay::DelaunayTetrahedralizer;
    use probecrate_core::Tetrahedralization;

    /// Oracle returning a fixed decomposition
    struct Fixed(Tetrahedralization);

    impl Tetrahedralizer for Fixed {
        fn tetrahedralize(&self, _points: &[Point3f]) -> Result<Tetrahedralization> {
            Ok(self.0.clone())
        }
    }

    fn unit_tet_points() -> Vec<Point3f> {
        vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
            Point3f::new(0.0, 0.0, 1.0),
        ]
    }

    fn graph_over(points: &[Point3f]) -> TetrahedronGraph {
        let mut graph = TetrahedronGraph::new(SpatialConfig::default());
        graph
            .tetrahedralize(&DelaunayTetrahedralizer::new(), points)
            .unwrap();
        graph
    }

    #[test]
    fn test_contained_point() {
        let points = unit_tet_points();
        let mut graph = graph_over(&points);
        let outcome = graph
            .map_evaluation_points(&points, &[Point3f::new(0.1, 0.2, 0.3)])
            .unwrap();
        assert_eq!(outcome, MappingOutcome::Mapped(MappingStats { contained: 1, fallback: 0, unmapped: 0 }));
        let m = graph.mapping(0).unwrap();
        assert_eq!(m.kind, MappingKind::Contained);
        assert!((m.weights.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_outside_point_uses_ray_fallback() {
        let points = unit_tet_points();
        let mut graph = graph_over(&points);
        let outcome = graph
            .map_evaluation_points(&points, &[Point3f::new(2.0, 2.0, 2.0)])
            .unwrap();
        assert!(outcome.is_valid());
        assert_eq!(outcome.stats().fallback, 1);

        let m = graph.mapping(0).unwrap();
        assert_eq!(m.kind, MappingKind::Fallback);
        // The ray hits the face x + y + z = 1, which excludes the origin corner
        let origin_slot = m
            .corner_positions
            .iter()
            .position(|p| *p == Point3f::origin())
            .unwrap();
        assert_eq!(m.weights[origin_slot], 0.0);
        assert!((m.weights.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_flat_configuration_is_invalid() {
        let points = vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
            Point3f::new(1.0, 1.0, 0.0),
        ];
        let mut graph = graph_over(&points);
        assert_eq!(graph.tetrahedron_count(), 0);
        let evals = [Point3f::new(0.5, 0.5, 0.5), Point3f::new(0.2, 0.1, -1.0)];
        let outcome = graph.map_evaluation_points(&points, &evals).unwrap();
        assert!(!outcome.is_valid());
        assert_eq!(outcome.stats().unmapped, 2);
        assert_eq!(outcome.stats().total(), evals.len());
        assert!(graph.mappings().iter().all(|m| !m.is_mapped()));
    }

    #[test]
    fn test_counts_add_up() {
        let mut points = Vec::new();
        for x in [0.0, 1.0] {
            for y in [0.0, 1.0] {
                for z in [0.0, 1.0] {
                    points.push(Point3f::new(x, y, z));
                }
            }
        }
        let mut graph = graph_over(&points);
        let evals: Vec<Point3f> = (0..40)
            .map(|i| {
                let f = i as f32 / 40.0;
                Point3f::new(f * 1.6 - 0.3, (f * 7.0).sin(), (f * 3.0).cos())
            })
            .collect();
        let outcome = graph.map_evaluation_points(&points, &evals).unwrap();
        let stats = outcome.stats();
        assert_eq!(stats.total(), evals.len());
        assert!(stats.contained > 0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let points = unit_tet_points();
        let evals: Vec<Point3f> = (0..25)
            .map(|i| Point3f::new(0.04 * i as f32, 0.1, 0.05 * (i % 7) as f32))
            .collect();

        let mut parallel = graph_over(&points);
        let mut sequential = TetrahedronGraph::new(SpatialConfig::default().with_parallel(false));
        sequential
            .tetrahedralize(&DelaunayTetrahedralizer::new(), &points)
            .unwrap();

        parallel.map_evaluation_points(&points, &evals).unwrap();
        sequential.map_evaluation_points(&points, &evals).unwrap();
        assert_eq!(parallel.mappings(), sequential.mappings());
    }

    #[test]
    fn test_first_containing_cell_wins() {
        // Two cells sharing the face (1, 2, 3); a point on that face is inside both
        let positions = vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
            Point3f::new(0.0, 0.0, 1.0),
            Point3f::new(1.0, 1.0, 1.0),
        ];
        let oracle = Fixed(Tetrahedralization {
            indices: vec![0, 1, 2, 3, 4, 1, 2, 3],
            positions: positions.clone(),
        });
        let mut graph = TetrahedronGraph::new(SpatialConfig::default());
        graph.tetrahedralize(&oracle, &positions).unwrap();
        let on_face = Point3f::new(1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0);
        graph.map_evaluation_points(&positions, &[on_face]).unwrap();
        assert_eq!(graph.mapping(0).unwrap().tetrahedron, Some(0));
    }

    #[test]
    fn test_collapsed_status_and_stale_positions() {
        let mut points = unit_tet_points();
        points.push(Point3f::new(0.0, 0.0, 0.0));
        let mut graph = TetrahedronGraph::new(SpatialConfig::default());
        let status = graph
            .tetrahedralize(&DelaunayTetrahedralizer::new(), &points)
            .unwrap();
        assert_eq!(
            status,
            TetrahedralizeStatus::Collapsed { tetrahedra: 1, input: 5, output: 4 }
        );
        assert!(graph
            .map_evaluation_points(&points, &[Point3f::new(0.1, 0.1, 0.1)])
            .is_err());
        let reduced = graph.positions().to_vec();
        assert!(graph
            .map_evaluation_points(&reduced, &[Point3f::new(0.1, 0.1, 0.1)])
            .is_ok());
    }

    #[test]
    fn test_changed_flags_follow_baseline() {
        let points = unit_tet_points();
        let evals = [Point3f::new(0.1, 0.1, 0.1), Point3f::new(0.3, 0.3, 0.1)];
        let mut graph = graph_over(&points);
        graph.map_evaluation_points(&points, &evals).unwrap();
        assert_eq!(graph.changed_count(), 2);

        graph.commit_baseline();
        graph.map_evaluation_points(&points, &evals).unwrap();
        assert_eq!(graph.changed_count(), 0);

        // Moving one corner changes every mapping of that cell
        let mut moved = points.clone();
        moved[3] = Point3f::new(0.0, 0.0, 2.0);
        graph
            .tetrahedralize(&DelaunayTetrahedralizer::new(), &moved)
            .unwrap();
        graph.map_evaluation_points(&moved, &evals).unwrap();
        assert_eq!(graph.changed_count(), 2);
    }

    #[test]
    fn test_rejects_malformed_oracle_output() {
        let oracle = Fixed(Tetrahedralization {
            indices: vec![0, 1, 2],
            positions: unit_tet_points(),
        });
        let mut graph = TetrahedronGraph::new(SpatialConfig::default());
        assert!(graph.tetrahedralize(&oracle, &unit_tet_points()).is_err());
    }
}
