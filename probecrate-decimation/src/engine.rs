//! Greedy leave-one-out probe decimation
//!
//! Each iteration tries removing every candidate probe from a copy of the
//! committed set, rebuilds the tetrahedral decomposition of the copy, maps
//! the evaluation points onto it, estimates the radiance there and scores the
//! estimate against the reference produced by the original set. The cheapest
//! removal is committed and the loop continues until a termination condition
//! holds.

use crate::config::{DecimationConfig, ZeroCostPolicy};
use crate::evaluator::Evaluator;
use crate::progress::{CancellationToken, ProgressEvent};
use crate::timer::{ReportTimer, Stage};
use probecrate_core::{
    Color, DecimationLogger, EncodingEvaluator, Error, Level, Point3f, Probe, ProbeSet, Result,
    ShL2Evaluator, Tetrahedralizer, TracingLogger,
};
use probecrate_spatial::{
    DelaunayTetrahedralizer, MappingOutcome, TetrahedralizeStatus, TetrahedronGraph,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

/// Fewest probes that still enclose a volume
pub const MIN_TETRAHEDRAL_PROBES: usize = 4;

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Termination {
    /// The probe count reached the configured floor (or four probes)
    MinProbesReached,
    /// The committed error reached `max_error`
    ErrorThresholdReached,
    /// The cheapest removal would have exceeded `max_error`
    ErrorThresholdExceeded,
    /// Every candidate of an iteration failed
    NoViableCandidate,
    Cancelled,
}

/// Counters describing the last run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Telemetry {
    /// Error of the committed probe set against the reference
    pub evaluation_error: f64,
    pub starting_probe_count: usize,
    pub final_probe_count: usize,
    /// Iterations started, including one interrupted by a termination
    pub iterations: usize,
    /// Candidates that produced a cost
    pub candidates_evaluated: usize,
    /// Candidates skipped for degenerate geometry
    pub candidates_skipped: usize,
}

/// Outcome of `DecimationEngine::decimate`
#[derive(Debug, Clone, PartialEq)]
pub struct DecimationReport {
    /// The committed probe set
    pub probes: ProbeSet,
    /// Removed probes, in removal order
    pub removed: Vec<Probe>,
    pub termination: Termination,
    pub iterations: usize,
    pub final_error: f64,
}

impl DecimationReport {
    pub fn removed_positions(&self) -> Vec<Point3f> {
        self.removed.iter().map(|p| p.position).collect()
    }
}

#[derive(Debug, Clone)]
struct Reference {
    eval_positions: Vec<Point3f>,
    colors: Vec<Color>,
}

/// Decimation engine over a tetrahedralization service and an encoding
/// evaluator
pub struct DecimationEngine<T = DelaunayTetrahedralizer, V = ShL2Evaluator> {
    tetrahedralizer: T,
    evaluator: Evaluator<V>,
    config: DecimationConfig,
    graph: TetrahedronGraph,
    logger: Arc<dyn DecimationLogger>,
    timer: ReportTimer,
    telemetry: Telemetry,
    reference: Option<Reference>,
    removed: Vec<Probe>,
}

impl DecimationEngine {
    /// Engine over the bundled Delaunay tetrahedralizer and SH evaluator
    pub fn from_config(config: DecimationConfig) -> Self {
        Self::new(DelaunayTetrahedralizer::new(), ShL2Evaluator, config)
    }
}

impl Default for DecimationEngine {
    fn default() -> Self {
        Self::from_config(DecimationConfig::default())
    }
}

impl<T: Tetrahedralizer, V: EncodingEvaluator + Sync> DecimationEngine<T, V> {
    pub fn new(tetrahedralizer: T, evaluator: V, config: DecimationConfig) -> Self {
        Self {
            tetrahedralizer,
            evaluator: Evaluator::new(evaluator, config.directions, config.spatial.parallel),
            graph: TetrahedronGraph::new(config.spatial),
            config,
            logger: Arc::new(TracingLogger),
            timer: ReportTimer::new(),
            telemetry: Telemetry::default(),
            reference: None,
            removed: Vec::new(),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn DecimationLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &DecimationConfig {
        &self.config
    }

    /// Replace the configuration; drops the decomposition and the reference
    pub fn set_config(&mut self, config: DecimationConfig) {
        self.evaluator.set_mode(config.directions);
        self.evaluator.set_parallel(config.spatial.parallel);
        self.graph = TetrahedronGraph::new(config.spatial);
        self.reference = None;
        self.config = config;
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn timings(&self) -> &ReportTimer {
        &self.timer
    }

    pub fn graph(&self) -> &TetrahedronGraph {
        &self.graph
    }

    /// Estimates of the original probe set, once generated
    pub fn reference_colors(&self) -> Option<&[Color]> {
        self.reference.as_ref().map(|r| r.colors.as_slice())
    }

    /// Probes removed by the last run, in removal order
    pub fn removed(&self) -> &[Probe] {
        &self.removed
    }

    fn log(&self, level: Level, message: impl AsRef<str>) {
        self.logger.log(level, message.as_ref());
    }

    /// Clear all per-run state before a run over `probe_count` probes
    pub fn reset_for_probe_count(&mut self, probe_count: usize) {
        self.timer.reset();
        self.graph.clear();
        self.reference = None;
        self.removed.clear();
        self.telemetry = Telemetry {
            starting_probe_count: probe_count,
            final_probe_count: probe_count,
            ..Telemetry::default()
        };
    }

    /// Rebuild the decomposition over `positions`
    pub fn tetrahedralize(&mut self, positions: &[Point3f]) -> Result<TetrahedralizeStatus> {
        let start = Instant::now();
        let status = self.graph.tetrahedralize(&self.tetrahedralizer, positions);
        self.timer.record(Stage::Tetrahedralize, start.elapsed());
        status
    }

    /// Attach the evaluation points to the current decomposition
    pub fn map_evaluation_points(
        &mut self,
        probe_positions: &[Point3f],
        eval_positions: &[Point3f],
    ) -> Result<MappingOutcome> {
        let start = Instant::now();
        let outcome = self.graph.map_evaluation_points(probe_positions, eval_positions)?;
        self.timer.record(Stage::Mapping, start.elapsed());

        let stats = outcome.stats();
        if stats.total() != eval_positions.len() {
            return Err(Error::Algorithm(format!(
                "mapping classified {} of {} evaluation points",
                stats.total(),
                eval_positions.len()
            )));
        }
        Ok(outcome)
    }

    /// Evaluate the original probe set at every evaluation point and keep the
    /// result as the reference for later runs.
    ///
    /// Returns the probe set the reference was built from, which differs from
    /// `probes` when the tetrahedralizer merged coincident positions.
    pub fn generate_reference(
        &mut self,
        probes: &ProbeSet,
        eval_positions: &[Point3f],
    ) -> Result<ProbeSet> {
        let start = Instant::now();
        if eval_positions.is_empty() {
            return Err(Error::InvalidData("No evaluation points".to_string()));
        }
        if probes.len() < MIN_TETRAHEDRAL_PROBES {
            return Err(Error::DegenerateGeometry(format!(
                "{} probes cannot enclose a volume",
                probes.len()
            )));
        }

        let working = self.working_set(probes)?;
        if let MappingOutcome::Invalid(stats) =
            self.map_evaluation_points(working.positions(), eval_positions)?
        {
            return Err(Error::DegenerateGeometry(format!(
                "{} of {} evaluation points could not be mapped onto {} probes ({} tetrahedra)",
                stats.unmapped,
                eval_positions.len(),
                working.len(),
                self.graph.tetrahedron_count()
            )));
        }

        let colors = self.estimate(&working, None)?;
        self.graph.commit_baseline();
        self.reference = Some(Reference {
            eval_positions: eval_positions.to_vec(),
            colors,
        });
        self.timer.record(Stage::Reference, start.elapsed());
        Ok(working)
    }

    /// Cost of `probes` against the stored reference.
    ///
    /// Replaces the current decomposition and mappings.
    pub fn evaluate_error(&mut self, probes: &ProbeSet) -> Result<f64> {
        let Some(reference) = self.reference.clone() else {
            return Err(Error::Configuration(
                "generate_reference must run before evaluate_error".to_string(),
            ));
        };

        self.tetrahedralize(probes.positions())?;
        let aligned = self.align(probes);
        if !self
            .map_evaluation_points(aligned.positions(), &reference.eval_positions)?
            .is_valid()
        {
            return Err(Error::DegenerateGeometry(
                "evaluation points could not be mapped onto the probe set".to_string(),
            ));
        }
        let estimates = self.estimate(&aligned, None)?;
        self.solve(&estimates, &reference.colors)
    }

    /// Greedily remove probes from `probes` until a termination condition
    /// holds.
    ///
    /// `progress` is called after every evaluated candidate; `cancel` is
    /// checked before each one. Whatever the termination, the returned set is
    /// the state after the last committed removal.
    pub fn decimate<F>(
        &mut self,
        probes: &ProbeSet,
        eval_positions: &[Point3f],
        cancel: &CancellationToken,
        mut progress: F,
    ) -> Result<DecimationReport>
    where
        F: FnMut(&ProgressEvent),
    {
        self.config.validate()?;
        let min_probes = self.resolve_min_probes()?;
        self.reset_for_probe_count(probes.len());

        let mut committed = self.generate_reference(probes, eval_positions)?;
        let reference = match &self.reference {
            Some(reference) => reference.colors.clone(),
            None => return Err(Error::Algorithm("reference was not generated".to_string())),
        };
        let mut baseline = reference.clone();
        let mut current_error = 0.0;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut iteration = 0;

        self.log(
            Level::INFO,
            format!(
                "decimating {} probes against {} evaluation points",
                committed.len(),
                eval_positions.len()
            ),
        );

        let termination = 'run: loop {
            let count = committed.len();
            if cancel.is_cancelled() {
                break Termination::Cancelled;
            }
            if self.config.use_max_error && current_error >= self.config.max_error {
                break Termination::ErrorThresholdReached;
            }
            if min_probes.map_or(false, |min| count <= min) || count <= MIN_TETRAHEDRAL_PROBES {
                break Termination::MinProbesReached;
            }

            iteration += 1;
            let iteration_start = Instant::now();
            let candidates = self.candidates(count, &mut rng);
            let mut best: Option<(usize, f64)> = None;

            for (position, &index) in candidates.iter().enumerate() {
                if cancel.is_cancelled() {
                    break 'run Termination::Cancelled;
                }

                match self.try_candidate(&committed, index, eval_positions, &reference, &baseline)? {
                    Some(cost) => {
                        self.telemetry.candidates_evaluated += 1;
                        if self.accepts(cost, best.map(|(_, c)| c)) {
                            best = Some((index, cost));
                        }
                    }
                    None => self.telemetry.candidates_skipped += 1,
                }

                progress(&ProgressEvent {
                    iteration,
                    candidate: position,
                    candidates: candidates.len(),
                    probe_count: count,
                    current_error,
                    best_cost: best.map(|(_, c)| c),
                });
            }

            let Some((index, cost)) = best else {
                self.log(
                    Level::ERROR,
                    format!(
                        "no viable candidate in iteration {}: {} probes, {} evaluation points, current error {:.6}",
                        iteration,
                        count,
                        eval_positions.len(),
                        current_error
                    ),
                );
                break Termination::NoViableCandidate;
            };

            if self.config.use_max_error && cost > self.config.max_error {
                self.log(
                    Level::INFO,
                    format!(
                        "cheapest removal costs {:.6}, above the limit of {:.6}",
                        cost, self.config.max_error
                    ),
                );
                break Termination::ErrorThresholdExceeded;
            }

            // The committed set only changes once its baseline is rebuilt
            let next = committed.without(index)?;
            match self.rebuild_baseline(&next, eval_positions) {
                Ok(colors) => baseline = colors,
                Err(err) => {
                    self.log(
                        Level::ERROR,
                        format!(
                            "could not commit removal of probe {} in iteration {}: {}; keeping {} probes",
                            index, iteration, err, count
                        ),
                    );
                    break Termination::NoViableCandidate;
                }
            }
            let probe = committed.remove(index)?;
            self.removed.push(probe);
            current_error = cost;
            self.timer.record(Stage::Iteration, iteration_start.elapsed());

            self.log(
                Level::DEBUG,
                format!(
                    "iteration {}: removed probe {} at ({:.3}, {:.3}, {:.3}), {} left, error {:.6}",
                    iteration,
                    index,
                    probe.position.x,
                    probe.position.y,
                    probe.position.z,
                    committed.len(),
                    current_error
                ),
            );
        };

        if termination == Termination::Cancelled {
            self.log(
                Level::INFO,
                format!("decimation cancelled after {} removals", self.removed.len()),
            );
        }

        self.telemetry.iterations = iteration;
        self.telemetry.evaluation_error = current_error;
        self.telemetry.final_probe_count = committed.len();
        self.log(
            Level::INFO,
            format!(
                "decimation finished ({:?}): {} -> {} probes, error {:.6}",
                termination,
                self.telemetry.starting_probe_count,
                committed.len(),
                current_error
            ),
        );

        Ok(DecimationReport {
            probes: committed,
            removed: self.removed.clone(),
            termination,
            iterations: iteration,
            final_error: current_error,
        })
    }

    /// Probe floor for this run, resolving a missing termination condition
    fn resolve_min_probes(&self) -> Result<Option<usize>> {
        if self.config.has_termination_condition() {
            return Ok(self.config.use_min_probes.then_some(self.config.min_probes));
        }
        match self.config.fallback_min_probes {
            Some(floor) => {
                self.log(
                    Level::WARN,
                    format!(
                        "no termination condition selected, stopping at {} probes",
                        floor
                    ),
                );
                Ok(Some(floor))
            }
            None => {
                self.log(Level::WARN, "no termination condition selected");
                Err(Error::Configuration(
                    "enable min_probes or max_error, or supply fallback_min_probes".to_string(),
                ))
            }
        }
    }

    /// Candidate indices for one iteration, ascending
    fn candidates(&self, count: usize, rng: &mut StdRng) -> Vec<usize> {
        if self.config.use_stochastic && self.config.stochastic_sample_count < count {
            let mut picked =
                rand::seq::index::sample(rng, count, self.config.stochastic_sample_count).into_vec();
            picked.sort_unstable();
            picked
        } else {
            (0..count).collect()
        }
    }

    fn accepts(&self, cost: f64, best: Option<f64>) -> bool {
        if !cost.is_finite() {
            return false;
        }
        if cost == 0.0 && self.config.zero_cost_policy == ZeroCostPolicy::Exclude {
            return false;
        }
        best.map_or(true, |best| cost < best)
    }

    /// Cost of removing probe `index` from `committed`, or `None` when the
    /// remaining probes do not form a usable decomposition
    fn try_candidate(
        &mut self,
        committed: &ProbeSet,
        index: usize,
        eval_positions: &[Point3f],
        reference: &[Color],
        baseline: &[Color],
    ) -> Result<Option<f64>> {
        let trial = committed.without(index)?;
        match self.tetrahedralize(trial.positions()) {
            Ok(TetrahedralizeStatus::Complete { .. }) => {}
            Ok(TetrahedralizeStatus::Collapsed { input, output, .. }) => {
                self.log(
                    Level::DEBUG,
                    format!("candidate {}: positions collapsed ({} -> {})", index, input, output),
                );
                return Ok(None);
            }
            Err(err) => {
                self.log(
                    Level::DEBUG,
                    format!("candidate {}: tetrahedralization failed: {}", index, err),
                );
                return Ok(None);
            }
        }

        let aligned = self.align(&trial);
        if let MappingOutcome::Invalid(stats) =
            self.map_evaluation_points(aligned.positions(), eval_positions)?
        {
            self.log(
                Level::DEBUG,
                format!("candidate {}: {} evaluation points unmapped", index, stats.unmapped),
            );
            return Ok(None);
        }

        let estimates = self.estimate(&aligned, Some(baseline))?;
        self.solve(&estimates, reference).map(Some)
    }

    /// Decomposition, mappings and estimates of the committed set, stored as
    /// the baseline the next iteration compares against
    fn rebuild_baseline(&mut self, committed: &ProbeSet, eval_positions: &[Point3f]) -> Result<Vec<Color>> {
        if self.tetrahedralize(committed.positions())?.is_collapsed() {
            return Err(Error::Algorithm(
                "committed probe set collapsed during tetrahedralization".to_string(),
            ));
        }
        let aligned = self.align(committed);
        if !self
            .map_evaluation_points(aligned.positions(), eval_positions)?
            .is_valid()
        {
            return Err(Error::Algorithm(
                "committed probe set no longer maps every evaluation point".to_string(),
            ));
        }
        let colors = self.estimate(&aligned, None)?;
        self.graph.commit_baseline();
        Ok(colors)
    }

    /// Tetrahedralize `probes`, warning and reconciling when positions merge
    fn working_set(&mut self, probes: &ProbeSet) -> Result<ProbeSet> {
        if let TetrahedralizeStatus::Collapsed { input, output, .. } =
            self.tetrahedralize(probes.positions())?
        {
            self.log(
                Level::WARN,
                format!(
                    "tetrahedralization merged {} coincident probe positions ({} -> {}), continuing with the deduplicated set",
                    input - output,
                    input,
                    output
                ),
            );
        }
        Ok(self.align(probes).into_owned())
    }

    /// `set` reordered onto the positions of the current decomposition, each
    /// taking the encoding of its nearest probe in `set`
    fn align<'a>(&self, set: &'a ProbeSet) -> Cow<'a, ProbeSet> {
        let positions = self.graph.positions();
        if positions == set.positions() {
            return Cow::Borrowed(set);
        }
        Cow::Owned(
            positions
                .iter()
                .map(|p| {
                    let nearest = nearest_index(set.positions(), p);
                    Probe::new(*p, set.encodings()[nearest])
                })
                .collect(),
        )
    }

    fn estimate(&mut self, probes: &ProbeSet, baseline: Option<&[Color]>) -> Result<Vec<Color>> {
        let start = Instant::now();
        let colors = self.evaluator.evaluate(&self.graph, probes.encodings(), baseline);
        self.timer.record(Stage::Evaluation, start.elapsed());
        colors
    }

    fn solve(&mut self, estimates: &[Color], reference: &[Color]) -> Result<f64> {
        let start = Instant::now();
        let cost = self
            .config
            .solver
            .compute_loss(self.config.metric, estimates, reference);
        self.timer.record(Stage::Solve, start.elapsed());
        cost
    }
}

fn nearest_index(positions: &[Point3f], target: &Point3f) -> usize {
    positions
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (*a - target)
                .norm_squared()
                .total_cmp(&(*b - target).norm_squared())
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use probecrate_core::{MemoryLogger, ShL2};

    fn make_engine(config: DecimationConfig) -> (DecimationEngine, Arc<MemoryLogger>) {
        let logger = Arc::new(MemoryLogger::new());
        let engine = DecimationEngine::from_config(config).with_logger(logger.clone());
        (engine, logger)
    }

    fn cube() -> ProbeSet {
        let mut positions = Vec::new();
        for x in [0.0, 1.0] {
            for y in [0.0, 1.0] {
                for z in [0.0, 1.0] {
                    positions.push(Point3f::new(x, y, z));
                }
            }
        }
        ProbeSet::uniform(positions, ShL2::constant(Color::new(1.0, 0.5, 0.25)))
    }

    #[test]
    fn test_zero_cost_policy() {
        let (engine, _) = make_engine(DecimationConfig::default());
        assert!(!engine.accepts(0.0, None));
        assert!(engine.accepts(0.5, None));
        assert!(engine.accepts(0.5, Some(0.6)));
        assert!(!engine.accepts(0.6, Some(0.6)));
        assert!(!engine.accepts(f64::NAN, None));
        assert!(!engine.accepts(f64::INFINITY, None));

        let (engine, _) = make_engine(
            DecimationConfig::default().with_zero_cost_policy(ZeroCostPolicy::Accept),
        );
        assert!(engine.accepts(0.0, None));
        assert!(engine.accepts(0.0, Some(1e-9)));
    }

    #[test]
    fn test_candidates_are_sorted_and_seeded() {
        let (engine, _) = make_engine(DecimationConfig::default().with_stochastic(5));
        let mut a = StdRng::seed_from_u64(9);
        let mut b = StdRng::seed_from_u64(9);
        let first = engine.candidates(40, &mut a);
        assert_eq!(first.len(), 5);
        assert!(first.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(first, engine.candidates(40, &mut b));

        // Small sets are scanned exhaustively
        assert_eq!(engine.candidates(4, &mut a), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_missing_termination_condition() {
        let config = DecimationConfig::default().without_min_probes().without_max_error();
        let (engine, logger) = make_engine(config.clone());
        assert!(matches!(engine.resolve_min_probes(), Err(Error::Configuration(_))));
        assert!(logger.contains(Level::WARN, "no termination condition"));

        let (engine, logger) = make_engine(config.with_fallback_min_probes(6));
        assert_eq!(engine.resolve_min_probes().unwrap(), Some(6));
        assert!(logger.contains(Level::WARN, "6 probes"));
    }

    #[test]
    fn test_reset_clears_run_state() {
        let (mut engine, _) = make_engine(DecimationConfig::default());
        let probes = cube();
        engine
            .generate_reference(&probes, &[Point3f::new(0.5, 0.5, 0.5)])
            .unwrap();
        assert!(engine.reference_colors().is_some());
        assert!(engine.timings().get(Stage::Reference).calls > 0);

        engine.reset_for_probe_count(8);
        assert!(engine.reference_colors().is_none());
        assert_eq!(engine.timings().get(Stage::Reference).calls, 0);
        assert_eq!(engine.telemetry().starting_probe_count, 8);
        assert_eq!(engine.graph().tetrahedron_count(), 0);
    }

    #[test]
    fn test_reference_requires_a_volume() {
        let (mut engine, _) = make_engine(DecimationConfig::default());
        let flat = ProbeSet::uniform(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(1.0, 1.0, 0.0),
            ],
            ShL2::zero(),
        );
        let result = engine.generate_reference(&flat, &[Point3f::new(0.5, 0.5, 0.0)]);
        assert!(matches!(result, Err(Error::DegenerateGeometry(_))));

        let result = engine.generate_reference(&cube(), &[]);
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_evaluate_error_needs_reference() {
        let (mut engine, _) = make_engine(DecimationConfig::default());
        assert!(matches!(
            engine.evaluate_error(&cube()),
            Err(Error::Configuration(_))
        ));

        let eval = [Point3f::new(0.5, 0.5, 0.5), Point3f::new(0.2, 0.7, 0.4)];
        engine.generate_reference(&cube(), &eval).unwrap();
        let error = engine.evaluate_error(&cube()).unwrap();
        assert!(error.abs() < 1e-9);
    }

    #[test]
    fn test_nearest_index() {
        let positions = [
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.0, 2.0, 0.0),
        ];
        assert_eq!(nearest_index(&positions, &Point3f::new(0.9, 0.1, 0.0)), 1);
        assert_eq!(nearest_index(&positions, &Point3f::new(0.0, 1.5, 0.0)), 2);
        assert_eq!(nearest_index(&[], &Point3f::origin()), 0);
    }
}
