//! Decimation run configuration

use crate::directions::SamplingMode;
use crate::metric::Metric;
use crate::solver::Solver;
use probecrate_core::{Error, Result};
use probecrate_spatial::SpatialConfig;
use serde::{Deserialize, Serialize};

/// Whether candidates whose removal costs exactly nothing may win an iteration.
///
/// Under `Exclude`, a set whose probes all carry the same encoding cannot be
/// decimated at all: every removal reproduces the reference exactly, so every
/// trial fails and the run ends with `NoViableCandidate`. Use `Accept` for
/// such sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ZeroCostPolicy {
    /// A cost of exactly zero is treated as a failed trial
    #[default]
    Exclude,
    /// Zero-cost candidates compete like any other
    Accept,
}

/// Configuration for a decimation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecimationConfig {
    /// Stop once the probe count reaches this value
    pub min_probes: usize,
    /// Stop once the committed error reaches this value
    pub max_error: f64,
    pub use_min_probes: bool,
    pub use_max_error: bool,
    /// Candidates tried per iteration when `use_stochastic` is set
    pub stochastic_sample_count: usize,
    pub use_stochastic: bool,
    /// Seed of the candidate subsampling sequence
    pub seed: u64,
    pub zero_cost_policy: ZeroCostPolicy,
    /// Probe floor used when neither termination condition is selected
    pub fallback_min_probes: Option<usize>,
    pub directions: SamplingMode,
    pub metric: Metric,
    pub solver: Solver,
    pub spatial: SpatialConfig,
}

impl Default for DecimationConfig {
    fn default() -> Self {
        Self {
            min_probes: 16,
            max_error: 5.0,
            use_min_probes: true,
            use_max_error: true,
            stochastic_sample_count: 32,
            use_stochastic: false,
            seed: 0,
            zero_cost_policy: ZeroCostPolicy::default(),
            fallback_min_probes: None,
            directions: SamplingMode::default(),
            metric: Metric::default(),
            solver: Solver::default(),
            spatial: SpatialConfig::default(),
        }
    }
}

impl DecimationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the probe-count floor
    pub fn with_min_probes(mut self, min_probes: usize) -> Self {
        self.min_probes = min_probes;
        self.use_min_probes = true;
        self
    }

    /// Enable the error ceiling
    pub fn with_max_error(mut self, max_error: f64) -> Self {
        self.max_error = max_error;
        self.use_max_error = true;
        self
    }

    pub fn without_min_probes(mut self) -> Self {
        self.use_min_probes = false;
        self
    }

    pub fn without_max_error(mut self) -> Self {
        self.use_max_error = false;
        self
    }

    /// Try a seeded random subset of `count` candidates per iteration
    pub fn with_stochastic(mut self, count: usize) -> Self {
        self.stochastic_sample_count = count;
        self.use_stochastic = true;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_zero_cost_policy(mut self, policy: ZeroCostPolicy) -> Self {
        self.zero_cost_policy = policy;
        self
    }

    pub fn with_fallback_min_probes(mut self, min_probes: usize) -> Self {
        self.fallback_min_probes = Some(min_probes);
        self
    }

    pub fn with_directions(mut self, directions: SamplingMode) -> Self {
        self.directions = directions;
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_solver(mut self, solver: Solver) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_spatial(mut self, spatial: SpatialConfig) -> Self {
        self.spatial = spatial;
        self
    }

    /// Check value ranges.
    ///
    /// A configuration with no termination condition is not rejected here;
    /// the engine resolves it against `fallback_min_probes` at run time.
    pub fn validate(&self) -> Result<()> {
        if self.use_max_error && !(self.max_error.is_finite() && self.max_error >= 0.0) {
            return Err(Error::Configuration(format!(
                "max_error must be finite and non-negative, got {}",
                self.max_error
            )));
        }
        if self.use_stochastic && self.stochastic_sample_count == 0 {
            return Err(Error::Configuration(
                "stochastic_sample_count must be positive".to_string(),
            ));
        }
        if self.directions.count() == 0 {
            return Err(Error::Configuration(
                "at least one sampling direction is required".to_string(),
            ));
        }
        if !(self.spatial.containment_tolerance >= 0.0) {
            return Err(Error::Configuration(format!(
                "containment_tolerance must be non-negative, got {}",
                self.spatial.containment_tolerance
            )));
        }
        Ok(())
    }

    /// Whether at least one termination condition is selected
    pub fn has_termination_condition(&self) -> bool {
        self.use_min_probes || self.use_max_error
    }
}
