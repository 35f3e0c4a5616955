//! Per-stage wall-clock accounting for a decimation run

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::{Duration, Instant};

/// Timed stages of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Reference,
    Tetrahedralize,
    Mapping,
    Evaluation,
    Solve,
    Iteration,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Reference,
        Stage::Tetrahedralize,
        Stage::Mapping,
        Stage::Evaluation,
        Stage::Solve,
        Stage::Iteration,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Reference => "reference",
            Stage::Tetrahedralize => "tetrahedralize",
            Stage::Mapping => "mapping",
            Stage::Evaluation => "evaluation",
            Stage::Solve => "solve",
            Stage::Iteration => "iteration",
        }
    }
}

/// Accumulated time and call count of one stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTiming {
    pub total: Duration,
    pub calls: u64,
}

impl StageTiming {
    pub fn mean(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            let nanos = self.total.as_nanos() / u128::from(self.calls);
            u64::try_from(nanos).map_or(Duration::MAX, Duration::from_nanos)
        }
    }
}

/// Stage timings, owned by one engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportTimer {
    stages: BTreeMap<Stage, StageTiming>,
}

impl ReportTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.stages.clear();
    }

    /// Add one call of `stage` lasting `elapsed`
    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        let timing = self.stages.entry(stage).or_default();
        timing.total += elapsed;
        timing.calls += 1;
    }

    /// Run `f` and record its duration under `stage`
    pub fn time<R>(&mut self, stage: Stage, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let result = f();
        self.record(stage, start.elapsed());
        result
    }

    pub fn get(&self, stage: Stage) -> StageTiming {
        self.stages.get(&stage).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stage, StageTiming)> + '_ {
        self.stages.iter().map(|(stage, timing)| (*stage, *timing))
    }

    /// One line per recorded stage
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (stage, timing) in self.iter() {
            let _ = writeln!(
                out,
                "{:<15} {:>10.3} ms  {:>8} calls  {:>10.3} ms/call",
                stage.name(),
                timing.total.as_secs_f64() * 1e3,
                timing.calls,
                timing.mean().as_secs_f64() * 1e3,
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates() {
        let mut timer = ReportTimer::new();
        timer.record(Stage::Mapping, Duration::from_millis(2));
        timer.record(Stage::Mapping, Duration::from_millis(4));
        let mapping = timer.get(Stage::Mapping);
        assert_eq!(mapping.calls, 2);
        assert_eq!(mapping.total, Duration::from_millis(6));
        assert_eq!(mapping.mean(), Duration::from_millis(3));
        assert_eq!(timer.get(Stage::Solve), StageTiming::default());
    }

    #[test]
    fn test_mean_over_many_calls() {
        let timing = StageTiming {
            total: Duration::from_secs(1 << 32),
            calls: 1 << 32,
        };
        assert_eq!(timing.mean(), Duration::from_secs(1));

        let timing = StageTiming {
            total: Duration::from_millis(10),
            calls: (1 << 32) + 4,
        };
        assert!(timing.mean() < Duration::from_nanos(3));
    }

    #[test]
    fn test_time_returns_closure_result() {
        let mut timer = ReportTimer::new();
        let value = timer.time(Stage::Solve, || 41 + 1);
        assert_eq!(value, 42);
        assert_eq!(timer.get(Stage::Solve).calls, 1);
    }

    #[test]
    fn test_summary_and_reset() {
        let mut timer = ReportTimer::new();
        timer.record(Stage::Reference, Duration::from_millis(1));
        timer.record(Stage::Iteration, Duration::from_millis(1));
        let summary = timer.summary();
        assert_eq!(summary.lines().count(), 2);
        assert!(summary.starts_with("reference"));

        timer.reset();
        assert!(timer.summary().is_empty());
    }

    #[test]
    fn test_serializes_to_json() {
        let mut timer = ReportTimer::new();
        timer.record(Stage::Evaluation, Duration::from_micros(250));
        let json = serde_json::to_string(&timer).unwrap();
        let back: ReportTimer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, timer);
    }
}
