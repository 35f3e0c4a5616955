//! Loss functions over (estimate, reference) color samples

use crate::metric::Metric;
use probecrate_core::{Color, Error, Result};
use serde::{Deserialize, Serialize};

/// Reduction of per-sample color errors to one scalar cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Solver {
    /// Largest per-sample relative error, in percent
    MaxPercentageError,
    /// Mean per-sample relative error, in percent
    #[default]
    AveragePercentageError,
    /// Sum of absolute weighted differences
    L1,
    /// Euclidean norm of the weighted differences
    L2,
    /// Sum of squared weighted differences
    L2Squared,
}

impl Solver {
    pub const ALL: [Solver; 5] = [
        Solver::MaxPercentageError,
        Solver::AveragePercentageError,
        Solver::L1,
        Solver::L2,
        Solver::L2Squared,
    ];

    /// Whether the cost is a percentage (comparable to `max_error` in %)
    pub fn is_percentage(&self) -> bool {
        matches!(self, Solver::MaxPercentageError | Solver::AveragePercentageError)
    }

    /// Reduce paired samples to a scalar loss.
    ///
    /// `estimates[i]` is compared against `references[i]`; both slices must be
    /// non-empty and of the same length.
    pub fn compute_loss(&self, metric: Metric, estimates: &[Color], references: &[Color]) -> Result<f64> {
        if estimates.len() != references.len() {
            return Err(Error::InvalidData(format!(
                "{} estimates for {} reference samples",
                estimates.len(),
                references.len()
            )));
        }
        if estimates.is_empty() {
            return Err(Error::InvalidData("No samples to compare".to_string()));
        }

        let pairs = estimates.iter().zip(references.iter());
        let loss = match self {
            Solver::MaxPercentageError => {
                pairs
                    .map(|(e, r)| sample_relative_error(metric, e, r))
                    .fold(0.0, f64::max)
                    * 100.0
            }
            Solver::AveragePercentageError => {
                let total: f64 = pairs.map(|(e, r)| sample_relative_error(metric, e, r)).sum();
                total / estimates.len() as f64 * 100.0
            }
            Solver::L1 => pairs
                .map(|(e, r)| active(metric, e, r).map(f64::abs).sum::<f64>())
                .sum(),
            Solver::L2Squared => pairs
                .map(|(e, r)| active(metric, e, r).map(|d| d * d).sum::<f64>())
                .sum(),
            Solver::L2 => pairs
                .map(|(e, r)| active(metric, e, r).map(|d| d * d).sum::<f64>())
                .sum::<f64>()
                .sqrt(),
        };
        Ok(loss)
    }
}

/// Weighted differences of the metric's active channels
fn active(metric: Metric, estimate: &Color, reference: &Color) -> impl Iterator<Item = f64> {
    let d = metric.difference(estimate, reference);
    (0..metric.active_channels()).map(move |c| d[c] as f64)
}

/// Mean over active channels of `|v - r| / (|v| + |r|)`, in `[0, 1]`.
///
/// Channels where both values are zero are skipped; a sample with no valid
/// channel counts as zero error.
pub fn sample_relative_error(metric: Metric, estimate: &Color, reference: &Color) -> f64 {
    let (v, r) = metric.evaluation_pair(estimate, reference);
    let mut sum = 0.0;
    let mut valid = 0usize;
    for c in 0..metric.active_channels() {
        let (v, r) = (v[c] as f64, r[c] as f64);
        let ratio = (v - r).abs() / (v.abs() + r.abs());
        if ratio.is_nan() {
            continue;
        }
        sum += ratio;
        valid += 1;
    }
    if valid == 0 {
        0.0
    } else {
        sum / valid as f64
    }
}
