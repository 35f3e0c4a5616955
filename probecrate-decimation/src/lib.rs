//! Light probe decimation
//!
//! This crate removes light probes that contribute least to the radiance seen
//! at a set of evaluation points:
//! - Color metrics and loss solvers
//! - Direction sampling and estimate evaluation
//! - The greedy leave-one-out `DecimationEngine`
//! - Per-stage timing, cancellation and progress reporting

pub mod metric;
pub mod solver;
pub mod directions;
pub mod evaluator;
pub mod timer;
pub mod config;
pub mod progress;
pub mod engine;

pub use metric::*;
pub use solver::*;
pub use directions::*;
pub use evaluator::*;
pub use timer::*;
pub use config::*;
pub use progress::*;
pub use engine::*;
