//! Cooperative cancellation and progress reporting

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag, checked once per candidate
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Emitted after every evaluated candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// 1-based iteration number
    pub iteration: usize,
    /// 0-based position of this candidate in the iteration's candidate list
    pub candidate: usize,
    /// Number of candidates in this iteration
    pub candidates: usize,
    /// Committed probe count
    pub probe_count: usize,
    /// Committed error
    pub current_error: f64,
    /// Best cost accepted so far in this iteration
    pub best_cost: Option<f64>,
}

impl ProgressEvent {
    /// Progress through the current iteration, in `[0, 1]`
    pub fn fraction(&self) -> f32 {
        if self.candidates == 0 {
            1.0
        } else {
            (self.candidate + 1) as f32 / self.candidates as f32
        }
    }
}
