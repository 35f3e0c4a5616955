//! Injected logging capability
//!
//! Components that report diagnostics take a `DecimationLogger` at
//! construction instead of writing to a global. `TracingLogger` forwards to
//! the `tracing` macros; `MemoryLogger` keeps records for inspection.

use std::sync::Mutex;
use tracing::Level;

/// Sink for leveled diagnostic messages
pub trait DecimationLogger: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Forwards every record to `tracing` under the `probecrate` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl DecimationLogger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        if level == Level::ERROR {
            tracing::error!(target: "probecrate", "{}", message);
        } else if level == Level::WARN {
            tracing::warn!(target: "probecrate", "{}", message);
        } else if level == Level::INFO {
            tracing::info!(target: "probecrate", "{}", message);
        } else if level == Level::DEBUG {
            tracing::debug!(target: "probecrate", "{}", message);
        } else {
            tracing::trace!(target: "probecrate", "{}", message);
        }
    }
}

/// A captured log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
}

/// Keeps every record in memory
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records logged so far
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Records at exactly `level`
    pub fn at_level(&self, level: Level) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level)
            .collect()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.records()
            .iter()
            .any(|r| r.level == level && r.message.contains(needle))
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

impl DecimationLogger for MemoryLogger {
    fn log(&self, level: Level, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push(LogRecord {
                level,
                message: message.to_string(),
            });
        }
    }
}
