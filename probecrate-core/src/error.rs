//! Error types for probecrate

use thiserror::Error;

/// Main error type for probecrate operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),
}

/// Result type alias for probecrate operations
pub type Result<T> = std::result::Result<T, Error>;
