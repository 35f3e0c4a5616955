//! Core data structures and traits for probecrate
//!
//! This crate provides the fundamental types shared by the light probe
//! pipeline: points and colors, the order-2 spherical harmonic radiance
//! encoding, probes and probe sets, the service traits the decimation core
//! consumes from its host, and the injected logging capability.

pub mod point;
pub mod sh;
pub mod probe;
pub mod traits;
pub mod logging;
pub mod error;

pub use point::*;
pub use sh::*;
pub use probe::*;
pub use traits::*;
pub use logging::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Matrix3, Point3, Vector3};

/// Re-export the log level type used by `DecimationLogger`
pub use tracing::Level;
