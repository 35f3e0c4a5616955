//! # probecrate
//!
//! Light probe evaluation and greedy decimation for Rust.
//!
//! This is the umbrella crate that provides convenient access to all probecrate
//! functionality. You can use this crate to get everything in one place, or use
//! individual crates for more granular control over dependencies.
//!
//! ## Features
//!
//! - **Core**: Probes, order-2 spherical harmonic encodings, service traits, logging
//! - **Spatial**: Tetrahedral point location and interpolation
//! - **Decimation**: Metrics, solvers and the greedy `DecimationEngine`
//!
//! ## Quick Start
//!
//! ```rust
//! use probecrate::prelude::*;
//!
//! let mut positions = Vec::new();
//! for x in [0.0, 1.0] {
//!     for y in [0.0, 1.0] {
//!         for z in [0.0, 1.0] {
//!             positions.push(Point3f::new(x, y, z));
//!         }
//!     }
//! }
//! let probes = ProbeSet::uniform(positions, ShL2::constant(Color::new(1.0, 0.9, 0.8)));
//! let eval = vec![Point3f::new(0.5, 0.5, 0.5)];
//!
//! let config = DecimationConfig::default()
//!     .with_min_probes(4)
//!     .with_zero_cost_policy(ZeroCostPolicy::Accept);
//! let mut engine = DecimationEngine::from_config(config);
//! let report = engine
//!     .decimate(&probes, &eval, &CancellationToken::new(), |_| {})
//!     .unwrap();
//! assert_eq!(report.probes.len(), 4);
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: Enables spatial and decimation
//! - `spatial`: Tetrahedral spatial index
//! - `decimation`: Probe decimation (implies `spatial`)
//! - `all`: Enables all features

// Re-export core functionality
pub use probecrate_core::*;

// Re-export sub-crates
#[cfg(feature = "spatial")]
pub use probecrate_spatial as spatial;

#[cfg(feature = "decimation")]
pub use probecrate_decimation as decimation;

/// Convenient imports for common use cases
pub mod prelude {
    pub use probecrate_core::*;

    #[cfg(feature = "spatial")]
    pub use probecrate_spatial::*;

    #[cfg(feature = "decimation")]
    pub use probecrate_decimation::*;
}
