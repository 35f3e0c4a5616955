//! # probecrate spatial index
//!
//! Tetrahedral point location for light probe evaluation.
//!
//! This crate maps evaluation points onto the tetrahedral decomposition of a
//! probe set and blends the corner radiance encodings:
//! - Barycentric weights (volume-ratio and matrix-inverse forms)
//! - Ray/triangle fallback for points outside the decomposition
//! - `TetrahedronGraph`, the cached per-point mapping
//! - A reference Bowyer–Watson `Tetrahedralizer`

pub mod barycentric;
pub mod raycast;
pub mod delaunay;
pub mod graph;
pub mod interpolate;

// Re-export commonly used items
pub use barycentric::*;
pub use raycast::*;
pub use delaunay::*;
pub use graph::*;
pub use interpolate::*;
