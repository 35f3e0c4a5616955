//! Order-2 spherical harmonic radiance encoding

use crate::point::{Color, Vector3f};
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul};

/// Number of basis functions in an order-2 (L2) real SH expansion
pub const SH_L2_COEFFICIENTS: usize = 9;

const Y0: f32 = 0.282_095;
const Y1: f32 = 0.488_603;
const Y2: f32 = 1.092_548;
const Y2_ZZ: f32 = 0.315_392;
const Y2_XXYY: f32 = 0.546_274;

/// Order-2 real spherical harmonics with one RGB coefficient per basis function.
///
/// This is the radiance encoding stored on every probe. Coefficients are laid
/// out band by band: `(0,0)`, `(1,-1)`, `(1,0)`, `(1,1)`, `(2,-2)` ... `(2,2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct ShL2 {
    pub coefficients: [Vector3f; SH_L2_COEFFICIENTS],
}

unsafe impl Pod for ShL2 {}
unsafe impl Zeroable for ShL2 {}

impl Default for ShL2 {
    fn default() -> Self {
        Self::zero()
    }
}

impl ShL2 {
    /// The all-zero encoding
    pub fn zero() -> Self {
        Self {
            coefficients: [Vector3f::zeros(); SH_L2_COEFFICIENTS],
        }
    }

    /// An encoding that evaluates to `color` in every direction
    pub fn constant(color: Color) -> Self {
        let mut sh = Self::zero();
        sh.coefficients[0] = color / Y0;
        sh
    }

    /// Build from 27 floats, coefficient-major (`c0.r, c0.g, c0.b, c1.r, ...`)
    pub fn from_flat(values: &[f32; SH_L2_COEFFICIENTS * 3]) -> Self {
        let mut sh = Self::zero();
        for (coefficient, rgb) in sh.coefficients.iter_mut().zip(values.chunks_exact(3)) {
            *coefficient = Vector3f::new(rgb[0], rgb[1], rgb[2]);
        }
        sh
    }

    /// View the coefficients as 27 floats in the `from_flat` layout
    pub fn as_flat(&self) -> &[f32] {
        bytemuck::cast_slice(std::slice::from_ref(self))
    }

    /// Real SH basis values for a unit direction
    pub fn basis(direction: &Vector3f) -> [f32; SH_L2_COEFFICIENTS] {
        let (x, y, z) = (direction.x, direction.y, direction.z);
        [
            Y0,
            Y1 * y,
            Y1 * z,
            Y1 * x,
            Y2 * x * y,
            Y2 * y * z,
            Y2_ZZ * (3.0 * z * z - 1.0),
            Y2 * x * z,
            Y2_XXYY * (x * x - y * y),
        ]
    }

    /// Reconstruct the radiance arriving from `direction`
    pub fn evaluate(&self, direction: &Vector3f) -> Color {
        Self::basis(direction)
            .iter()
            .zip(self.coefficients.iter())
            .fold(Color::zeros(), |acc, (b, c)| acc + c * *b)
    }

    /// Accumulate one weighted radiance sample (projection step of a bake)
    pub fn add_sample(&mut self, direction: &Vector3f, color: &Color, weight: f32) {
        for (coefficient, b) in self.coefficients.iter_mut().zip(Self::basis(direction)) {
            *coefficient += color * (b * weight);
        }
    }

    /// `self += other * weight`
    pub fn add_scaled(&mut self, other: &ShL2, weight: f32) {
        for (a, b) in self.coefficients.iter_mut().zip(other.coefficients.iter()) {
            *a += b * weight;
        }
    }
}

impl Add for ShL2 {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign for ShL2 {
    fn add_assign(&mut self, rhs: Self) {
        self.add_scaled(&rhs, 1.0);
    }
}

impl Mul<f32> for ShL2 {
    type Output = Self;

    fn mul(mut self, rhs: f32) -> Self::Output {
        for c in &mut self.coefficients {
            *c *= rhs;
        }
        self
    }
}
