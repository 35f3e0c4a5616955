//! Sampling directions for evaluating radiance encodings

use itertools::iproduct;
use probecrate_core::Vector3f;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Fixed direction sets built from the 3x3x3 lattice around the origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FixedPattern {
    /// The six axis directions
    Six,
    /// Axes plus the eight cube corners
    Fourteen,
    /// Axes, corners and the twelve edge midpoints
    TwentySix,
}

impl FixedPattern {
    pub fn count(&self) -> usize {
        match self {
            FixedPattern::Six => 6,
            FixedPattern::Fourteen => 14,
            FixedPattern::TwentySix => 26,
        }
    }
}

/// How evaluation directions are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamplingMode {
    Fixed(FixedPattern),
    /// Uniformly distributed over the sphere from a seeded generator
    Random { count: usize, seed: u64 },
}

impl Default for SamplingMode {
    fn default() -> Self {
        SamplingMode::Fixed(FixedPattern::Fourteen)
    }
}

impl SamplingMode {
    pub fn count(&self) -> usize {
        match self {
            SamplingMode::Fixed(pattern) => pattern.count(),
            SamplingMode::Random { count, .. } => *count,
        }
    }
}

/// Lazily generated, cached direction set
#[derive(Debug, Clone, Default)]
pub struct DirectionSampler {
    mode: SamplingMode,
    directions: Vec<Vector3f>,
    generated_for: Option<SamplingMode>,
    generations: usize,
}

impl DirectionSampler {
    pub fn new(mode: SamplingMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> SamplingMode {
        self.mode
    }

    /// Switch modes; directions are regenerated on the next access
    pub fn set_mode(&mut self, mode: SamplingMode) {
        self.mode = mode;
    }

    /// Current directions, generated if the mode changed since last time
    pub fn directions(&mut self) -> &[Vector3f] {
        if self.generated_for != Some(self.mode) {
            self.directions = match self.mode {
                SamplingMode::Fixed(pattern) => fixed_directions(pattern),
                SamplingMode::Random { count, seed } => random_directions(count, seed),
            };
            self.generated_for = Some(self.mode);
            self.generations += 1;
        }
        &self.directions
    }

    /// How many times the direction set has been built
    pub fn generation_count(&self) -> usize {
        self.generations
    }
}

/// Unit directions toward the lattice neighbours, axes first, then corners,
/// then edges
pub fn fixed_directions(pattern: FixedPattern) -> Vec<Vector3f> {
    let lattice: Vec<(i32, Vector3f)> = iproduct!(-1i32..=1, -1i32..=1, -1i32..=1)
        .filter(|&(x, y, z)| (x, y, z) != (0, 0, 0))
        .map(|(x, y, z)| {
            let nonzero = x.abs() + y.abs() + z.abs();
            (nonzero, Vector3f::new(x as f32, y as f32, z as f32).normalize())
        })
        .collect();

    let of = |n: i32| lattice.iter().filter(move |(k, _)| *k == n).map(|(_, d)| *d);
    let mut directions: Vec<Vector3f> = of(1).collect();
    if pattern != FixedPattern::Six {
        directions.extend(of(3));
    }
    if pattern == FixedPattern::TwentySix {
        directions.extend(of(2));
    }
    directions
}

/// `count` directions uniformly distributed over the unit sphere
pub fn random_directions(count: usize, seed: u64) -> Vec<Vector3f> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let z: f32 = 2.0 * rng.gen::<f32>() - 1.0;
            let phi: f32 = 2.0 * PI * rng.gen::<f32>();
            let r = (1.0 - z * z).max(0.0).sqrt();
            Vector3f::new(r * phi.cos(), r * phi.sin(), z)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fixed_patterns_are_cumulative() {
        let six = fixed_directions(FixedPattern::Six);
        let fourteen = fixed_directions(FixedPattern::Fourteen);
        let twenty_six = fixed_directions(FixedPattern::TwentySix);
        assert_eq!(six.len(), 6);
        assert_eq!(fourteen.len(), 14);
        assert_eq!(twenty_six.len(), 26);
        assert_eq!(&fourteen[..6], &six[..]);
        assert_eq!(&twenty_six[..14], &fourteen[..]);

        for d in &twenty_six {
            assert_relative_eq!(d.norm(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_fixed_patterns_are_symmetric() {
        let dirs = fixed_directions(FixedPattern::TwentySix);
        let sum: Vector3f = dirs.iter().sum();
        assert!(sum.norm() < 1e-5);
    }

    #[test]
    fn test_random_directions_are_seeded() {
        let a = random_directions(32, 7);
        let b = random_directions(32, 7);
        let c = random_directions(32, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        for d in &a {
            assert_relative_eq!(d.norm(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_sampler_regenerates_only_on_mode_change() {
        let mut sampler = DirectionSampler::new(SamplingMode::Fixed(FixedPattern::Six));
        assert_eq!(sampler.directions().len(), 6);
        assert_eq!(sampler.directions().len(), 6);
        assert_eq!(sampler.generation_count(), 1);

        sampler.set_mode(SamplingMode::Fixed(FixedPattern::Six));
        sampler.directions();
        assert_eq!(sampler.generation_count(), 1);

        sampler.set_mode(SamplingMode::Random { count: 10, seed: 1 });
        assert_eq!(sampler.directions().len(), 10);
        sampler.set_mode(SamplingMode::Random { count: 10, seed: 2 });
        sampler.directions();
        assert_eq!(sampler.generation_count(), 3);
    }
}
