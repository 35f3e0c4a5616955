//! Analytic sky light field for the demos
//!
//! Radiance is a zenith-to-horizon gradient with a sun lobe over a flat
//! ground, shadowed by a rectangular canopy. Probes under the canopy see a
//! dimmer, greener sky, so the baked field varies across the probe volume.

use probecrate_core::{Color, Point3f, RadianceBaker, Result, ShL2, Vector3f};
use probecrate_decimation::random_directions;
use rayon::prelude::*;
use std::f32::consts::PI;

pub struct AnalyticSkyBaker {
    pub sun_direction: Vector3f,
    pub sun_color: Color,
    pub zenith: Color,
    pub horizon: Color,
    pub ground: Color,
    /// Axis-aligned canopy footprint `(min_x, min_y, max_x, max_y)` at `canopy_height`
    pub canopy: (f32, f32, f32, f32),
    pub canopy_height: f32,
    directions: Vec<Vector3f>,
}

impl AnalyticSkyBaker {
    /// Baker projecting with `samples` seeded Monte-Carlo directions
    pub fn new(samples: usize, seed: u64) -> Self {
        Self {
            sun_direction: Vector3f::new(0.4, 0.3, 0.85).normalize(),
            sun_color: Color::new(6.0, 5.2, 4.0),
            zenith: Color::new(0.25, 0.45, 0.9),
            horizon: Color::new(0.85, 0.85, 0.8),
            ground: Color::new(0.2, 0.17, 0.12),
            canopy: (0.0, 0.0, 2.0, 2.0),
            canopy_height: 3.0,
            directions: random_directions(samples, seed),
        }
    }

    pub fn with_canopy(mut self, min_x: f32, min_y: f32, max_x: f32, max_y: f32, height: f32) -> Self {
        self.canopy = (min_x, min_y, max_x, max_y);
        self.canopy_height = height;
        self
    }

    fn under_canopy(&self, position: &Point3f, direction: &Vector3f) -> bool {
        if direction.z <= 0.0 || position.z >= self.canopy_height {
            return false;
        }
        let t = (self.canopy_height - position.z) / direction.z;
        let x = position.x + direction.x * t;
        let y = position.y + direction.y * t;
        let (min_x, min_y, max_x, max_y) = self.canopy;
        x >= min_x && x <= max_x && y >= min_y && y <= max_y
    }

    /// Radiance arriving at `position` from `direction`
    pub fn radiance(&self, position: &Point3f, direction: &Vector3f) -> Color {
        if direction.z < 0.0 {
            return self.ground * (1.0 + 0.5 * direction.z);
        }
        let sky = self.horizon.lerp(&self.zenith, direction.z.sqrt());
        let sun = self.sun_color * direction.dot(&self.sun_direction).max(0.0).powi(32);
        if self.under_canopy(position, direction) {
            (sky + sun).component_mul(&Color::new(0.08, 0.15, 0.06))
        } else {
            sky + sun
        }
    }

    fn project(&self, position: &Point3f) -> ShL2 {
        let weight = 4.0 * PI / self.directions.len().max(1) as f32;
        let mut sh = ShL2::zero();
        for direction in &self.directions {
            sh.add_sample(direction, &self.radiance(position, direction), weight);
        }
        sh
    }
}

impl RadianceBaker for AnalyticSkyBaker {
    fn bake(&self, positions: &[Point3f]) -> Result<Vec<ShL2>> {
        Ok(positions.par_iter().map(|p| self.project(p)).collect())
    }
}
