//! Estimation of the radiance seen at mapped evaluation points

use crate::directions::{DirectionSampler, SamplingMode};
use probecrate_core::{Color, EncodingEvaluator, Error, Result, ShL2};
use probecrate_spatial::{interpolate_mapping, EvaluationMapping, TetrahedronGraph};
use rayon::prelude::*;

/// Interpolates probe encodings at each evaluation point and evaluates them
/// over the sampling directions.
///
/// Output is flat and point-major: `colors[point * directions + k]`.
#[derive(Debug, Clone)]
pub struct Evaluator<V> {
    evaluator: V,
    sampler: DirectionSampler,
    parallel: bool,
}

impl<V: EncodingEvaluator + Sync> Evaluator<V> {
    pub fn new(evaluator: V, mode: SamplingMode, parallel: bool) -> Self {
        Self {
            evaluator,
            sampler: DirectionSampler::new(mode),
            parallel,
        }
    }

    pub fn set_mode(&mut self, mode: SamplingMode) {
        self.sampler.set_mode(mode);
    }

    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    pub fn sampler(&self) -> &DirectionSampler {
        &self.sampler
    }

    /// Number of colors produced per evaluation point
    pub fn samples_per_point(&mut self) -> usize {
        self.sampler.directions().len()
    }

    /// Estimate every evaluation point of `graph` from `encodings`.
    ///
    /// When `baseline` holds the estimates of the committed probe set, points
    /// whose mapping is unchanged copy them instead of being re-evaluated.
    /// Any unmapped point is an error.
    pub fn evaluate(
        &mut self,
        graph: &TetrahedronGraph,
        encodings: &[ShL2],
        baseline: Option<&[Color]>,
    ) -> Result<Vec<Color>> {
        let directions = self.sampler.directions();
        let per_point = directions.len();
        let mappings = graph.mappings();
        let baseline = baseline.filter(|b| b.len() == mappings.len() * per_point);

        let estimate = |(index, mapping): (usize, &EvaluationMapping)| -> Result<Vec<Color>> {
            if let Some(cached) = baseline {
                if !mapping.changed {
                    return Ok(cached[index * per_point..(index + 1) * per_point].to_vec());
                }
            }
            let encoding = interpolate_mapping(mapping, encodings).ok_or_else(|| {
                Error::DegenerateGeometry(format!("evaluation point {} is not mapped", index))
            })?;
            let mut colors = Vec::with_capacity(per_point);
            self.evaluator.evaluate(&encoding, directions, &mut colors);
            Ok(colors)
        };

        let per_mapping: Vec<Vec<Color>> = if self.parallel {
            mappings.par_iter().enumerate().map(estimate).collect::<Result<_>>()?
        } else {
            mappings.iter().enumerate().map(estimate).collect::<Result<_>>()?
        };

        Ok(per_mapping.into_iter().flatten().collect())
    }
}
