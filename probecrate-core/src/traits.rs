//! Service traits the decimation core consumes from its host

use crate::point::{Color, Point3f, Vector3f};
use crate::sh::ShL2;
use crate::{Error, Result};

/// Output of a tetrahedralization oracle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tetrahedralization {
    /// Flattened tetrahedra, four indices into `positions` per cell
    pub indices: Vec<usize>,
    /// Positions the indices refer to; shorter than the input when the
    /// oracle merged near-duplicate points
    pub positions: Vec<Point3f>,
}

impl Tetrahedralization {
    /// Number of tetrahedra
    pub fn len(&self) -> usize {
        self.indices.len() / 4
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterate the cells as `[usize; 4]`
    pub fn cells(&self) -> impl Iterator<Item = [usize; 4]> + '_ {
        self.indices
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
    }

    /// Check that the index list is well formed
    pub fn validate(&self) -> Result<()> {
        if self.indices.len() % 4 != 0 {
            return Err(Error::InvalidData(format!(
                "tetrahedron index count {} is not divisible by 4",
                self.indices.len()
            )));
        }
        if let Some(bad) = self.indices.iter().find(|&&i| i >= self.positions.len()) {
            return Err(Error::InvalidData(format!(
                "tetrahedron index {} out of range for {} positions",
                bad,
                self.positions.len()
            )));
        }
        for cell in self.cells() {
            let unique = (0..4).all(|a| (a + 1..4).all(|b| cell[a] != cell[b]));
            if !unique {
                return Err(Error::InvalidData(format!(
                    "tetrahedron {:?} repeats a vertex",
                    cell
                )));
            }
        }
        Ok(())
    }
}

/// Delaunay tetrahedralization service
pub trait Tetrahedralizer {
    /// Decompose the convex hull of `points` into tetrahedra
    fn tetrahedralize(&self, points: &[Point3f]) -> Result<Tetrahedralization>;
}

/// Radiance baking service producing one encoding per probe position
pub trait RadianceBaker {
    fn bake(&self, positions: &[Point3f]) -> Result<Vec<ShL2>>;
}

impl<F> RadianceBaker for F
where
    F: Fn(&[Point3f]) -> Result<Vec<ShL2>>,
{
    fn bake(&self, positions: &[Point3f]) -> Result<Vec<ShL2>> {
        self(positions)
    }
}

/// Evaluates a radiance encoding into observable color samples
pub trait EncodingEvaluator {
    /// Append one color per direction to `out`
    fn evaluate(&self, encoding: &ShL2, directions: &[Vector3f], out: &mut Vec<Color>);
}

/// Reference evaluator for order-2 real spherical harmonics
#[derive(Debug, Clone, Copy, Default)]
pub struct ShL2Evaluator;

impl EncodingEvaluator for ShL2Evaluator {
    fn evaluate(&self, encoding: &ShL2, directions: &[Vector3f], out: &mut Vec<Color>) {
        out.extend(directions.iter().map(|d| encoding.evaluate(d)));
    }
}
