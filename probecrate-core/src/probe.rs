//! Probe and probe set containers

use crate::point::Point3f;
use crate::sh::ShL2;
use crate::traits::RadianceBaker;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A light probe: a position plus its baked radiance encoding
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    pub position: Point3f,
    pub encoding: ShL2,
}

impl Probe {
    pub fn new(position: Point3f, encoding: ShL2) -> Self {
        Self { position, encoding }
    }
}

/// An ordered set of probes.
///
/// Positions and encodings are stored in two parallel vectors so the
/// positions can be handed to a tetrahedralizer as a slice. A probe's
/// identity is its index, which shifts on removal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeSet {
    positions: Vec<Point3f>,
    encodings: Vec<ShL2>,
}

impl ProbeSet {
    /// Create an empty probe set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a probe set from matching position and encoding lists
    pub fn from_parts(positions: Vec<Point3f>, encodings: Vec<ShL2>) -> Result<Self> {
        if positions.len() != encodings.len() {
            return Err(Error::InvalidData(format!(
                "probe set needs one encoding per position, got {} positions and {} encodings",
                positions.len(),
                encodings.len()
            )));
        }
        Ok(Self { positions, encodings })
    }

    /// Create a probe set where every probe carries the same encoding
    pub fn uniform(positions: Vec<Point3f>, encoding: ShL2) -> Self {
        let encodings = vec![encoding; positions.len()];
        Self { positions, encodings }
    }

    /// Bake encodings for `positions` with an external baker
    pub fn bake<B: RadianceBaker + ?Sized>(positions: Vec<Point3f>, baker: &B) -> Result<Self> {
        let encodings = baker.bake(&positions)?;
        Self::from_parts(positions, encodings)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Point3f] {
        &self.positions
    }

    pub fn encodings(&self) -> &[ShL2] {
        &self.encodings
    }

    pub fn get(&self, index: usize) -> Option<Probe> {
        Some(Probe::new(*self.positions.get(index)?, *self.encodings.get(index)?))
    }

    pub fn push(&mut self, probe: Probe) {
        self.positions.push(probe.position);
        self.encodings.push(probe.encoding);
    }

    /// Remove the probe at `index`, shifting later probes down
    pub fn remove(&mut self, index: usize) -> Result<Probe> {
        if index >= self.len() {
            return Err(Error::InvalidData(format!(
                "probe index {} out of range for {} probes",
                index,
                self.len()
            )));
        }
        let position = self.positions.remove(index);
        let encoding = self.encodings.remove(index);
        Ok(Probe::new(position, encoding))
    }

    /// Insert a probe at `index`; undoes a `remove` at the same index
    pub fn insert(&mut self, index: usize, probe: Probe) -> Result<()> {
        if index > self.len() {
            return Err(Error::InvalidData(format!(
                "insert index {} out of range for {} probes",
                index,
                self.len()
            )));
        }
        self.positions.insert(index, probe.position);
        self.encodings.insert(index, probe.encoding);
        Ok(())
    }

    /// A copy of this set without the probe at `index`
    pub fn without(&self, index: usize) -> Result<Self> {
        if index >= self.len() {
            return Err(Error::InvalidData(format!(
                "probe index {} out of range for {} probes",
                index,
                self.len()
            )));
        }
        let mut trial = Self {
            positions: Vec::with_capacity(self.len() - 1),
            encodings: Vec::with_capacity(self.len() - 1),
        };
        for (i, (p, e)) in self.positions.iter().zip(&self.encodings).enumerate() {
            if i != index {
                trial.positions.push(*p);
                trial.encodings.push(*e);
            }
        }
        Ok(trial)
    }

    /// Raw little-endian bytes of every position followed by every encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len() * (12 + std::mem::size_of::<ShL2>()));
        for p in &self.positions {
            for v in p.coords.iter() {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
        }
        bytes.extend_from_slice(bytemuck::cast_slice(&self.encodings));
        bytes
    }

    pub fn iter(&self) -> impl Iterator<Item = Probe> + '_ {
        self.positions
            .iter()
            .zip(self.encodings.iter())
            .map(|(p, e)| Probe::new(*p, *e))
    }
}

impl FromIterator<Probe> for ProbeSet {
    fn from_iter<I: IntoIterator<Item = Probe>>(iter: I) -> Self {
        let mut set = Self::new();
        for probe in iter {
            set.push(probe);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Color;

    fn make_set() -> ProbeSet {
        (0..5)
            .map(|i| {
                Probe::new(
                    Point3f::new(i as f32, (i * 2) as f32, 0.5),
                    ShL2::constant(Color::new(i as f32 * 0.1, 0.2, 0.3)),
                )
            })
            .collect()
    }

    #[test]
    fn test_mismatched_parts() {
        let result = ProbeSet::from_parts(vec![Point3f::origin()], vec![]);
        assert!(result.is_err());
    }

    #[test]
    fn test_remove_insert_round_trip() {
        let mut set = make_set();
        let before = set.to_bytes();
        for index in 0..set.len() {
            let removed = set.remove(index).unwrap();
            assert_eq!(set.len(), 4);
            set.insert(index, removed).unwrap();
            assert_eq!(set.to_bytes(), before);
        }
    }

    #[test]
    fn test_without_leaves_original_untouched() {
        let set = make_set();
        let before = set.to_bytes();
        let trial = set.without(2).unwrap();
        assert_eq!(trial.len(), 4);
        assert_eq!(trial.positions()[2], Point3f::new(3.0, 6.0, 0.5));
        assert_eq!(set.to_bytes(), before);
        assert!(set.without(5).is_err());
    }

    #[test]
    fn test_out_of_range() {
        let mut set = make_set();
        assert!(set.remove(10).is_err());
        let probe = set.get(0).unwrap();
        assert!(set.insert(10, probe).is_err());
        assert!(set.get(10).is_none());
    }

    #[test]
    fn test_bake_validates_cardinality() {
        let baker = |positions: &[Point3f]| -> Result<Vec<ShL2>> {
            Ok(vec![ShL2::zero(); positions.len() + 1])
        };
        assert!(ProbeSet::bake(vec![Point3f::origin()], &baker).is_err());

        let good = |positions: &[Point3f]| -> Result<Vec<ShL2>> {
            Ok(vec![ShL2::zero(); positions.len()])
        };
        let set = ProbeSet::bake(vec![Point3f::origin(); 3], &good).unwrap();
        assert_eq!(set.len(), 3);
    }
}
