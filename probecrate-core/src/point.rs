//! Point, vector and color types

use nalgebra::{Point3, Vector3};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D vector with floating point components
pub type Vector3f = Vector3<f32>;

/// A linear RGB color sample
pub type Color = Vector3<f32>;

/// Arithmetic mean of a set of points, `None` when the set is empty
pub fn centroid(points: &[Point3f]) -> Option<Point3f> {
    if points.is_empty() {
        return None;
    }

    let sum = points
        .iter()
        .fold(Vector3f::zeros(), |acc, p| acc + p.coords);
    Some(Point3f::from(sum / points.len() as f32))
}

/// Axis-aligned bounds of a set of points as `(min, max)`
pub fn bounding_box(points: &[Point3f]) -> Option<(Point3f, Point3f)> {
    let first = *points.first()?;
    let mut min = first;
    let mut max = first;

    for p in points {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        min.z = min.z.min(p.z);

        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
        max.z = max.z.max(p.z);
    }

    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_centroid() {
        let points = vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(2.0, 0.0, 0.0),
            Point3f::new(0.0, 4.0, 2.0),
            Point3f::new(2.0, 4.0, 2.0),
        ];
        let c = centroid(&points).unwrap();
        assert_relative_eq!(c.x, 1.0);
        assert_relative_eq!(c.y, 2.0);
        assert_relative_eq!(c.z, 1.0);
        assert!(centroid(&[]).is_none());
    }

    #[test]
    fn test_bounding_box() {
        let points = vec![Point3f::new(1.0, -2.0, 3.0), Point3f::new(-1.0, 5.0, 0.5)];
        let (min, max) = bounding_box(&points).unwrap();
        assert_eq!(min, Point3f::new(-1.0, -2.0, 0.5));
        assert_eq!(max, Point3f::new(1.0, 5.0, 3.0));
    }
}
