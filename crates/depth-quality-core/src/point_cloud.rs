//! Unordered vertex-only point clouds.

use crate::mesh::Aabb;
use crate::rigid::RigidTransform;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// A bag of 3D points in sensor units.
///
/// Invalid samples (non-finite coordinates) may be present; consumers skip
/// them instead of failing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloud {
    pub points: Vec<Point3<f64>>,
}

impl PointCloud {
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point3<f64>> {
        self.points.iter()
    }

    /// Apply a rigid transform to every point in place.
    pub fn transform(&mut self, t: &RigidTransform) {
        for p in &mut self.points {
            *p = t.apply(p);
        }
    }

    /// Keep the points inside `bounds` (inclusive). Non-finite points never
    /// pass.
    pub fn crop(&self, bounds: &Aabb) -> PointCloud {
        PointCloud {
            points: self
                .points
                .iter()
                .filter(|p| bounds.contains(p))
                .copied()
                .collect(),
        }
    }

    /// Multiply every coordinate by `s`.
    pub fn scaled(&self, s: f64) -> PointCloud {
        PointCloud {
            points: self.points.iter().map(|p| Point3::from(p.coords * s)).collect(),
        }
    }

    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.points.iter().filter(|p| is_finite(p)))
    }
}

impl FromIterator<Point3<f64>> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point3<f64>>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

#[inline]
pub(crate) fn is_finite(p: &Point3<f64>) -> bool {
    p.x.is_finite() && p.y.is_finite() && p.z.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Isometry3, Vector3};

    #[test]
    fn crop_is_inclusive_and_drops_nan() {
        let cloud = PointCloud::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(1.0, 1.0, 1.0 + 1e-9),
            Point3::new(f64::NAN, 0.5, 0.5),
        ]);
        let b = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let kept = cloud.crop(&b);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn transform_moves_every_point() {
        let mut cloud = PointCloud::new(vec![Point3::new(1.0, 0.0, 0.0)]);
        let t = RigidTransform::new(Isometry3::new(
            Vector3::new(0.0, 0.0, 2.0),
            Vector3::z() * std::f64::consts::FRAC_PI_2,
        ));
        cloud.transform(&t);
        let p = cloud.points[0];
        assert!((p - Point3::new(0.0, 1.0, 2.0)).norm() < 1e-12);
    }
}
