//! RMSE and coverage density of a cropped, aligned capture.

use depth_quality_core::PointCloud;
use depth_quality_fixture::ReferenceMesh;
use log::{debug, info};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Distance below which a point counts as an inlier, mm.
pub const INLIER_DISTANCE: f64 = 2.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreParams {
    pub inlier_distance: f64,
}

impl Default for ScoreParams {
    fn default() -> Self {
        Self {
            inlier_distance: INLIER_DISTANCE,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ScoreError {
    #[error("no valid points left to score")]
    EmptyCloud,
    #[error("no pattern surface faces the camera")]
    NoVisiblePatternArea,
    #[error("depth scale must be positive and finite, got {0}")]
    InvalidDepthScale(f64),
}

/// Accuracy and coverage of one capture.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    /// Root-mean-square point-to-surface distance, fixture units.
    pub rmse: f64,
    /// Inliers per unit of camera-visible pattern area.
    pub density: f64,
    pub inlier_count: usize,
    /// Points that entered the distance computation.
    pub point_count: usize,
    pub visible_area: f64,
}

/// Squared distance of each finite point to the reference surface.
///
/// Non-finite points are skipped, so the output may be shorter than the
/// input.
pub fn squared_distances(reference: &ReferenceMesh, points: &[Point3<f64>]) -> Vec<f64> {
    let query = |p: &Point3<f64>| {
        if p.iter().all(|v| v.is_finite()) {
            reference.distance_squared(p)
        } else {
            None
        }
    };
    #[cfg(feature = "rayon")]
    {
        points.par_iter().filter_map(query).collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        points.iter().filter_map(query).collect()
    }
}

/// Score with the default inlier threshold.
pub fn score(
    reference: &ReferenceMesh,
    cropped: &PointCloud,
    depth_scale: f64,
    camera_angle: &Vector3<f64>,
) -> Result<QualityScore, ScoreError> {
    score_with_params(
        reference,
        cropped,
        depth_scale,
        camera_angle,
        &ScoreParams::default(),
    )
}

/// Compare a cropped, aligned cloud against the reference surface.
///
/// Points are brought back to fixture units by dividing by `depth_scale`.
/// Distances are measured to the whole reference mesh while the area
/// normaliser only counts camera-facing pattern faces.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip(reference, cropped, camera_angle, params),
        fields(points = cropped.len())
    )
)]
pub fn score_with_params(
    reference: &ReferenceMesh,
    cropped: &PointCloud,
    depth_scale: f64,
    camera_angle: &Vector3<f64>,
    params: &ScoreParams,
) -> Result<QualityScore, ScoreError> {
    if !(depth_scale.is_finite() && depth_scale > 0.0) {
        return Err(ScoreError::InvalidDepthScale(depth_scale));
    }

    let points = cropped.scaled(1.0 / depth_scale);
    let d2 = squared_distances(reference, &points.points);
    if d2.is_empty() {
        return Err(ScoreError::EmptyCloud);
    }

    let rmse = (d2.iter().sum::<f64>() / d2.len() as f64).sqrt();
    let threshold = params.inlier_distance * params.inlier_distance;
    let inlier_count = d2.iter().filter(|&&d| d < threshold).count();

    let visible_area = reference.pattern_surface_area(camera_angle);
    if visible_area.is_nan() || visible_area <= 0.0 {
        return Err(ScoreError::NoVisiblePatternArea);
    }
    let density = inlier_count as f64 / visible_area;

    debug!(
        "{} of {} points within {} of the surface, visible area {:.2}",
        inlier_count,
        d2.len(),
        params.inlier_distance,
        visible_area
    );
    info!("rmse {rmse:.4}, density {density:.4}");

    Ok(QualityScore {
        rmse,
        density,
        inlier_count,
        point_count: d2.len(),
        visible_area,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use depth_quality_fixture::synthetic::SyntheticFixture;

    fn reference() -> ReferenceMesh {
        let f = SyntheticFixture::standard();
        ReferenceMesh::from_mesh(f.mesh, f.spec).unwrap()
    }

    #[test]
    fn rmse_and_inliers_from_known_offsets() {
        let reference = reference();
        // below the backplate, whose bottom face is z = 0
        let cloud = PointCloud::new(vec![
            Point3::new(0.0, 0.0, -1.0),
            Point3::new(0.0, 10.0, -3.0),
            Point3::new(0.0, -10.0, -2.0),
            Point3::new(f64::NAN, 0.0, 0.0),
        ]);
        let q = score(&reference, &cloud, 1.0, &Vector3::z()).unwrap();
        assert_eq!(q.point_count, 3);
        assert_relative_eq!(q.rmse, ((1.0 + 9.0 + 4.0) / 3.0f64).sqrt(), epsilon = 1e-9);
        // 2.0 is not strictly below the threshold
        assert_eq!(q.inlier_count, 1);
        assert_relative_eq!(q.visible_area, 2.0 * 20.0 * 60.0, epsilon = 1e-9);
        assert_relative_eq!(q.density, 1.0 / 2400.0, epsilon = 1e-12);
    }

    #[test]
    fn depth_scale_is_divided_out() {
        let reference = reference();
        let mm = PointCloud::new(vec![Point3::new(20.0, 0.0, 14.35 + 0.5)]);
        let m = mm.scaled(0.001);
        let a = score(&reference, &mm, 1.0, &Vector3::z()).unwrap();
        let b = score(&reference, &m, 0.001, &Vector3::z()).unwrap();
        assert_relative_eq!(a.rmse, b.rmse, epsilon = 1e-9);
        assert_eq!(a.density, b.density);
    }

    #[test]
    fn empty_and_degenerate_inputs_are_errors() {
        let reference = reference();
        assert_eq!(
            score(&reference, &PointCloud::default(), 1.0, &Vector3::z()),
            Err(ScoreError::EmptyCloud)
        );
        let one = PointCloud::new(vec![Point3::new(0.0, 0.0, 10.0)]);
        assert_eq!(
            score(&reference, &one, -1.0, &Vector3::z()),
            Err(ScoreError::InvalidDepthScale(-1.0))
        );
        // a zero viewing direction faces nothing
        assert_eq!(
            score(&reference, &one, 1.0, &Vector3::zeros()),
            Err(ScoreError::NoVisiblePatternArea)
        );
    }
}
