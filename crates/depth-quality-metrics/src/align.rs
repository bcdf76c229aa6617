//! Marker-based rigid registration of a capture into the fixture frame.
//!
//! Every detected marker corner is a pixel. The cloud point that projects
//! onto that pixel is its measured 3D position, and the fiducial table gives
//! the matching fixture coordinate. A least-squares rigid fit over these
//! pairs maps the camera frame onto the (depth-scaled) fixture frame.

use depth_quality_core::{
    estimate_rigid_transform, CameraIntrinsics, GrayImageView, PixelCoord, PointCloud,
    RigidSolveError, RigidTransform,
};
use depth_quality_fixture::{CornerLocation, FiducialLookupError, ReferenceMesh};
use log::{debug, warn};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::markers::{detect_markers, DetectedMarker, MarkerDetectError, MarkerDetector};

#[derive(thiserror::Error, Debug)]
pub enum AlignError {
    #[error(transparent)]
    Detect(#[from] MarkerDetectError),
    #[error(transparent)]
    Lookup(#[from] FiducialLookupError),
    #[error(transparent)]
    Solve(#[from] RigidSolveError),
    #[error("no fiducial markers detected")]
    NoMarkers,
    #[error("depth scale must be positive and finite, got {0}")]
    InvalidDepthScale(f64),
}

/// Direction the fixture faces in its own frame, seen from the camera.
pub fn canonical_facing() -> Vector3<f64> {
    Vector3::new(0.0, 0.0, -1.0)
}

/// A marker corner matched to a cloud point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub marker_id: i32,
    pub location: CornerLocation,
    pub pixel: PixelCoord,
    /// Camera frame, sensor units.
    pub measured: Point3<f64>,
    /// Fixture frame multiplied by the depth scale.
    pub reference: Point3<f64>,
}

/// Output of [`align`].
#[derive(Clone, Debug)]
pub struct AlignmentResult {
    /// The input cloud expressed in the depth-scaled fixture frame.
    pub cloud: PointCloud,
    /// Viewing direction in the fixture frame, see [`canonical_facing`].
    pub camera_angle: Vector3<f64>,
    /// Camera frame to depth-scaled fixture frame.
    pub transform: RigidTransform,
    pub correspondences: Vec<Correspondence>,
    /// RMS distance between transformed measured and reference corners.
    pub residual: f64,
}

/// Find, for each target pixel, the cloud point projecting onto it.
///
/// The cloud is scanned once; projections are floored to integer pixels.
/// When several points land on the same target the last one wins. Points
/// at or behind the camera, or with non-finite coordinates, are skipped.
pub fn lookup_corner_points(
    cloud: &PointCloud,
    intrinsics: &CameraIntrinsics,
    targets: &HashSet<PixelCoord>,
) -> HashMap<PixelCoord, Point3<f64>> {
    let mut found = HashMap::with_capacity(targets.len());
    if targets.is_empty() {
        return found;
    }
    for p in cloud.iter() {
        let Some(px) = intrinsics.project_floor(p) else {
            continue;
        };
        if targets.contains(&px) {
            found.insert(px, *p);
        }
    }
    found
}

/// Pair marker corners with cloud points and fixture coordinates.
///
/// An unknown marker id fails the capture even if none of its corners has a
/// valid depth sample. Corners without a matching cloud point are dropped.
pub fn build_correspondences(
    reference: &ReferenceMesh,
    markers: &[DetectedMarker],
    cloud: &PointCloud,
    intrinsics: &CameraIntrinsics,
    depth_scale: f64,
) -> Result<Vec<Correspondence>, AlignError> {
    let targets: HashSet<PixelCoord> = markers
        .iter()
        .flat_map(|m| m.corners())
        .filter_map(|(_, c)| PixelCoord::from_subpixel(c))
        .collect();
    let measured = lookup_corner_points(cloud, intrinsics, &targets);

    let mut out = Vec::with_capacity(markers.len() * 4);
    let mut unmatched = 0usize;
    for marker in markers {
        for (location, corner) in marker.corners() {
            let fixture_point = reference.fiducial_coordinate(marker.id, location)?;
            let hit = PixelCoord::from_subpixel(corner)
                .and_then(|px| measured.get(&px).map(|p| (px, *p)));
            match hit {
                Some((pixel, p)) => out.push(Correspondence {
                    marker_id: marker.id,
                    location,
                    pixel,
                    measured: p,
                    reference: Point3::from(fixture_point.coords * depth_scale),
                }),
                None => unmatched += 1,
            }
        }
    }
    if unmatched > 0 {
        warn!("{unmatched} marker corners have no valid depth sample");
    }
    debug!("{} corner correspondences", out.len());
    Ok(out)
}

fn check_depth_scale(depth_scale: f64) -> Result<(), AlignError> {
    if depth_scale.is_finite() && depth_scale > 0.0 {
        Ok(())
    } else {
        Err(AlignError::InvalidDepthScale(depth_scale))
    }
}

/// Align a capture using already detected markers.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip(reference, markers, intrinsics, cloud),
        fields(markers = markers.len(), points = cloud.len())
    )
)]
pub fn align_with_markers(
    reference: &ReferenceMesh,
    markers: &[DetectedMarker],
    intrinsics: &CameraIntrinsics,
    mut cloud: PointCloud,
    depth_scale: f64,
) -> Result<AlignmentResult, AlignError> {
    check_depth_scale(depth_scale)?;
    if markers.is_empty() {
        return Err(AlignError::NoMarkers);
    }

    let correspondences =
        build_correspondences(reference, markers, &cloud, intrinsics, depth_scale)?;
    let (src, dst): (Vec<_>, Vec<_>) = correspondences
        .iter()
        .map(|c| (c.measured, c.reference))
        .unzip();

    let transform = estimate_rigid_transform(&src, &dst)?;
    let residual = transform.rms_residual(&src, &dst);
    let camera_angle = transform.rotate(&canonical_facing());
    debug!(
        "alignment residual {:.3e} over {} corners, camera angle {:?}",
        residual,
        src.len(),
        camera_angle.as_slice()
    );

    cloud.transform(&transform);
    Ok(AlignmentResult {
        cloud,
        camera_angle,
        transform,
        correspondences,
        residual,
    })
}

/// Detect markers in `image` and align the capture into the fixture frame.
pub fn align<D: MarkerDetector + ?Sized>(
    reference: &ReferenceMesh,
    detector: &D,
    image: &GrayImageView<'_>,
    intrinsics: &CameraIntrinsics,
    cloud: PointCloud,
    depth_scale: f64,
) -> Result<AlignmentResult, AlignError> {
    check_depth_scale(depth_scale)?;
    let markers = detect_markers(detector, image)?;
    align_with_markers(reference, &markers, intrinsics, cloud, depth_scale)
}
