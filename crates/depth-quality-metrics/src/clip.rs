//! Region-of-interest crop of an aligned cloud.
//!
//! Keeps points over the pattern working area and within a slab around the
//! pattern heights, all in the depth-scaled fixture frame.

use depth_quality_core::{Aabb, PointCloud};
use depth_quality_fixture::ReferenceMesh;
use log::debug;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Side length of the square measurement area on the pattern plate, mm.
pub const WORKING_AREA_SIZE: f64 = 82.55;
/// Slack added above and below the patterns, mm.
pub const Z_BUFFER: f64 = 3.0;

/// Region-of-interest parameters, in fixture units.
///
/// The working area is a fixed physical dimension of the fabricated
/// fixtures, centred on the fixture origin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipParams {
    pub working_width: f64,
    pub working_height: f64,
    pub z_buffer: f64,
}

impl Default for ClipParams {
    fn default() -> Self {
        Self {
            working_width: WORKING_AREA_SIZE,
            working_height: WORKING_AREA_SIZE,
            z_buffer: Z_BUFFER,
        }
    }
}

/// Crop box in the depth-scaled fixture frame.
pub fn clip_bounds(reference: &ReferenceMesh, depth_scale: f64, params: &ClipParams) -> Aabb {
    let (z_min, z_max) = reference.pattern_z_range();
    let half_w = params.working_width / 2.0;
    let half_h = params.working_height / 2.0;
    Aabb::new(
        Point3::new(-half_w, -half_h, z_min - params.z_buffer),
        Point3::new(half_w, half_h, z_max + params.z_buffer),
    )
    .scaled(depth_scale)
}

/// Keep the aligned points inside the pattern working volume.
pub fn clip(reference: &ReferenceMesh, aligned: &PointCloud, depth_scale: f64) -> PointCloud {
    clip_with_params(reference, aligned, depth_scale, &ClipParams::default())
}

#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(reference, aligned, params), fields(points = aligned.len()))
)]
pub fn clip_with_params(
    reference: &ReferenceMesh,
    aligned: &PointCloud,
    depth_scale: f64,
    params: &ClipParams,
) -> PointCloud {
    let bounds = clip_bounds(reference, depth_scale, params);
    let cropped = aligned.crop(&bounds);
    debug!("clipped {} -> {} points", aligned.len(), cropped.len());
    cropped
}
