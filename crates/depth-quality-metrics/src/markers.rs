//! Fiducial marker detection seam.
//!
//! Decoding square markers from an image is delegated to an external
//! detector. This module defines what the pipeline expects from one and
//! relabels the detector's clockwise corner order into named corners.

use depth_quality_core::io::IoError;
use depth_quality_core::GrayImageView;
use depth_quality_fixture::CornerLocation;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum MarkerDetectError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("marker {id} has a non-finite corner")]
    NonFiniteCorner { id: i32 },
    #[error("marker {id} corner ({u:.1}, {v:.1}) lies outside the {width}x{height} image")]
    OutOfBounds {
        id: i32,
        u: f64,
        v: f64,
        width: usize,
        height: usize,
    },
    #[error("marker {0} detected more than once")]
    DuplicateId(i32),
    #[error("marker detector failed: {0}")]
    Backend(String),
}

/// One marker as reported by a detector: four corners, clockwise from the
/// top-left one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawMarker {
    pub id: i32,
    pub corners: [Point2<f64>; 4],
}

/// A marker with named corners.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedMarker {
    pub id: i32,
    pub top_left: Point2<f64>,
    pub top_right: Point2<f64>,
    pub bottom_left: Point2<f64>,
    pub bottom_right: Point2<f64>,
}

impl DetectedMarker {
    pub fn corner(&self, location: CornerLocation) -> Point2<f64> {
        match location {
            CornerLocation::TopLeft => self.top_left,
            CornerLocation::TopRight => self.top_right,
            CornerLocation::BottomLeft => self.bottom_left,
            CornerLocation::BottomRight => self.bottom_right,
        }
    }

    /// Corners in the order of [`CornerLocation::ALL`].
    pub fn corners(&self) -> impl Iterator<Item = (CornerLocation, Point2<f64>)> + '_ {
        CornerLocation::ALL
            .into_iter()
            .map(move |loc| (loc, self.corner(loc)))
    }
}

impl From<RawMarker> for DetectedMarker {
    fn from(raw: RawMarker) -> Self {
        let [tl, tr, br, bl] = raw.corners;
        Self {
            id: raw.id,
            top_left: tl,
            top_right: tr,
            bottom_left: bl,
            bottom_right: br,
        }
    }
}

/// Anything that finds square fiducial markers in a grayscale image.
pub trait MarkerDetector {
    /// Markers found in `image`, corners clockwise from top-left.
    fn detect(&self, image: &GrayImageView<'_>) -> Result<Vec<RawMarker>, MarkerDetectError>;
}

/// Run `detector` and relabel its corners.
pub fn detect_markers<D: MarkerDetector + ?Sized>(
    detector: &D,
    image: &GrayImageView<'_>,
) -> Result<Vec<DetectedMarker>, MarkerDetectError> {
    let raw = detector.detect(image)?;
    log::debug!("detector returned {} markers", raw.len());
    Ok(raw.into_iter().map(DetectedMarker::from).collect())
}

/// Marker detections computed ahead of time by an external tool.
///
/// JSON layout: `{"markers": [{"id": 231, "corners": [[u, v], x4]}]}` with
/// corners clockwise from top-left.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedMarkers {
    pub markers: Vec<RawMarker>,
}

impl PrecomputedMarkers {
    pub fn new(markers: Vec<RawMarker>) -> Self {
        Self { markers }
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl MarkerDetector for PrecomputedMarkers {
    /// Returns the stored markers after checking them against `image`.
    fn detect(&self, image: &GrayImageView<'_>) -> Result<Vec<RawMarker>, MarkerDetectError> {
        let mut seen = HashSet::new();
        for m in &self.markers {
            if !seen.insert(m.id) {
                return Err(MarkerDetectError::DuplicateId(m.id));
            }
            for c in &m.corners {
                if !c.x.is_finite() || !c.y.is_finite() {
                    return Err(MarkerDetectError::NonFiniteCorner { id: m.id });
                }
                if !image.contains(c.x, c.y) {
                    return Err(MarkerDetectError::OutOfBounds {
                        id: m.id,
                        u: c.x,
                        v: c.y,
                        width: image.width,
                        height: image.height,
                    });
                }
            }
        }
        Ok(self.markers.clone())
    }
}
