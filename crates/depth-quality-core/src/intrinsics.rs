//! Pinhole camera intrinsics as exported by the capture tooling.

use crate::io::IoError;
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Integer pixel address `(u, v)` = (column, row).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PixelCoord {
    pub u: i64,
    pub v: i64,
}

impl PixelCoord {
    /// Pixel addressed by a detector's sub-pixel location.
    ///
    /// Uses truncation toward zero, which is how detected corner locations
    /// have always been keyed; projected cloud points use `floor` instead
    /// (see [`CameraIntrinsics::project_floor`]). Both agree for the
    /// non-negative coordinates of a real image.
    pub fn from_subpixel(p: Point2<f64>) -> Option<Self> {
        if !p.x.is_finite() || !p.y.is_finite() {
            return None;
        }
        Some(Self {
            u: p.x.trunc() as i64,
            v: p.y.trunc() as i64,
        })
    }
}

/// Pinhole intrinsics without distortion.
///
/// Extra fields present in exported camera files (image size, distortion
/// model and coefficients) are ignored, except `width`/`height` which are
/// kept when available.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub ppx: f64,
    pub ppy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, ppx: f64, ppy: f64) -> Self {
        Self {
            fx,
            fy,
            ppx,
            ppy,
            width: None,
            height: None,
        }
    }

    /// Load intrinsics from a JSON file with at least `fx, fy, ppx, ppy`.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write intrinsics to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Project a camera-frame point to sub-pixel coordinates.
    ///
    /// Returns `None` for points at or behind the camera and for any
    /// non-finite result.
    #[inline]
    pub fn project(&self, p: &Point3<f64>) -> Option<Point2<f64>> {
        if p.z.is_nan() || p.z <= 0.0 {
            return None;
        }
        let u = self.fx * p.x / p.z + self.ppx;
        let v = self.fy * p.y / p.z + self.ppy;
        if !u.is_finite() || !v.is_finite() {
            return None;
        }
        Some(Point2::new(u, v))
    }

    /// Project a camera-frame point and floor to the containing pixel.
    #[inline]
    pub fn project_floor(&self, p: &Point3<f64>) -> Option<PixelCoord> {
        let q = self.project(p)?;
        Some(PixelCoord {
            u: q.x.floor() as i64,
            v: q.y.floor() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::new(600.0, 610.0, 320.5, 240.25)
    }

    #[test]
    fn project_floor_matches_pinhole_model() {
        let k = intrinsics();
        let p = Point3::new(0.1, -0.05, 0.8);
        let px = k.project_floor(&p).expect("in front of camera");
        assert_eq!(px.u, (600.0_f64 * 0.1 / 0.8 + 320.5).floor() as i64);
        assert_eq!(px.v, (610.0_f64 * -0.05 / 0.8 + 240.25).floor() as i64);
    }

    #[test]
    fn invalid_depth_does_not_project() {
        let k = intrinsics();
        assert!(k.project_floor(&Point3::new(0.1, 0.1, 0.0)).is_none());
        assert!(k.project_floor(&Point3::new(0.1, 0.1, -1.0)).is_none());
        assert!(k.project_floor(&Point3::new(0.1, 0.1, f64::NAN)).is_none());
    }

    #[test]
    fn negative_coordinates_floor_and_truncate_differently() {
        let k = CameraIntrinsics::new(1.0, 1.0, 0.0, 0.0);
        let floored = k.project_floor(&Point3::new(-0.5, 0.5, 1.0)).expect("px");
        assert_eq!(floored.u, -1);
        let truncated = PixelCoord::from_subpixel(Point2::new(-0.5, 0.5)).expect("px");
        assert_eq!(truncated.u, 0);
    }

    #[test]
    fn parses_exported_camera_file_with_extra_fields() {
        let raw = r#"{"fx": 615.3, "fy": 615.1, "ppx": 318.2, "ppy": 242.9,
                      "width": 640, "height": 480, "model": "Brown Conrady",
                      "coeffs": [0, 0, 0, 0, 0]}"#;
        let k: CameraIntrinsics = serde_json::from_str(raw).expect("parse");
        assert_eq!(k.width, Some(640));
        assert!((k.fx - 615.3).abs() < 1e-12);
    }
}
