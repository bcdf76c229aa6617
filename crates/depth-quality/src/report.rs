//! JSON configuration and report for one capture evaluation.

use crate::core::io::IoError;
use crate::fixture::{FixtureKind, FixtureSpec};
use crate::metrics::{AlignmentResult, ClipParams, QualityScore, ScoreParams};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config names no reference mesh: set `mesh_path`, or `fixture_dir` and `fixture`")]
    MissingMesh,
}

fn default_depth_scale() -> f64 {
    0.001
}

/// Inputs and options for evaluating one capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateConfig {
    /// Color or infrared frame the markers were detected in.
    pub image_path: String,
    /// JSON with `fx, fy, ppx, ppy`.
    pub intrinsics_path: String,
    /// Vertex-only PLY capture.
    pub point_cloud_path: String,
    /// Marker corners from an external detector (see `PrecomputedMarkers`).
    pub markers_path: String,
    #[serde(default)]
    pub mesh_path: Option<String>,
    #[serde(default)]
    pub fixture_dir: Option<String>,
    #[serde(default)]
    pub fixture: Option<FixtureKind>,
    #[serde(default = "default_depth_scale")]
    pub depth_scale: f64,
    #[serde(default)]
    pub output_path: Option<String>,
    /// Write `<cloud>_aligned.ply` and `<cloud>_cropped.ply` next to the input.
    #[serde(default)]
    pub save_debug_clouds: bool,
    #[serde(default)]
    pub fixture_spec: Option<FixtureSpec>,
    #[serde(default)]
    pub clip: Option<ClipParams>,
    #[serde(default)]
    pub score: Option<ScoreParams>,
}

impl EvaluateConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("depth_quality_report.json"))
    }

    /// Reference mesh file: `mesh_path` if given, otherwise the fixture's
    /// canonical file inside `fixture_dir`.
    pub fn mesh_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(p) = &self.mesh_path {
            return Ok(PathBuf::from(p));
        }
        match (&self.fixture_dir, self.fixture) {
            (Some(dir), Some(kind)) => Ok(Path::new(dir).join(kind.file_name())),
            _ => Err(ConfigError::MissingMesh),
        }
    }

    pub fn fixture_spec(&self) -> FixtureSpec {
        self.fixture_spec.clone().unwrap_or_default()
    }

    pub fn clip_params(&self) -> ClipParams {
        self.clip.clone().unwrap_or_default()
    }

    pub fn score_params(&self) -> ScoreParams {
        self.score.clone().unwrap_or_default()
    }
}

/// Registration outcome stored in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentSummary {
    pub correspondences: usize,
    pub residual: f64,
    pub camera_angle: [f64; 3],
    /// Camera frame to depth-scaled fixture frame, row-major.
    pub transform: [[f64; 4]; 4],
}

impl From<&AlignmentResult> for AlignmentSummary {
    fn from(a: &AlignmentResult) -> Self {
        Self {
            correspondences: a.correspondences.len(),
            residual: a.residual,
            camera_angle: [a.camera_angle.x, a.camera_angle.y, a.camera_angle.z],
            transform: a.transform.to_array(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub image_path: String,
    pub point_cloud_path: String,
    #[serde(default)]
    pub mesh_path: Option<String>,
    pub depth_scale: f64,
    #[serde(default)]
    pub num_points: Option<usize>,
    #[serde(default)]
    pub num_cropped: Option<usize>,
    #[serde(default)]
    pub alignment: Option<AlignmentSummary>,
    #[serde(default)]
    pub score: Option<QualityScore>,
    #[serde(default)]
    pub debug_clouds: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl QualityReport {
    /// Build a base report from the input config.
    pub fn new(cfg: &EvaluateConfig) -> Self {
        Self {
            image_path: cfg.image_path.clone(),
            point_cloud_path: cfg.point_cloud_path.clone(),
            mesh_path: cfg
                .mesh_path()
                .ok()
                .map(|p| p.to_string_lossy().into_owned()),
            depth_scale: cfg.depth_scale,
            num_points: None,
            num_cropped: None,
            alignment: None,
            score: None,
            debug_clouds: Vec::new(),
            error: None,
        }
    }

    pub fn rmse(&self) -> Option<f64> {
        self.score.map(|s| s.rmse)
    }

    pub fn density(&self) -> Option<f64> {
        self.score.map(|s| s.density)
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
