//! High-level facade crate for the `depth-quality-*` workspace.
//!
//! Scores how accurately a depth camera reproduces a machined reference
//! fixture from a single capture (image, point cloud, intrinsics). The
//! result is an RMS surface error and an area-normalised coverage density.
//!
//! This crate provides:
//! - stable re-exports of the underlying crates,
//! - JSON config and report types,
//! - (feature `image`) end-to-end helpers that read a capture from disk and
//!   run alignment, clipping and scoring,
//! - (feature `cli`) the `depth-quality` command-line tool.
//!
//! ## Quickstart
//!
//! ```no_run
//! use depth_quality::{evaluate, EvaluateConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = EvaluateConfig::load_json("capture.json")?;
//! let report = evaluate::evaluate(&cfg)?;
//! println!("rmse {:?} density {:?}", report.rmse(), report.density());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `depth_quality::core`: point clouds, meshes, rigid transforms, file I/O.
//! - `depth_quality::fixture`: fiducial table, mesh segmentation, registry.
//! - `depth_quality::metrics`: marker seam, alignment, clipping, scoring.
//! - `depth_quality::evaluate` (feature `image`): end-to-end helpers.

pub use depth_quality_core as core;
pub use depth_quality_fixture as fixture;
pub use depth_quality_metrics as metrics;

pub use depth_quality_core::{CameraIntrinsics, PointCloud, RigidTransform};
pub use depth_quality_fixture::{
    CornerLocation, FixtureKind, FixtureRegistry, FixtureSpec, ReferenceMesh,
};
pub use depth_quality_metrics::{ClipParams, QualityScore, ScoreParams};

mod report;

pub use report::{AlignmentSummary, ConfigError, EvaluateConfig, QualityReport};

#[cfg(feature = "image")]
pub mod evaluate;
