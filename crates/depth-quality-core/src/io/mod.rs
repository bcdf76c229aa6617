//! File formats used around the pipeline.
//!
//! - Wavefront OBJ for reference meshes,
//! - vertex-only PLY for captured point clouds,
//! - JSON for camera intrinsics (see [`crate::CameraIntrinsics::load_json`]).

mod obj;
mod ply;

pub use obj::{load_obj, parse_obj, write_obj};
pub use ply::{load_ply, parse_ply, save_point_cloud_with_suffix, suffixed_path, write_ply};

/// Errors raised while reading or writing pipeline files.
#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("OBJ line {line}: {reason}")]
    Obj { line: usize, reason: String },
    #[error("PLY header: {0}")]
    PlyHeader(String),
    #[error("PLY body: {0}")]
    PlyBody(String),
}
