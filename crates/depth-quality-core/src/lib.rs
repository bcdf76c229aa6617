//! Core types and utilities for depth-camera quality evaluation.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! know about fixtures, markers or scoring; those live in
//! `depth-quality-fixture` and `depth-quality-metrics`.

mod bvh;
mod image;
mod intrinsics;
pub mod io;
mod logger;
mod mesh;
mod point_cloud;
mod rigid;

pub use bvh::{closest_point_on_triangle, ClosestHit, TriangleBvh};
pub use image::{GrayImage, GrayImageView};
pub use intrinsics::{CameraIntrinsics, PixelCoord};
pub use mesh::{Aabb, TriangleMesh};
pub use point_cloud::PointCloud;
pub use rigid::{
    estimate_rigid_transform, RigidSolveError, RigidTransform, MIN_RIGID_CORRESPONDENCES,
};

#[cfg(feature = "tracing")]
pub use logger::{init_tracing, DEFAULT_TRACING_FILTER};

pub use logger::init_with_level;
