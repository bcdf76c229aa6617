//! Alignment, clipping and scoring of depth-camera captures.
//!
//! The pipeline for one capture of a known fixture:
//! 1. [`align`]: detect fiducial markers, look up their 3D positions in the
//!    cloud and fit the rigid transform into the fixture frame,
//! 2. [`clip`]: keep the points inside the pattern working volume,
//! 3. [`score`]: RMS distance to the reference surface and inlier density
//!    per unit of camera-visible pattern area.
//!
//! The fixture geometry comes from `depth-quality-fixture`; marker decoding
//! is delegated to a [`MarkerDetector`].

mod align;
mod clip;
mod markers;
mod score;

pub use align::{
    align, align_with_markers, build_correspondences, canonical_facing, lookup_corner_points,
    AlignError, AlignmentResult, Correspondence,
};
pub use clip::{clip, clip_bounds, clip_with_params, ClipParams, WORKING_AREA_SIZE, Z_BUFFER};
pub use markers::{
    detect_markers, DetectedMarker, MarkerDetectError, MarkerDetector, PrecomputedMarkers,
    RawMarker,
};
pub use score::{
    score, score_with_params, squared_distances, QualityScore, ScoreError, ScoreParams,
    INLIER_DISTANCE,
};
