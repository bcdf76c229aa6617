//! Ground-truth geometry of depth-quality fixtures.
//!
//! A fixture is a machined plate assembly: a backplate, a pattern plate on
//! top of it, one or more pattern solids (cylinders, spheres, angled plates)
//! and four printed fiducial markers at known positions. This crate
//! provides:
//! - the fiducial table and corner lookups,
//! - segmentation of a fixture mesh into its functional parts,
//! - the camera-visible pattern area used to normalize coverage,
//! - a registry of the fabricated fixture types,
//! - a synthetic fixture and capture generator for tests.

mod fiducial;
mod params;
mod reference;
mod registry;
pub mod synthetic;

pub use fiducial::{CornerLocation, Fiducial, FiducialCorners, FiducialLookupError, FiducialTable};
pub use params::{
    FixtureSpec, BACKPLATE_THICKNESS, DEFAULT_CLASSIFICATION_TOLERANCE, PATTERN_PLATE_THICKNESS,
};
pub use reference::{
    classify_submesh, ReferenceMesh, ReferenceMeshError, ReferenceMeshSummary, SubmeshRole,
};
pub use registry::{FixtureKind, FixtureRegistry, RegistryError};
