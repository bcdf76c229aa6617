//! Ground-truth fixture geometry, split into its functional parts.

use depth_quality_core::io::{load_obj, IoError};
use depth_quality_core::{Aabb, ClosestHit, TriangleBvh, TriangleMesh};
use log::{debug, warn};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use std::fmt;
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::fiducial::{CornerLocation, FiducialLookupError, FiducialTable};
use crate::params::FixtureSpec;

/// Functional role of a connected part of the fixture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmeshRole {
    Backplate,
    PatternPlate,
    Pattern,
    FiducialFootprint,
}

impl fmt::Display for SubmeshRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SubmeshRole::Backplate => "backplate",
            SubmeshRole::PatternPlate => "pattern plate",
            SubmeshRole::Pattern => "pattern",
            SubmeshRole::FiducialFootprint => "fiducial footprint",
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ReferenceMeshError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("reference mesh has no faces")]
    EmptyMesh,
    #[error("no submesh classified as {role}")]
    MissingRole { role: SubmeshRole },
    #[error("{count} submeshes classified as {role}, expected exactly one")]
    AmbiguousRole { role: SubmeshRole, count: usize },
}

/// Classify one connected submesh.
///
/// Open geometry marks a fiducial footprint. Closed parts are matched on
/// their z extent: `[0, backplate]` is the backplate and
/// `[backplate, backplate + pattern_plate]` the pattern plate, each within
/// `spec.classification_tolerance`. Anything else is pattern.
pub fn classify_submesh(mesh: &TriangleMesh, spec: &FixtureSpec) -> SubmeshRole {
    if !mesh.is_closed() {
        return SubmeshRole::FiducialFootprint;
    }
    let Some(bbox) = mesh.bbox() else {
        return SubmeshRole::FiducialFootprint;
    };
    let tol = spec.classification_tolerance;
    let spans = |lo: f64, hi: f64| {
        (bbox.min.z - lo).abs() <= tol && (bbox.max.z - hi).abs() <= tol
    };
    if spans(0.0, spec.backplate_thickness) {
        SubmeshRole::Backplate
    } else if spans(spec.backplate_thickness, spec.pattern_plate_top()) {
        SubmeshRole::PatternPlate
    } else {
        SubmeshRole::Pattern
    }
}

/// Immutable, classified reference mesh of one fixture.
///
/// Built once and shared read-only by every alignment and scoring call.
#[derive(Clone, Debug)]
pub struct ReferenceMesh {
    spec: FixtureSpec,
    mesh: TriangleMesh,
    surface: TriangleBvh,
    backplate: TriangleMesh,
    pattern_plate: TriangleMesh,
    patterns: Vec<TriangleMesh>,
    fiducial_footprints: Vec<TriangleMesh>,
}

impl ReferenceMesh {
    /// Load and classify an OBJ reference mesh.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
    pub fn load(path: impl AsRef<Path>, spec: FixtureSpec) -> Result<Self, ReferenceMeshError> {
        let path = path.as_ref();
        let mesh = load_obj(path)?;
        debug!(
            "loaded {}: {} vertices, {} faces",
            path.display(),
            mesh.vertices.len(),
            mesh.faces.len()
        );
        Self::from_mesh(mesh, spec)
    }

    /// Load with the standard fiducial table and the given plate thicknesses.
    pub fn load_with_thicknesses(
        path: impl AsRef<Path>,
        backplate_thickness: f64,
        pattern_plate_thickness: f64,
    ) -> Result<Self, ReferenceMeshError> {
        Self::load(
            path,
            FixtureSpec::with_thicknesses(backplate_thickness, pattern_plate_thickness),
        )
    }

    /// Segment an in-memory mesh into backplate, pattern plate, patterns and
    /// fiducial footprints.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(mesh, spec), fields(faces = mesh.faces.len()))
    )]
    pub fn from_mesh(mesh: TriangleMesh, spec: FixtureSpec) -> Result<Self, ReferenceMeshError> {
        if mesh.is_empty() {
            return Err(ReferenceMeshError::EmptyMesh);
        }

        let mut backplates = Vec::new();
        let mut pattern_plates = Vec::new();
        let mut patterns = Vec::new();
        let mut fiducial_footprints = Vec::new();

        for part in mesh.connected_components() {
            match classify_submesh(&part, &spec) {
                SubmeshRole::Backplate => backplates.push(part),
                SubmeshRole::PatternPlate => pattern_plates.push(part),
                SubmeshRole::Pattern => patterns.push(part),
                SubmeshRole::FiducialFootprint => fiducial_footprints.push(part),
            }
        }

        let backplate = exactly_one(backplates, SubmeshRole::Backplate)?;
        let pattern_plate = exactly_one(pattern_plates, SubmeshRole::PatternPlate)?;
        if patterns.is_empty() {
            return Err(ReferenceMeshError::MissingRole {
                role: SubmeshRole::Pattern,
            });
        }
        if fiducial_footprints.is_empty() {
            return Err(ReferenceMeshError::MissingRole {
                role: SubmeshRole::FiducialFootprint,
            });
        }
        if fiducial_footprints.len() != spec.fiducials.len() {
            warn!(
                "found {} fiducial footprints but the marker table lists {}",
                fiducial_footprints.len(),
                spec.fiducials.len()
            );
        }
        debug!(
            "segmented reference mesh: {} pattern parts, {} fiducial footprints",
            patterns.len(),
            fiducial_footprints.len()
        );

        let surface = TriangleBvh::build(&mesh);
        Ok(Self {
            spec,
            mesh,
            surface,
            backplate,
            pattern_plate,
            patterns,
            fiducial_footprints,
        })
    }

    pub fn spec(&self) -> &FixtureSpec {
        &self.spec
    }

    pub fn fiducials(&self) -> &FiducialTable {
        &self.spec.fiducials
    }

    /// The complete mesh as loaded.
    pub fn mesh(&self) -> &TriangleMesh {
        &self.mesh
    }

    pub fn backplate(&self) -> &TriangleMesh {
        &self.backplate
    }

    pub fn pattern_plate(&self) -> &TriangleMesh {
        &self.pattern_plate
    }

    pub fn patterns(&self) -> &[TriangleMesh] {
        &self.patterns
    }

    pub fn fiducial_footprints(&self) -> &[TriangleMesh] {
        &self.fiducial_footprints
    }

    pub fn fiducial_coordinate(
        &self,
        id: i32,
        location: CornerLocation,
    ) -> Result<Point3<f64>, FiducialLookupError> {
        self.spec.fiducials.coordinate(id, location)
    }

    /// Total area of pattern faces turned towards the camera.
    ///
    /// A face counts when the angle between its outward normal and
    /// `camera_angle` is below 90 degrees. Degenerate faces never count.
    pub fn pattern_surface_area(&self, camera_angle: &Vector3<f64>) -> f64 {
        let mut area = 0.0;
        for part in &self.patterns {
            for f in 0..part.face_count() {
                let Some(n) = part.face_normal(f) else {
                    continue;
                };
                let cos = n.dot(camera_angle).clamp(-1.0, 1.0);
                if cos.acos() < FRAC_PI_2 {
                    area += part.face_area(f);
                }
            }
        }
        area
    }

    /// Union of the pattern bounding boxes.
    pub fn pattern_bounds(&self) -> Option<Aabb> {
        self.patterns
            .iter()
            .filter_map(TriangleMesh::bbox)
            .reduce(|a, b| a.union(&b))
    }

    /// Lowest and highest z over all pattern parts.
    pub fn pattern_z_range(&self) -> (f64, f64) {
        self.pattern_bounds()
            .map(|b| (b.min.z, b.max.z))
            .unwrap_or((0.0, 0.0))
    }

    /// Closest point on the whole reference surface.
    pub fn closest_point(&self, p: &Point3<f64>) -> Option<ClosestHit> {
        self.surface.closest_point(p)
    }

    /// Squared distance to the whole reference surface.
    pub fn distance_squared(&self, p: &Point3<f64>) -> Option<f64> {
        self.surface.distance_squared(p)
    }

    pub fn summary(&self) -> ReferenceMeshSummary {
        let (z_min, z_max) = self.pattern_z_range();
        ReferenceMeshSummary {
            vertices: self.mesh.vertices.len(),
            faces: self.mesh.faces.len(),
            backplate_faces: self.backplate.face_count(),
            pattern_plate_faces: self.pattern_plate.face_count(),
            pattern_parts: self.patterns.len(),
            pattern_faces: self.patterns.iter().map(TriangleMesh::face_count).sum(),
            fiducial_footprints: self.fiducial_footprints.len(),
            pattern_z_range: [z_min, z_max],
            bbox: self.mesh.bbox(),
        }
    }
}

fn exactly_one(
    mut parts: Vec<TriangleMesh>,
    role: SubmeshRole,
) -> Result<TriangleMesh, ReferenceMeshError> {
    match parts.len() {
        0 => Err(ReferenceMeshError::MissingRole { role }),
        1 => Ok(parts.remove(0)),
        count => Err(ReferenceMeshError::AmbiguousRole { role, count }),
    }
}

/// Segmentation counts of a reference mesh, for reports and inspection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceMeshSummary {
    pub vertices: usize,
    pub faces: usize,
    pub backplate_faces: usize,
    pub pattern_plate_faces: usize,
    pub pattern_parts: usize,
    pub pattern_faces: usize,
    pub fiducial_footprints: usize,
    pub pattern_z_range: [f64; 2],
    pub bbox: Option<Aabb>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{box_mesh, quad_mesh, SyntheticFixture};
    use approx::assert_relative_eq;

    fn fixture() -> ReferenceMesh {
        let synth = SyntheticFixture::standard();
        ReferenceMesh::from_mesh(synth.mesh, synth.spec).expect("classify")
    }

    #[test]
    fn synthetic_fixture_segments_into_roles() {
        let reference = fixture();
        assert_eq!(reference.backplate().face_count(), 12);
        assert_eq!(reference.pattern_plate().face_count(), 12);
        assert_eq!(reference.patterns().len(), 2);
        assert_eq!(reference.fiducial_footprints().len(), 4);

        let (lo, hi) = reference.pattern_z_range();
        assert_relative_eq!(lo, 9.35, epsilon = 1e-12);
        assert_relative_eq!(hi, 19.35, epsilon = 1e-12);
    }

    #[test]
    fn classification_tolerates_rounding_in_exported_coordinates() {
        let spec = FixtureSpec::default();
        let plate = box_mesh(
            Point3::new(-10.0, -10.0, 0.0),
            Point3::new(10.0, 10.0, 6.350_000_000_1),
        );
        assert_eq!(classify_submesh(&plate, &spec), SubmeshRole::Backplate);

        let strict = FixtureSpec {
            classification_tolerance: 0.0,
            ..FixtureSpec::default()
        };
        assert_eq!(classify_submesh(&plate, &strict), SubmeshRole::Pattern);
    }

    #[test]
    fn missing_and_duplicate_roles_are_errors() {
        let spec = FixtureSpec::default();
        let backplate = box_mesh(Point3::new(-90.0, -60.0, 0.0), Point3::new(90.0, 60.0, 6.35));
        let plate = box_mesh(Point3::new(-45.0, -45.0, 6.35), Point3::new(45.0, 45.0, 9.35));
        let pattern = box_mesh(Point3::new(-5.0, -5.0, 9.35), Point3::new(5.0, 5.0, 12.0));
        let footprint = quad_mesh([
            Point3::new(55.0, 28.0, 6.35),
            Point3::new(75.0, 28.0, 6.35),
            Point3::new(75.0, 48.0, 6.35),
            Point3::new(55.0, 48.0, 6.35),
        ]);

        let mut no_plate = backplate.clone();
        no_plate.append(&pattern);
        no_plate.append(&footprint);
        assert!(matches!(
            ReferenceMesh::from_mesh(no_plate, spec.clone()),
            Err(ReferenceMeshError::MissingRole {
                role: SubmeshRole::PatternPlate
            })
        ));

        let mut two_backplates = backplate.clone();
        two_backplates.append(&box_mesh(
            Point3::new(100.0, 0.0, 0.0),
            Point3::new(110.0, 10.0, 6.35),
        ));
        two_backplates.append(&plate);
        two_backplates.append(&pattern);
        two_backplates.append(&footprint);
        assert!(matches!(
            ReferenceMesh::from_mesh(two_backplates, spec.clone()),
            Err(ReferenceMeshError::AmbiguousRole {
                role: SubmeshRole::Backplate,
                count: 2
            })
        ));

        let mut no_footprint = backplate;
        no_footprint.append(&plate);
        no_footprint.append(&pattern);
        assert!(matches!(
            ReferenceMesh::from_mesh(no_footprint, spec.clone()),
            Err(ReferenceMeshError::MissingRole {
                role: SubmeshRole::FiducialFootprint
            })
        ));

        assert!(matches!(
            ReferenceMesh::from_mesh(TriangleMesh::default(), spec),
            Err(ReferenceMeshError::EmptyMesh)
        ));
    }

    #[test]
    fn visible_area_counts_camera_facing_faces_only() {
        let reference = fixture();
        // two pattern boxes: 20 x 60 x 10 and 20 x 60 x 5
        let c = Vector3::new(0.1, 0.2, 1.0).normalize();
        let tops = 2.0 * 20.0 * 60.0;
        let plus_x = 60.0 * 10.0 + 60.0 * 5.0;
        let plus_y = 20.0 * 10.0 + 20.0 * 5.0;
        assert_relative_eq!(
            reference.pattern_surface_area(&c),
            tops + plus_x + plus_y,
            epsilon = 1e-9
        );

        // looking from straight above: side faces are exactly perpendicular
        assert_relative_eq!(
            reference.pattern_surface_area(&Vector3::z()),
            tops,
            epsilon = 1e-9
        );
        // from below only the bottoms face the camera
        assert_relative_eq!(
            reference.pattern_surface_area(&-Vector3::z()),
            tops,
            epsilon = 1e-9
        );
    }

    #[test]
    fn distance_uses_every_part_of_the_fixture() {
        let reference = fixture();
        // above the backplate, far from patterns
        let d2 = reference
            .distance_squared(&Point3::new(-80.0, 0.0, 8.35))
            .expect("non-empty");
        assert_relative_eq!(d2, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn fiducial_lookup_goes_through_the_table() {
        let reference = fixture();
        let p = reference
            .fiducial_coordinate(123, CornerLocation::BottomRight)
            .unwrap();
        assert_eq!(p, Point3::new(75.5625, 48.575, 6.35));
        assert!(reference
            .fiducial_coordinate(999, CornerLocation::TopLeft)
            .is_err());
    }
}
