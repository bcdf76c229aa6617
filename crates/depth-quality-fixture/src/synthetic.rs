//! Synthetic fixtures and captures for tests and demos.
//!
//! The generated fixture has the same layout as the fabricated ones: a
//! backplate on `z = 0`, a pattern plate on top of it, box-shaped patterns
//! on the pattern plate and four open marker footprints on the backplate's
//! top face. A capture places a pinhole camera above the fixture and
//! samples the pattern tops, so the exact pose and the expected scores are
//! known.

use depth_quality_core::{CameraIntrinsics, PointCloud, RigidTransform, TriangleMesh};
use nalgebra::{Isometry3, Point2, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};

use crate::fiducial::CornerLocation;
use crate::params::FixtureSpec;

/// Closed axis-aligned box with outward-facing triangles.
pub fn box_mesh(min: Point3<f64>, max: Point3<f64>) -> TriangleMesh {
    let (a, b) = (min, max);
    let vertices = vec![
        Point3::new(a.x, a.y, a.z),
        Point3::new(b.x, a.y, a.z),
        Point3::new(b.x, b.y, a.z),
        Point3::new(a.x, b.y, a.z),
        Point3::new(a.x, a.y, b.z),
        Point3::new(b.x, a.y, b.z),
        Point3::new(b.x, b.y, b.z),
        Point3::new(a.x, b.y, b.z),
    ];
    let faces = vec![
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [1, 2, 6],
        [1, 6, 5],
        [2, 3, 7],
        [2, 7, 6],
        [3, 0, 4],
        [3, 4, 7],
    ];
    TriangleMesh::new(vertices, faces)
}

/// Open quad (two triangles) through the corners in ring order.
pub fn quad_mesh(corners: [Point3<f64>; 4]) -> TriangleMesh {
    TriangleMesh::new(corners.to_vec(), vec![[0, 1, 2], [0, 2, 3]])
}

/// A fixture mesh together with the parameters it was built for.
#[derive(Clone, Debug)]
pub struct SyntheticFixture {
    pub spec: FixtureSpec,
    pub mesh: TriangleMesh,
    /// `(min, max)` corners of every pattern box.
    pub pattern_boxes: Vec<(Point3<f64>, Point3<f64>)>,
}

impl SyntheticFixture {
    /// Two rectangular bars of different height on the standard plates.
    pub fn standard() -> Self {
        let spec = FixtureSpec::default();
        let top = spec.pattern_plate_top();
        Self::with_patterns(
            spec,
            vec![
                (
                    Point3::new(-30.0, -30.0, top),
                    Point3::new(-10.0, 30.0, top + 10.0),
                ),
                (
                    Point3::new(10.0, -30.0, top),
                    Point3::new(30.0, 30.0, top + 5.0),
                ),
            ],
        )
    }

    pub fn with_patterns(spec: FixtureSpec, pattern_boxes: Vec<(Point3<f64>, Point3<f64>)>) -> Self {
        let bp = spec.backplate_thickness;
        let mut mesh = box_mesh(Point3::new(-90.0, -60.0, 0.0), Point3::new(90.0, 60.0, bp));
        mesh.append(&box_mesh(
            Point3::new(-45.0, -45.0, bp),
            Point3::new(45.0, 45.0, spec.pattern_plate_top()),
        ));
        for (lo, hi) in &pattern_boxes {
            mesh.append(&box_mesh(*lo, *hi));
        }
        for marker in &spec.fiducials.markers {
            let c = &marker.corners;
            mesh.append(&quad_mesh([
                c.top_left,
                c.top_right,
                c.bottom_right,
                c.bottom_left,
            ]));
        }
        Self {
            spec,
            mesh,
            pattern_boxes,
        }
    }
}

/// Camera placement and sampling for [`capture`].
#[derive(Clone, Debug)]
pub struct CaptureSetup {
    /// Fixture frame (millimetres) to camera frame (millimetres).
    pub camera_from_fixture: RigidTransform,
    pub intrinsics: CameraIntrinsics,
    /// Sensor units per millimetre.
    pub depth_scale: f64,
    /// Grid spacing of pattern samples, millimetres.
    pub sample_step: f64,
    /// Add a wall behind the fixture and a few invalid samples.
    pub clutter: bool,
}

impl Default for CaptureSetup {
    fn default() -> Self {
        Self {
            camera_from_fixture: tilted_overhead_pose(7.0, 10.0, 500.0),
            intrinsics: CameraIntrinsics {
                width: Some(640),
                height: Some(480),
                ..CameraIntrinsics::new(600.0, 600.0, 320.0, 240.0)
            },
            depth_scale: 0.001,
            sample_step: 2.0,
            clutter: true,
        }
    }
}

/// Camera `distance` mm above the fixture looking down at it, tilted by
/// `yaw_deg` about the camera y axis and `pitch_deg` about its x axis.
pub fn tilted_overhead_pose(yaw_deg: f64, pitch_deg: f64, distance: f64) -> RigidTransform {
    let flip = Rotation3::from_axis_angle(&Vector3::x_axis(), (180.0 + pitch_deg).to_radians());
    let yaw = Rotation3::from_axis_angle(&Vector3::y_axis(), yaw_deg.to_radians());
    let rot = UnitQuaternion::from_rotation_matrix(&(yaw * flip));
    RigidTransform::new(Isometry3::from_parts(
        Translation3::new(0.0, 0.0, distance),
        rot,
    ))
}

/// A generated capture and its ground truth.
#[derive(Clone, Debug)]
pub struct SyntheticCapture {
    /// Camera-frame points in sensor units.
    pub cloud: PointCloud,
    /// Marker id and its corners in detector order (clockwise from top-left).
    pub markers: Vec<(i32, [Point2<f64>; 4])>,
    pub intrinsics: CameraIntrinsics,
    pub depth_scale: f64,
    /// Number of points sampled on pattern tops.
    pub pattern_samples: usize,
    /// The transform alignment should recover (camera to scaled fixture).
    pub fixture_from_camera: RigidTransform,
}

/// Render `fixture` as seen through `setup`.
///
/// Marker-corner points are appended last so they win any pixel collision.
pub fn capture(fixture: &SyntheticFixture, setup: &CaptureSetup) -> SyntheticCapture {
    let s = setup.depth_scale;
    let to_sensor = |p: &Point3<f64>| Point3::from(setup.camera_from_fixture.apply(p).coords * s);

    let mut points = Vec::new();
    for (lo, hi) in &fixture.pattern_boxes {
        let nx = ((hi.x - lo.x) / setup.sample_step).floor() as usize;
        let ny = ((hi.y - lo.y) / setup.sample_step).floor() as usize;
        for i in 0..nx {
            for j in 0..ny {
                let p = Point3::new(
                    lo.x + setup.sample_step * (i as f64 + 0.5),
                    lo.y + setup.sample_step * (j as f64 + 0.5),
                    hi.z,
                );
                points.push(to_sensor(&p));
            }
        }
    }
    let pattern_samples = points.len();

    if setup.clutter {
        for i in -10..=10 {
            for j in -10..=10 {
                let wall = Point3::new(i as f64 * 10.0, j as f64 * 10.0, -40.0);
                points.push(to_sensor(&wall));
            }
        }
        points.push(Point3::origin());
        points.push(Point3::new(f64::NAN, 0.0, 1.0));
        points.push(Point3::new(0.1, 0.1, -1.0));
    }

    let mut markers = Vec::with_capacity(fixture.spec.fiducials.len());
    for marker in &fixture.spec.fiducials.markers {
        let mut px = [Point2::origin(); 4];
        for (slot, loc) in px.iter_mut().zip(CornerLocation::CLOCKWISE) {
            let p = to_sensor(&marker.corners.get(loc));
            if let Some(uv) = setup.intrinsics.project(&p) {
                *slot = uv;
            }
            points.push(p);
        }
        markers.push((marker.id, px));
    }

    let camera_from_fixture_scaled = RigidTransform::new(Isometry3::from_parts(
        Translation3::from(setup.camera_from_fixture.translation() * s),
        setup.camera_from_fixture.iso.rotation,
    ));

    SyntheticCapture {
        cloud: PointCloud::new(points),
        markers,
        intrinsics: setup.intrinsics,
        depth_scale: s,
        pattern_samples,
        fixture_from_camera: camera_from_fixture_scaled.inverse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxes_are_closed_and_quads_are_open() {
        let b = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 2.0, 3.0));
        assert!(b.is_closed());
        assert!((b.surface_area() - 22.0).abs() < 1e-12);
        let q = quad_mesh([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]);
        assert!(!q.is_closed());
    }

    #[test]
    fn capture_puts_markers_inside_the_image() {
        let fixture = SyntheticFixture::standard();
        let setup = CaptureSetup::default();
        let cap = capture(&fixture, &setup);
        assert_eq!(cap.markers.len(), 4);
        assert_eq!(cap.pattern_samples, 2 * 10 * 30);
        for (_, corners) in &cap.markers {
            for c in corners {
                assert!(c.x > 0.0 && c.x < 640.0, "u = {}", c.x);
                assert!(c.y > 0.0 && c.y < 480.0, "v = {}", c.y);
            }
        }
        // camera looks down onto the pattern tops
        let tip = cap.cloud.points[0];
        assert!(tip.z > 0.4 && tip.z < 0.6);
    }
}
