#![cfg(feature = "image")]

use approx::assert_relative_eq;
use depth_quality::core::io::{load_ply, write_obj, write_ply};
use depth_quality::evaluate::{evaluate, EvaluateError};
use depth_quality::fixture::synthetic::{capture, CaptureSetup, SyntheticFixture};
use depth_quality::metrics::{AlignError, PrecomputedMarkers, RawMarker};
use depth_quality::{EvaluateConfig, FixtureKind, QualityReport};
use std::path::Path;

/// Write a synthetic capture to `dir` and return a config pointing at it.
fn write_capture(dir: &Path) -> EvaluateConfig {
    let fixture = SyntheticFixture::standard();
    let cap = capture(&fixture, &CaptureSetup::default());

    let mesh_path = dir.join("fixture.obj");
    let cloud_path = dir.join("capture.ply");
    let intrinsics_path = dir.join("camera_matrix.json");
    let markers_path = dir.join("markers.json");
    let image_path = dir.join("capture.png");

    write_obj(&mesh_path, &fixture.mesh).unwrap();
    write_ply(&cloud_path, &cap.cloud).unwrap();
    cap.intrinsics.write_json(&intrinsics_path).unwrap();
    ::image::GrayImage::new(640, 480).save(&image_path).unwrap();

    let markers = cap
        .markers
        .iter()
        .map(|&(id, corners)| RawMarker { id, corners })
        .collect();
    PrecomputedMarkers::new(markers)
        .write_json(&markers_path)
        .unwrap();

    let s = |p: &Path| p.to_string_lossy().into_owned();
    EvaluateConfig {
        image_path: s(&image_path),
        intrinsics_path: s(&intrinsics_path),
        point_cloud_path: s(&cloud_path),
        markers_path: s(&markers_path),
        mesh_path: Some(s(&mesh_path)),
        fixture_dir: None,
        fixture: None,
        depth_scale: cap.depth_scale,
        output_path: Some(s(&dir.join("report.json"))),
        save_debug_clouds: false,
        fixture_spec: Some(fixture.spec),
        clip: None,
        score: None,
    }
}

#[test]
fn evaluates_capture_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_capture(dir.path());

    let report = evaluate(&cfg).expect("evaluate");
    assert!(report.error.is_none());
    assert_eq!(report.num_cropped, Some(600));
    assert!(report.debug_clouds.is_empty());

    let alignment = report.alignment.as_ref().unwrap();
    assert_eq!(alignment.correspondences, 16);
    assert!(alignment.residual < 1e-6, "residual = {}", alignment.residual);

    let score = report.score.unwrap();
    assert_eq!(score.inlier_count, 600);
    assert!(score.rmse < 1e-2, "rmse = {}", score.rmse);
    assert_relative_eq!(report.density().unwrap(), 1.0 / 6.0, max_relative = 1e-9);

    let out = cfg.output_path();
    report.write_json(&out).unwrap();
    let back = QualityReport::load_json(&out).unwrap();
    assert_eq!(back.num_cropped, report.num_cropped);
    assert_eq!(back.rmse(), report.rmse());
}

#[test]
fn debug_clouds_are_written_next_to_input() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = write_capture(dir.path());
    cfg.save_debug_clouds = true;

    let report = evaluate(&cfg).expect("evaluate");
    assert_eq!(report.debug_clouds.len(), 2);
    assert!(dir.path().join("capture_aligned.ply").exists());
    assert!(dir.path().join("capture_cropped.ply").exists());

    let cropped = load_ply(dir.path().join("capture_cropped.ply")).unwrap();
    assert_eq!(cropped.len(), 600);
    let aligned = load_ply(dir.path().join("capture_aligned.ply")).unwrap();
    assert_eq!(Some(aligned.len()), report.num_points);
}

#[test]
fn fixture_kind_is_loaded_from_fixture_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = write_capture(dir.path());
    let meshes = dir.path().join("meshes");
    std::fs::create_dir(&meshes).unwrap();
    std::fs::rename(
        cfg.mesh_path.take().unwrap(),
        meshes.join(FixtureKind::Spheres.file_name()),
    )
    .unwrap();
    cfg.fixture_dir = Some(meshes.to_string_lossy().into_owned());
    cfg.fixture = Some(FixtureKind::Spheres);

    let report = evaluate(&cfg).expect("evaluate");
    assert_eq!(report.num_cropped, Some(600));
    assert_relative_eq!(report.density().unwrap(), 1.0 / 6.0, max_relative = 1e-9);

    cfg.fixture = Some(FixtureKind::AngledPlates);
    let err = evaluate(&cfg).unwrap_err();
    assert!(matches!(err, EvaluateError::Registry(_)), "{err:?}");
}

#[test]
fn unknown_marker_id_aborts_evaluation() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_capture(dir.path());

    let mut markers = PrecomputedMarkers::load_json(&cfg.markers_path).unwrap();
    markers.markers[0].id = 999;
    markers.write_json(&cfg.markers_path).unwrap();

    let err = evaluate(&cfg).unwrap_err();
    assert!(
        matches!(err, EvaluateError::Align(AlignError::Lookup(_))),
        "{err:?}"
    );
}
