#![cfg(feature = "cli")]

use assert_cmd::Command;
use depth_quality::core::io::write_obj;
use depth_quality::fixture::synthetic::SyntheticFixture;
use depth_quality::QualityReport;
use predicates::prelude::*;

fn cli() -> Command {
    Command::cargo_bin("depth-quality").unwrap()
}

#[test]
fn inspect_prints_segmentation() {
    let dir = tempfile::tempdir().unwrap();
    let mesh = dir.path().join("fixture.obj");
    write_obj(&mesh, &SyntheticFixture::standard().mesh).unwrap();

    cli()
        .args(["inspect", "--mesh"])
        .arg(&mesh)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"fiducial_footprints\": 4"))
        .stdout(predicate::str::contains("\"pattern_parts\": 2"));
}

#[test]
fn inspect_rejects_wrong_plate_thickness() {
    let dir = tempfile::tempdir().unwrap();
    let mesh = dir.path().join("fixture.obj");
    write_obj(&mesh, &SyntheticFixture::standard().mesh).unwrap();

    cli()
        .args(["inspect", "--backplate-thickness", "5.0", "--mesh"])
        .arg(&mesh)
        .assert()
        .failure()
        .stderr(predicate::str::contains("backplate"));
}

#[test]
fn failed_evaluation_still_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    let report = dir.path().join("report.json");
    std::fs::write(
        &config,
        r#"{
            "image_path": "missing.png",
            "intrinsics_path": "missing.json",
            "point_cloud_path": "missing.ply",
            "markers_path": "missing_markers.json"
        }"#,
    )
    .unwrap();

    cli()
        .args(["evaluate", "--config"])
        .arg(&config)
        .arg("--out")
        .arg(&report)
        .assert()
        .failure();

    let written = QualityReport::load_json(&report).unwrap();
    assert!(written.score.is_none());
    assert!(written.error.unwrap().contains("reference mesh"));
}

#[test]
fn help_lists_subcommands() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("evaluate"))
        .stdout(predicate::str::contains("inspect"));
}
