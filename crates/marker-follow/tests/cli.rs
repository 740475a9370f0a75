use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SCENARIO: &str = r#"{
    "nodes": [
        {"id": "main", "name": "Main", "kind": "scene", "width": 1920, "height": 1080},
        {"id": "camera", "name": "Camera", "width": 64, "height": 64},
        {"id": "logo", "name": "Logo", "width": 40, "height": 40},
        {"id": "blur", "name": "Blur", "kind": "filter"}
    ],
    "items": [
        {"scene": "main", "node": "camera", "position": [100.0, 0.0]},
        {"scene": "main", "node": "blur"},
        {"scene": "main", "node": "logo"}
    ],
    "current_scene": "main",
    "filter": {"id": "follow", "parent": "camera"},
    "settings": {"target_node": "logo", "marker_id": 2},
    "timeline": [
        {"frame": {"width": 64, "height": 64}},
        {"tick": 0.016},
        {"frame": {"width": 64, "height": 64, "markers": [
            {"id": 2, "corners": [[10, 10], [50, 10], [50, 50], [10, 50]]}
        ]}},
        {"tick": 0.016},
        {"tick": 0.016}
    ]
}"#;

fn write_scenario(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("scenario.json");
    fs::write(&path, SCENARIO).expect("write scenario");
    path
}

fn cli() -> Command {
    Command::cargo_bin("marker-follow").expect("binary")
}

#[test]
fn replay_prints_report() {
    let dir = TempDir::new().expect("tempdir");
    let scenario = write_scenario(dir.path());

    cli()
        .arg("replay")
        .arg(&scenario)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"leaked_refs\": 0"))
        .stdout(predicate::str::contains("\"detector_calls\": 2"));
}

#[test]
fn replay_writes_report_file() {
    let dir = TempDir::new().expect("tempdir");
    let scenario = write_scenario(dir.path());
    let out = dir.path().join("report.json");

    cli()
        .args(["replay", "--log-level", "debug", "-o"])
        .arg(&out)
        .arg(&scenario)
        .assert()
        .success();

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).expect("report")).expect("json");
    let ticks = report["ticks"].as_array().expect("ticks");
    assert_eq!(ticks.len(), 3);
    assert_eq!(ticks[0]["target"]["visible"], false);
    assert_eq!(ticks[1]["target"]["visible"], true);
    assert_eq!(ticks[1]["target"]["position"][0], 130.0);
    assert_eq!(ticks[2]["target"]["transform_writes"], 3);
    assert_eq!(report["frames"], 2);
    assert_eq!(report["leaked_ticks"], 0);
}

#[test]
fn schema_lists_scene_sources() {
    let dir = TempDir::new().expect("tempdir");
    let scenario = write_scenario(dir.path());

    cli()
        .arg("schema")
        .arg(&scenario)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"general_group\""))
        .stdout(predicate::str::contains("\"Logo\""))
        .stdout(predicate::str::contains("\"Blur\"").not());
}

#[test]
fn missing_scenario_fails() {
    let dir = TempDir::new().expect("tempdir");
    cli()
        .arg("replay")
        .arg(dir.path().join("nope.json"))
        .assert()
        .failure();
}
