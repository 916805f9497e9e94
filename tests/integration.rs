//! CLI integration tests.

use std::path::PathBuf;
use std::process::{Command, Output};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn us_table() -> PathBuf {
    fixtures_dir().join("tables").join("us_he.csv")
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mortar-calc"))
        .args(args)
        .output()
        .expect("run mortar-calc")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn solve_with_builtin_table() {
    let output = run(&["solve", "--mortar", "02480 03659", "--target", "03480 03659"]);
    assert!(
        output.status.success(),
        "solve should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let text = stdout(&output);
    assert!(text.contains("RANGE (M): 1000"), "{}", text);
    assert!(text.contains("AZIMUTH: 1500 mils"), "{}", text);
    assert!(text.contains("CHARGE RING: 2"), "{}", text);
    assert!(text.contains("ELEV (MIL): 1114"), "{}", text);
}

#[test]
fn solve_json_from_table_file() {
    let table = us_table();
    let output = run(&[
        "solve",
        "--table",
        table.to_str().unwrap(),
        "--faction",
        "us",
        "--mortar",
        "1000 1000",
        "--target",
        "1000 1400",
        "--format",
        "json",
    ]);
    assert!(
        output.status.success(),
        "solve should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let v: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json output");
    assert_eq!(v["faction"], "us");
    assert_eq!(v["mils_per_circle"], 6400.0);
    assert!(v["azimuth_mils"].as_f64().unwrap().abs() < 1e-9);
    assert_eq!(v["outcome"]["status"], "solution");
    assert_eq!(v["outcome"]["charge_ring"], 0);
    assert!((v["outcome"]["elevation_mils"].as_f64().unwrap() - 1050.0).abs() < 1e-9);
    assert!((v["outcome"]["time_of_flight_s"].as_f64().unwrap() - 11.75).abs() < 1e-9);
    assert!(v["generated_at"].is_string());
}

#[test]
fn solve_writes_report_file() {
    let out = tempfile::tempdir().expect("tempdir");
    let path = out.path().join("mission.json");
    let output = run(&[
        "solve",
        "--mortar",
        "100 100",
        "--target",
        "4000 4000",
        "--format",
        "json",
        "--out",
        path.to_str().unwrap(),
    ]);
    assert!(output.status.success());
    let v: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(v["outcome"]["status"], "no_solution");
    assert_eq!(v["outcome"]["max_range_m"], 2300.0);
}

#[test]
fn solve_targets_layer_entity() {
    let project = fixtures_dir().join("project");
    let output = run(&[
        "solve",
        "--project",
        project.to_str().unwrap(),
        "--mortar",
        "02480 03659",
        "--target-entity",
        "hill 412",
    ]);
    assert!(
        output.status.success(),
        "solve should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let text = stdout(&output);
    assert!(text.contains("RANGE (M): 1000"), "{}", text);
    assert!(text.contains("CHARGE RING: 2"), "{}", text);
}

#[test]
fn solve_rejects_bad_positions() {
    let off_map = run(&["solve", "--mortar", "6500 3400", "--target", "100 100"]);
    assert!(!off_map.status.success());
    let both = run(&[
        "solve",
        "--mortar",
        "100 100",
        "--target",
        "200 200",
        "--target-px",
        "5,5",
    ]);
    assert!(!both.status.success());
    let missing = run(&["solve", "--mortar", "100 100"]);
    assert!(!missing.status.success());
}

#[test]
fn solve_names_available_tables() {
    let table = us_table();
    let builtin = run(&[
        "solve", "--faction", "nato", "--mortar", "100 100", "--target", "200 200",
    ]);
    assert!(!builtin.status.success());
    let err = String::from_utf8_lossy(&builtin.stderr);
    assert!(err.contains("available: ussr (he)"), "{}", err);

    let file = run(&[
        "solve",
        "--table",
        table.to_str().unwrap(),
        "--faction",
        "us",
        "--shell",
        "smoke",
        "--mortar",
        "100 100",
        "--target",
        "200 200",
    ]);
    assert!(!file.status.success());
    let err = String::from_utf8_lossy(&file.stderr);
    assert!(err.contains("available: us (he)"), "{}", err);
}

#[test]
fn table_lists_builtin_coverage() {
    let output = run(&["table"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("ussr he: 5 ring(s)"), "{}", text);
    assert!(text.contains("Max range: 2300 m"), "{}", text);
}

#[test]
fn table_strict_fails_on_dropped_rows() {
    let table = us_table();
    let lenient = run(&["table", "--table", table.to_str().unwrap()]);
    assert!(lenient.status.success());
    let text = stdout(&lenient);
    assert!(text.contains("us he: 2 ring(s), 6 row(s)"), "{}", text);
    assert!(text.contains("Issues (1):"), "{}", text);
    assert!(text.contains("line 7: range is not a number"), "{}", text);

    let strict = run(&["table", "--strict", "--table", table.to_str().unwrap()]);
    assert!(!strict.status.success());
}

#[test]
fn config_file_overrides_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = dir.path().join("mortar.toml");
    std::fs::write(&cfg, "faction = \"ussr\"\n[mils]\nussr = 6400\n").unwrap();
    let output = run(&[
        "--config",
        cfg.to_str().unwrap(),
        "solve",
        "--mortar",
        "02480 03659",
        "--target",
        "03480 03659",
    ]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("AZIMUTH: 1600 mils"));

    std::fs::write(&cfg, "unknown_key = 1\n").unwrap();
    let bad = run(&["--config", cfg.to_str().unwrap(), "table"]);
    assert!(!bad.status.success());
}

#[test]
fn layer_lists_entities() {
    let project = fixtures_dir().join("project");
    let output = run(&["layer", "--project", project.to_str().unwrap()]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Hill 412\tX=3480 Z=3659\tpx 3480,1461"), "{}", text);
    assert!(text.contains("Bridge"), "{}", text);
    assert_eq!(text.lines().count(), 2);
}

#[test]
fn layer_rejects_heightmap_flag() {
    let project = fixtures_dir().join("project");
    let output = run(&[
        "layer",
        "--project",
        project.to_str().unwrap(),
        "--heightmap",
        "heightmap.png",
    ]);
    assert!(!output.status.success());
    let err = String::from_utf8_lossy(&output.stderr);
    assert!(err.contains("--heightmap"), "{}", err);
}
