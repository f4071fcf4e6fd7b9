//! End-to-end runs of the `pbfcut` binary, including real worker processes.

use base64::{Engine as _, engine::general_purpose};
use camino::{Utf8Path, Utf8PathBuf};
use rstest::{fixture, rstest};
use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    fn out(&self) -> Utf8PathBuf {
        self.root.join("out")
    }

    /// Decode a shared PBF fixture into the workspace.
    fn fixture(&self, stem: &str) -> Utf8PathBuf {
        let encoded_path = Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../pbfcut-data/tests/fixtures")
            .join(format!("{stem}.osm.pbf.b64"));
        let encoded = fs::read_to_string(&encoded_path)
            .unwrap_or_else(|err| panic!("failed to read fixture {encoded_path}: {err}"));
        let cleaned: String = encoded.chars().filter(|ch| !ch.is_ascii_whitespace()).collect();
        let decoded = general_purpose::STANDARD
            .decode(cleaned.as_bytes())
            .expect("fixture is base64");
        let path = self.root.join(format!("{stem}.osm.pbf"));
        fs::write(&path, decoded).expect("write decoded fixture");
        path
    }
}

#[fixture]
fn workspace() -> Workspace {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
    fs::create_dir(root.join("out")).expect("create output dir");
    Workspace { _dir: dir, root }
}

fn pbfcut(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pbfcut"))
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .expect("run pbfcut")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn feature_count(path: &Utf8Path) -> usize {
    let text = fs::read_to_string(path).unwrap_or_else(|err| panic!("read {path}: {err}"));
    let value: serde_json::Value = serde_json::from_str(&text).expect("valid GeoJSON");
    value["features"].as_array().map_or(0, Vec::len)
}

#[rstest]
fn export_writes_one_file_per_theme_and_kind(workspace: Workspace) {
    let input = workspace.fixture("themes");
    let out = workspace.out();
    let output = pbfcut(&[
        "export",
        input.as_str(),
        out.as_str(),
        "town",
        "-t",
        "highway,building,shop",
        "-e",
        "geojson",
        "-w",
        "2",
    ]);
    assert!(output.status.success(), "export failed: {}", stderr(&output));

    assert_eq!(feature_count(&out.join("town_highway_line.geojson")), 1);
    assert_eq!(feature_count(&out.join("town_highway_point.geojson")), 1);
    assert_eq!(feature_count(&out.join("town_building_polygon.geojson")), 2);
    assert!(!out.join("town_highway_polygon.geojson").exists());
    assert!(!out.join("town_shop_point.geojson").exists());
}

#[rstest]
fn export_clips_to_a_bounding_box(workspace: Workspace) {
    let input = workspace.fixture("themes");
    let out = workspace.out();
    let output = pbfcut(&[
        "export",
        input.as_str(),
        out.as_str(),
        "depot",
        "-t",
        "building",
        "-f",
        "polygon",
        "-e",
        "geojson",
        "-b",
        "1.9,1.9,2.2,2.2",
    ]);
    assert!(output.status.success(), "export failed: {}", stderr(&output));
    assert_eq!(feature_count(&out.join("depot_building_polygon.geojson")), 1);
}

#[rstest]
fn failing_workers_fail_the_run(workspace: Workspace) {
    let input = workspace.fixture("invalid");
    let out = workspace.out();
    let output = pbfcut(&[
        "export",
        input.as_str(),
        out.as_str(),
        "broken",
        "-t",
        "highway,landuse",
        "-w",
        "2",
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("export failed"), "{}", stderr(&output));
}

#[rstest]
fn invalid_configuration_never_starts_workers(workspace: Workspace) {
    let input = workspace.fixture("themes");
    let out = workspace.out();
    let output = pbfcut(&[
        "export",
        input.as_str(),
        out.as_str(),
        "town",
        "-t",
        "bakery",
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unknown theme 'bakery'"));
    assert_eq!(fs::read_dir(&out).expect("list output").count(), 0);
}

#[rstest]
fn combine_reports_an_existing_output(workspace: Workspace) {
    let existing = workspace.root.join("all.gpkg");
    fs::write(&existing, b"taken").expect("write placeholder");
    let out = workspace.out();
    let output = pbfcut(&["combine", out.as_str(), existing.as_str(), "town"]);
    assert_eq!(output.status.code(), Some(1));
}

#[rstest]
fn extract_reports_a_missing_osmconvert(workspace: Workspace) {
    let input = workspace.fixture("themes");
    let target = workspace.out().join("region.osm.pbf");
    let missing_tool = workspace.root.join("no-such-osmconvert");
    let output = pbfcut(&[
        "extract",
        input.as_str(),
        target.as_str(),
        "-b",
        "0,0,1,1",
        "--osmconvert",
        missing_tool.as_str(),
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("failed to launch"), "{}", stderr(&output));
}
