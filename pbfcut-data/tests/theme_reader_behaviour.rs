//! Behavioural tests for the OSM theme reader.

use camino::{Utf8Path, Utf8PathBuf};
use geo::{Geometry, Rect, coord};
use pbfcut_core::{ElementKind, GeometryKind, Theme};
use pbfcut_data::{OsmReadError, OsmThemeReader, OsmThemeReport};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::{cell::RefCell, fs};
use tempfile::TempPath;

mod support;

use support::{decode_fixture, utf8_path};

type ReadResult = RefCell<Option<Result<OsmThemeReport, OsmReadError>>>;

#[fixture]
fn fixtures_dir() -> Utf8PathBuf {
    support::fixtures_dir()
}

enum FixtureTarget {
    Existing(TempPath),
    Missing(Utf8PathBuf),
}

impl FixtureTarget {
    fn path(&self) -> Utf8PathBuf {
        match self {
            Self::Existing(temp) => utf8_path(temp),
            Self::Missing(path) => path.clone(),
        }
    }
}

#[fixture]
fn target_fixture() -> RefCell<Option<FixtureTarget>> {
    RefCell::new(None)
}

#[fixture]
fn read_result() -> ReadResult {
    RefCell::new(None)
}

fn expect_report(result: &ReadResult) -> OsmThemeReport {
    result
        .borrow()
        .as_ref()
        .expect("theme was read")
        .as_ref()
        .expect("expected a successful read")
        .clone()
}

fn read_with(target: &RefCell<Option<FixtureTarget>>, result: &ReadResult, theme: Theme, window: Option<Rect<f64>>) {
    let outcome = {
        let guard = target.borrow();
        let path = guard.as_ref().expect("target path prepared").path();
        let reader = OsmThemeReader::new(path);
        let reader = match window {
            Some(rect) => reader.with_spatial_filter(rect),
            None => reader,
        };
        reader.read_theme(theme)
    };
    *result.borrow_mut() = Some(outcome);
}

#[given("the sample themes dataset")]
fn themes_dataset(
    #[from(fixtures_dir)] dir: Utf8PathBuf,
    #[from(target_fixture)] target: &RefCell<Option<FixtureTarget>>,
) {
    *target.borrow_mut() = Some(FixtureTarget::Existing(decode_fixture(&dir, "themes")));
}

#[given("a path to a missing PBF file")]
fn missing_dataset(
    #[from(fixtures_dir)] dir: Utf8PathBuf,
    #[from(target_fixture)] target: &RefCell<Option<FixtureTarget>>,
) {
    *target.borrow_mut() = Some(FixtureTarget::Missing(dir.join("missing.osm.pbf")));
}

#[given("a path to a file containing invalid PBF data")]
fn invalid_dataset(
    #[from(fixtures_dir)] dir: Utf8PathBuf,
    #[from(target_fixture)] target: &RefCell<Option<FixtureTarget>>,
) {
    *target.borrow_mut() = Some(FixtureTarget::Existing(decode_fixture(&dir, "invalid")));
}

#[when("I read the highway theme")]
fn read_highway(
    #[from(target_fixture)] target: &RefCell<Option<FixtureTarget>>,
    #[from(read_result)] result: &ReadResult,
) {
    read_with(target, result, Theme::Highway, None);
}

#[when("I read the landuse theme")]
fn read_landuse(
    #[from(target_fixture)] target: &RefCell<Option<FixtureTarget>>,
    #[from(read_result)] result: &ReadResult,
) {
    read_with(target, result, Theme::Landuse, None);
}

#[when("I read the building theme inside the window from 1.9,1.9 to 2.2,2.2")]
fn read_buildings_in_window(
    #[from(target_fixture)] target: &RefCell<Option<FixtureTarget>>,
    #[from(read_result)] result: &ReadResult,
) {
    let window = Rect::new(coord! { x: 1.9, y: 1.9 }, coord! { x: 2.2, y: 2.2 });
    read_with(target, result, Theme::Building, Some(window));
}

#[then("one street line and one stop point are returned")]
fn street_and_stop(#[from(read_result)] result: &ReadResult) {
    let report = expect_report(result);
    let kinds: Vec<_> = report
        .features
        .iter()
        .map(|feature| (feature.id(), feature.kind()))
        .collect();
    assert_eq!(kinds, vec![(4, GeometryKind::Point), (10, GeometryKind::Line)]);
    let street = report.features.get(1).expect("street present");
    assert_eq!(
        street.tags().get("name").map(String::as_str),
        Some("Main Street")
    );
}

#[then("one forest multipolygon with a hole is returned")]
fn forest_with_hole(#[from(read_result)] result: &ReadResult) {
    let report = expect_report(result);
    let [forest] = report.features.as_slice() else {
        panic!("expected exactly one feature, got {:?}", report.features);
    };
    assert_eq!(forest.element(), ElementKind::Relation);
    assert_eq!(forest.id(), 20);
    let Geometry::MultiPolygon(area) = forest.geometry() else {
        panic!("expected a multipolygon, got {:?}", forest.geometry());
    };
    let holes: usize = area.iter().map(|polygon| polygon.interiors().len()).sum();
    assert_eq!(holes, 1, "the inner member should become a hole");
}

#[then("only the depot building is returned")]
fn only_depot(#[from(read_result)] result: &ReadResult) {
    let report = expect_report(result);
    let names: Vec<_> = report
        .features
        .iter()
        .filter_map(|feature| feature.tags().get("name").cloned())
        .collect();
    assert_eq!(names, vec!["Depot".to_owned()]);
    assert_eq!(report.summary.ways, 2, "both buildings were scanned");
}

#[then("an open error is returned")]
fn open_error(#[from(read_result)] result: &ReadResult) {
    let borrowed = result.borrow();
    match borrowed.as_ref().expect("theme was read") {
        Ok(_) => panic!("expected an error for the missing file"),
        Err(OsmReadError::Open { path, .. }) => {
            assert!(
                path.as_str().ends_with("missing.osm.pbf"),
                "unexpected path in error: {path}"
            );
        }
        Err(other) => panic!("expected an open error, got {other:?}"),
    }
}

#[then("a decode error is returned")]
fn decode_error(#[from(read_result)] result: &ReadResult) {
    let borrowed = result.borrow();
    match borrowed.as_ref().expect("theme was read") {
        Ok(_) => panic!("expected an error for the invalid data"),
        Err(OsmReadError::Decode { source, path }) => {
            assert_eq!(path.extension(), Some("pbf"), "unexpected path in error: {path}");
            assert!(
                !source.to_string().is_empty(),
                "decode error should preserve the source message"
            );
        }
        Err(other) => panic!("expected a decode error, got {other:?}"),
    }
}

#[scenario(path = "tests/features/theme_reader.feature", index = 0)]
fn reading_a_line_theme(
    fixtures_dir: Utf8PathBuf,
    target_fixture: RefCell<Option<FixtureTarget>>,
    read_result: ReadResult,
) {
    let _ = (fixtures_dir, target_fixture, read_result);
}

#[scenario(path = "tests/features/theme_reader.feature", index = 1)]
fn assembling_relations(
    fixtures_dir: Utf8PathBuf,
    target_fixture: RefCell<Option<FixtureTarget>>,
    read_result: ReadResult,
) {
    let _ = (fixtures_dir, target_fixture, read_result);
}

#[scenario(path = "tests/features/theme_reader.feature", index = 2)]
fn restricting_to_a_window(
    fixtures_dir: Utf8PathBuf,
    target_fixture: RefCell<Option<FixtureTarget>>,
    read_result: ReadResult,
) {
    let _ = (fixtures_dir, target_fixture, read_result);
}

#[scenario(path = "tests/features/theme_reader.feature", index = 3)]
fn reporting_missing_files(
    fixtures_dir: Utf8PathBuf,
    target_fixture: RefCell<Option<FixtureTarget>>,
    read_result: ReadResult,
) {
    let _ = (fixtures_dir, target_fixture, read_result);
}

#[scenario(path = "tests/features/theme_reader.feature", index = 4)]
fn rejecting_corrupt_data(
    fixtures_dir: Utf8PathBuf,
    target_fixture: RefCell<Option<FixtureTarget>>,
    read_result: ReadResult,
) {
    let _ = (fixtures_dir, target_fixture, read_result);
}

#[test]
fn scenario_indices_follow_feature_order() {
    let feature = Utf8Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/features/theme_reader.feature");
    let contents = fs::read_to_string(&feature).unwrap_or_else(|err| {
        panic!("failed to read feature file {feature}: {err}");
    });
    let titles: Vec<&str> = contents
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Scenario: "))
        .collect();
    assert_eq!(
        titles,
        vec![
            "reading a line theme",
            "assembling multipolygon relations",
            "restricting features to a window",
            "reporting a missing file",
            "rejecting a corrupted dataset",
        ],
        "scenario order changed in feature file"
    );
}
