//! Behavioural tests for the classification and clip stages.

use geo::{Geometry, LineString, Polygon};
use pbfcut_core::{
    Boundary, BoundingBox, Bucket, ClipOutcome, ElementKind, Feature, FeatureSet, GeometryKind,
    InvalidGeometryPolicy, Tags, Theme, classify, clip_features,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

fn building(id: i64, ring: &[(f64, f64)]) -> Feature {
    let tags = Tags::from([("building".to_owned(), "yes".to_owned())]);
    let polygon = Polygon::new(LineString::from(ring.to_vec()), Vec::new());
    Feature::new(id, ElementKind::Way, Geometry::Polygon(polygon), tags).expect("building")
}

#[fixture]
fn theme_set() -> RefCell<Option<FeatureSet>> {
    RefCell::new(None)
}

#[fixture]
fn bucket() -> RefCell<Option<Bucket>> {
    RefCell::new(None)
}

#[fixture]
fn clipped() -> RefCell<Option<ClipOutcome>> {
    RefCell::new(None)
}

#[given("a building theme with three polygons of which one is invalid")]
fn three_buildings(#[from(theme_set)] theme_set: &RefCell<Option<FeatureSet>>) {
    let features = vec![
        building(11, &[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)]),
        building(12, &[(0.0, 0.0), (1.0, 1.0), (1.0, 0.0), (0.0, 1.0), (0.0, 0.0)]),
        building(13, &[(5.0, 5.0), (5.0, 6.0), (6.0, 6.0), (6.0, 5.0), (5.0, 5.0)]),
    ];
    *theme_set.borrow_mut() = Some(FeatureSet::new(Theme::Building, features));
}

fn run_classify(
    theme_set: &RefCell<Option<FeatureSet>>,
    bucket: &RefCell<Option<Bucket>>,
    policy: InvalidGeometryPolicy,
) {
    let borrowed = theme_set.borrow();
    let set = borrowed.as_ref().expect("theme prepared");
    *bucket.borrow_mut() = Some(classify(set, GeometryKind::Polygon, policy));
}

#[when("I classify the polygons dropping invalid geometry")]
fn classify_dropping(
    #[from(theme_set)] theme_set: &RefCell<Option<FeatureSet>>,
    #[from(bucket)] bucket: &RefCell<Option<Bucket>>,
) {
    run_classify(theme_set, bucket, InvalidGeometryPolicy::Drop);
}

#[when("I classify the polygons keeping invalid geometry")]
fn classify_keeping(
    #[from(theme_set)] theme_set: &RefCell<Option<FeatureSet>>,
    #[from(bucket)] bucket: &RefCell<Option<Bucket>>,
) {
    run_classify(theme_set, bucket, InvalidGeometryPolicy::Keep);
}

#[when("I clip the bucket to the box from 0,0 to 1.5,1.5")]
fn clip_bucket(
    #[from(bucket)] bucket: &RefCell<Option<Bucket>>,
    #[from(clipped)] clipped: &RefCell<Option<ClipOutcome>>,
) {
    let bbox: BoundingBox = "0,0,1.5,1.5".parse().expect("valid bbox");
    let boundary = Boundary::from_bbox(&bbox);
    let features = bucket.borrow().as_ref().expect("bucket classified").features.clone();
    *clipped.borrow_mut() = Some(clip_features(features, &boundary));
}

fn assert_bucket(bucket: &RefCell<Option<Bucket>>, kept: usize, removed: usize) {
    let borrowed = bucket.borrow();
    let classified = borrowed.as_ref().expect("bucket classified");
    assert_eq!(classified.features.len(), kept, "unexpected kept count");
    assert_eq!(classified.removed_invalid, removed, "unexpected removed count");
}

#[then("two polygons are kept and one is reported as removed")]
fn two_kept(#[from(bucket)] bucket: &RefCell<Option<Bucket>>) {
    assert_bucket(bucket, 2, 1);
}

#[then("three polygons are kept and none are reported as removed")]
fn three_kept(#[from(bucket)] bucket: &RefCell<Option<Bucket>>) {
    assert_bucket(bucket, 3, 0);
}

#[then("only the polygons overlapping the box remain")]
fn overlapping_remain(#[from(clipped)] clipped: &RefCell<Option<ClipOutcome>>) {
    let borrowed = clipped.borrow();
    match borrowed.as_ref().expect("bucket clipped") {
        ClipOutcome::Clipped(features) => {
            let ids: Vec<i64> = features.iter().map(Feature::id).collect();
            assert_eq!(ids, vec![11]);
        }
        ClipOutcome::ClipFailed { reason, .. } => panic!("unexpected clip failure: {reason}"),
    }
}

#[scenario(path = "tests/features/classify_clip.feature", index = 0)]
fn dropping_invalid(theme_set: RefCell<Option<FeatureSet>>, bucket: RefCell<Option<Bucket>>) {
    let _ = (theme_set, bucket);
}

#[scenario(path = "tests/features/classify_clip.feature", index = 1)]
fn keeping_invalid(theme_set: RefCell<Option<FeatureSet>>, bucket: RefCell<Option<Bucket>>) {
    let _ = (theme_set, bucket);
}

#[scenario(path = "tests/features/classify_clip.feature", index = 2)]
fn clipping_to_box(
    theme_set: RefCell<Option<FeatureSet>>,
    bucket: RefCell<Option<Bucket>>,
    clipped: RefCell<Option<ClipOutcome>>,
) {
    let _ = (theme_set, bucket, clipped);
}
