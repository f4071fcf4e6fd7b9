//! Behavioural tests for writing and reading polygon filter documents.

use geo::{Geometry, LineString, MultiPolygon, Polygon};
use pbfcut_core::PolyDocument;
use pbfcut_core::poly::to_poly_string;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

fn ring(points: &[(f64, f64)]) -> LineString<f64> {
    LineString::from(points.to_vec())
}

#[fixture]
fn geometry() -> RefCell<Option<Geometry<f64>>> {
    RefCell::new(None)
}

#[fixture]
fn document() -> RefCell<Option<String>> {
    RefCell::new(None)
}

#[fixture]
fn parsed() -> RefCell<Option<PolyDocument>> {
    RefCell::new(None)
}

fn serialise(geometry: &RefCell<Option<Geometry<f64>>>) -> String {
    let borrowed = geometry.borrow();
    let shape = borrowed.as_ref().expect("boundary prepared");
    to_poly_string("area", std::slice::from_ref(shape)).expect("serialise boundary")
}

#[given("a square boundary polygon")]
fn square_polygon(#[from(geometry)] geometry: &RefCell<Option<Geometry<f64>>>) {
    let square = Polygon::new(
        ring(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)]),
        Vec::new(),
    );
    *geometry.borrow_mut() = Some(Geometry::Polygon(square));
}

#[given("a multipolygon whose first part has two holes")]
fn holed_multipolygon(#[from(geometry)] geometry: &RefCell<Option<Geometry<f64>>>) {
    let holed = Polygon::new(
        ring(&[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)]),
        vec![
            ring(&[(1.0, 1.0), (1.0, 2.0), (2.0, 2.0)]),
            ring(&[(5.0, 5.0), (5.0, 6.0), (6.0, 6.0)]),
        ],
    );
    let island = Polygon::new(
        ring(&[(20.0, 20.0), (20.0, 21.0), (21.0, 21.0)]),
        Vec::new(),
    );
    *geometry.borrow_mut() = Some(Geometry::MultiPolygon(MultiPolygon(vec![holed, island])));
}

#[when("I serialise the boundary")]
fn serialise_boundary(
    #[from(geometry)] geometry: &RefCell<Option<Geometry<f64>>>,
    #[from(document)] document: &RefCell<Option<String>>,
) {
    *document.borrow_mut() = Some(serialise(geometry));
}

#[when("I serialise and parse the boundary")]
fn serialise_and_parse(
    #[from(geometry)] geometry: &RefCell<Option<Geometry<f64>>>,
    #[from(parsed)] parsed: &RefCell<Option<PolyDocument>>,
) {
    let text = serialise(geometry);
    *parsed.borrow_mut() = Some(text.parse().expect("parse document"));
}

fn ring_headers(document: &RefCell<Option<String>>) -> Vec<String> {
    let borrowed = document.borrow();
    let text = borrowed.as_ref().expect("document written");
    text.lines()
        .skip(1)
        .filter(|line| !line.starts_with('\t') && *line != "END")
        .map(str::to_owned)
        .collect()
}

#[then("the document lists one exterior ring and two END lines")]
fn single_ring(#[from(document)] document: &RefCell<Option<String>>) {
    assert_eq!(ring_headers(document), vec!["0".to_owned()]);
    let borrowed = document.borrow();
    let text = borrowed.as_ref().expect("document written");
    let ends = text.lines().filter(|line| *line == "END").count();
    assert_eq!(ends, 2, "expected one ring END and one document END");
}

#[then("the ring ids continue across holes and parts")]
fn continuing_ids(#[from(document)] document: &RefCell<Option<String>>) {
    assert_eq!(ring_headers(document), vec!["0", "!1", "!2", "3"]);
}

#[then("the parsed document has four exterior coordinates and no holes")]
fn parsed_square(#[from(parsed)] parsed: &RefCell<Option<PolyDocument>>) {
    let borrowed = parsed.borrow();
    let doc = borrowed.as_ref().expect("document parsed");
    assert_eq!(doc.label, "area");
    assert_eq!(doc.rings.len(), 1, "expected a single ring");
    assert!(doc.rings.iter().all(|r| !r.hole), "expected no holes");
    let exterior = doc.rings.first().expect("exterior ring");
    assert_eq!(exterior.coords.len(), 4);
}

#[scenario(path = "tests/features/poly.feature", index = 0)]
fn serialising_square(
    geometry: RefCell<Option<Geometry<f64>>>,
    document: RefCell<Option<String>>,
) {
    let _ = (geometry, document);
}

#[scenario(path = "tests/features/poly.feature", index = 1)]
fn serialising_multipolygon(
    geometry: RefCell<Option<Geometry<f64>>>,
    document: RefCell<Option<String>>,
) {
    let _ = (geometry, document);
}

#[scenario(path = "tests/features/poly.feature", index = 2)]
fn reading_back(geometry: RefCell<Option<Geometry<f64>>>, parsed: RefCell<Option<PolyDocument>>) {
    let _ = (geometry, parsed);
}
