//! Core domain types for the pbfcut theme extractor.
//!
//! This crate knows nothing about files beyond `io::Write`: it defines the
//! theme catalog, feature records, boundaries, the polygon filter format, the
//! classification and clip stages, and the traits the data and pipeline
//! crates plug into.

pub mod boundary;
pub mod classify;
pub mod clip;
pub mod export;
pub mod feature;
pub mod poly;
pub mod source;
pub mod theme;

pub use boundary::{
    Boundary, BoundaryError, BoundarySource, BoundarySourceError, BoundingBox, BoundingBoxError,
    VectorFormat,
};
pub use classify::{Bucket, InvalidGeometryPolicy, classify};
pub use clip::{ClipOutcome, clip_features};
pub use export::{
    ExportError, ExportSummary, FeatureExporter, OutputFormat, UnknownFormat, layer_name,
    output_stem,
};
pub use feature::{
    ElementKind, Feature, FeatureError, FeatureSet, GeometryKind, Tags, UnknownGeometryKind,
};
pub use poly::{PolyDocument, PolyError, PolyParseError, RingCounter};
pub use source::{SourceError, ThemeSource};
pub use theme::{Theme, UnknownTheme};
