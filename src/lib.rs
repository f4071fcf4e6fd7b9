//! Facade crate for the pbfcut theme extractor.
//!
//! This crate re-exports the core domain types and, behind the `data`
//! feature, the PBF reader and file writers.

#![forbid(unsafe_code)]

pub use pbfcut_core::{
    Boundary, BoundarySource, BoundingBox, Bucket, ClipOutcome, ExportSummary, Feature,
    FeatureExporter, FeatureSet, GeometryKind, InvalidGeometryPolicy, OutputFormat, Tags, Theme,
    ThemeSource, classify, clip_features,
};

#[cfg(feature = "data")]
pub use pbfcut_data::{FileExporter, OsmThemeReader};
