//! Data access for the pbfcut theme extractor.
//!
//! Responsibilities:
//! - Read theme features out of OSM PBF files.
//! - Read clip boundaries from vector files.
//! - Write feature buckets as Shapefile, GeoJSON or GeoPackage files.
//! - Drive `osmconvert` and merge GeoPackages for the auxiliary commands.
//!
//! Boundaries:
//! - Do not encode classification or clipping rules (those live in
//!   `pbfcut-core`).
//! - Never spawn worker processes (see `pbfcut-pipeline`).

pub mod boundary;
pub mod combine;
pub mod export;
pub mod extract;
pub mod geopackage;
mod ingest;
pub mod wkb;

pub use boundary::{BoundaryLayer, BoundaryReadError, read_boundary_layer, resolve_boundary};
pub use combine::{CombineError, CombineReport, combine_geopackages};
pub use export::FileExporter;
pub use extract::{
    DEFAULT_OSMCONVERT, ExtractError, ExtractRequest, OsmConvert, RegionFilter, prepare_request,
};
pub use ingest::{OsmReadError, OsmThemeReader, OsmThemeReport, OsmThemeSummary};
