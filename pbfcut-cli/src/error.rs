//! Error types emitted by the pbfcut CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use pbfcut_core::{
    BoundarySourceError, BoundingBoxError, UnknownFormat, UnknownGeometryKind, UnknownTheme,
};
use pbfcut_data::{CombineError, ExtractError};
use pbfcut_pipeline::{PipelineError, WorkerError};
use thiserror::Error;

/// Errors emitted by the pbfcut CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set {field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectPath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The output directory is missing or is not a directory.
    #[error("output directory {path:?} is not an existing directory")]
    OutputDirectoryNotDirectory { path: Utf8PathBuf },
    /// A theme name is not in the catalog.
    #[error(transparent)]
    UnknownTheme(#[from] UnknownTheme),
    /// A feature name is not a geometry kind.
    #[error(transparent)]
    UnknownFeature(#[from] UnknownGeometryKind),
    /// The worker count is zero or not a number.
    #[error("workers must be at least 1, got {value}")]
    InvalidWorkers { value: usize },
    /// The output format is not supported.
    #[error(transparent)]
    UnknownFormat(#[from] UnknownFormat),
    /// The bounding box could not be parsed.
    #[error("invalid bounding box: {0}")]
    InvalidBoundingBox(#[from] BoundingBoxError),
    /// The clip options do not describe a single boundary.
    #[error(transparent)]
    BoundarySource(#[from] BoundarySourceError),
    /// The memory ceiling overflows a byte count.
    #[error("worker memory ceiling of {megabytes} MiB is too large")]
    InvalidMemoryCeiling { megabytes: u64 },
    /// The export pipeline could not be set up.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// A theme failed and the run was stopped.
    #[error("export failed: {summary}")]
    ExportFailed { summary: String },
    /// `osmconvert` could not produce the extract.
    #[error(transparent)]
    Extract(#[from] ExtractError),
    /// The GeoPackages could not be combined.
    #[error(transparent)]
    Combine(#[from] CombineError),
    /// A worker could not read its task or record its result.
    #[error(transparent)]
    Worker(#[from] WorkerError),
}
