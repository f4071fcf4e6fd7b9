//! Parallel theme export pipeline.
//!
//! [`run_export`] resolves the boundary once, turns every requested theme
//! into a [`ThemeTask`] and hands the tasks to an [`Orchestrator`] backed by
//! worker processes. Each worker runs [`run_theme_task`] against the PBF
//! reader and the file exporter.
#![forbid(unsafe_code)]

use camino::Utf8PathBuf;
use log::{debug, info};
use pbfcut_core::{Boundary, BoundarySource, GeometryKind, OutputFormat, Theme};
use pbfcut_data::BoundaryReadError;
use thiserror::Error;

pub mod orchestrator;
pub mod process;
pub mod task;
pub mod theme;
pub mod worker;

pub use orchestrator::{
    DEFAULT_POLL_INTERVAL, LaunchError, Orchestrator, PipelineReport, PoolConfig, RunState,
    RunStatus, WorkerHandle, WorkerLauncher,
};
pub use process::{ProcessHandle, ProcessLauncher};
pub use task::{FailureStage, KindReport, TaskFailure, TaskOutcome, TaskReport, ThemeTask};
pub use theme::run_theme_task;
pub use worker::{FAILED_EXIT_CODE, WORKER_SUBCOMMAND, WorkerError, exit_code, run_worker};

/// Errors that stop a run before any worker starts.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The clip layer could not be read.
    #[error(transparent)]
    Boundary(#[from] BoundaryReadError),
    /// The staging directory for task files could not be created.
    #[error("failed to create the worker staging directory")]
    Staging(#[source] std::io::Error),
    /// The running executable could not be located.
    #[error("failed to locate the current executable")]
    CurrentExe(#[source] std::io::Error),
}

/// Everything an export run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Source `.osm.pbf` file.
    pub input: Utf8PathBuf,
    /// Existing directory receiving the outputs.
    pub output_dir: Utf8PathBuf,
    /// Output file prefix.
    pub prefix: String,
    /// Themes in dispatch order.
    pub themes: Vec<Theme>,
    /// Geometry kinds written per theme.
    pub kinds: Vec<GeometryKind>,
    /// Output container.
    pub format: OutputFormat,
    /// Keep invalid geometries when clipping.
    pub keep_invalid: bool,
    /// Where the clip boundary comes from.
    pub boundary: BoundarySource,
    /// Worker pool settings.
    pub pool: PoolConfig,
}

impl ExportConfig {
    /// One task per theme, each carrying its own copy of `boundary`.
    pub fn tasks(&self, boundary: Option<&Boundary>) -> Vec<ThemeTask> {
        self.themes
            .iter()
            .map(|theme| ThemeTask {
                theme: *theme,
                kinds: self.kinds.clone(),
                input: self.input.clone(),
                output_dir: self.output_dir.clone(),
                prefix: self.prefix.clone(),
                format: self.format,
                boundary: boundary.cloned(),
                keep_invalid: self.keep_invalid,
            })
            .collect()
    }
}

/// Turns a [`BoundarySource`] into a [`Boundary`].
pub trait BoundaryResolver {
    /// Resolve `source`; `Ok(None)` means no clipping.
    ///
    /// # Errors
    /// Returns [`BoundaryReadError`] when the source cannot be read.
    fn resolve(&self, source: &BoundarySource) -> Result<Option<Boundary>, BoundaryReadError>;
}

/// Reads boundaries from vector files with `pbfcut-data`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataBoundaryResolver;

impl BoundaryResolver for DataBoundaryResolver {
    fn resolve(&self, source: &BoundarySource) -> Result<Option<Boundary>, BoundaryReadError> {
        pbfcut_data::resolve_boundary(source)
    }
}

/// Run an export with worker processes spawned from the current executable.
///
/// # Errors
/// Returns [`PipelineError`] when the boundary cannot be read or the workers
/// cannot be staged. Task failures are reported through the
/// [`PipelineReport`].
pub fn run_export(config: &ExportConfig) -> Result<PipelineReport, PipelineError> {
    let launcher = ProcessLauncher::from_current_exe()?;
    debug!("staging worker files in {}", launcher.staging_dir());
    run_export_with(config, &DataBoundaryResolver, launcher)
}

/// Run an export with an explicit resolver and launcher.
///
/// # Errors
/// Returns [`PipelineError::Boundary`] when the boundary cannot be read.
pub fn run_export_with<R, L>(
    config: &ExportConfig,
    resolver: &R,
    launcher: L,
) -> Result<PipelineReport, PipelineError>
where
    R: BoundaryResolver + ?Sized,
    L: WorkerLauncher,
{
    let boundary = resolver.resolve(&config.boundary)?;
    if let Some(resolved) = &boundary {
        info!(
            "clipping to {} polygon(s) from {}",
            resolved.area().0.len(),
            config.boundary
        );
    }
    let tasks = config.tasks(boundary.as_ref());
    info!(
        "exporting {} theme(s) from {} with {} worker(s)",
        tasks.len(),
        config.input,
        config.pool.workers.max(1)
    );
    let mut orchestrator = Orchestrator::new(launcher, config.pool);
    Ok(orchestrator.run(tasks))
}
