//! Entry point of a theme worker process.
//!
//! The worker reads its [`ThemeTask`] from a JSON file, runs it against the
//! PBF reader and file exporter, and writes the [`TaskOutcome`] to a result
//! file. The exit code mirrors the outcome.

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use pbfcut_data::{FileExporter, OsmThemeReader};
use thiserror::Error;

use crate::task::{TaskOutcome, ThemeTask};
use crate::theme::run_theme_task;

/// Subcommand the orchestrator uses to start a worker.
pub const WORKER_SUBCOMMAND: &str = "worker";
/// Flag carrying the task file path.
pub const ARG_TASK: &str = "task";
/// Flag carrying the result file path.
pub const ARG_RESULT: &str = "result";
/// Exit code of a worker whose task failed.
pub const FAILED_EXIT_CODE: i32 = 2;

/// Errors that prevent a worker from producing a result file.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A task or result file could not be read.
    #[error("failed to read {path:?}")]
    ReadTask {
        /// Task file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A task or result file was malformed.
    #[error("failed to parse {path:?}")]
    ParseTask {
        /// Task file.
        path: Utf8PathBuf,
        /// Decoding error.
        #[source]
        source: serde_json::Error,
    },
    /// A task or outcome could not be encoded.
    #[error("failed to encode worker file")]
    EncodeResult(#[source] serde_json::Error),
    /// A task or result file could not be written.
    #[error("failed to write {path:?}")]
    WriteResult {
        /// Result file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Load a task from `path`.
///
/// # Errors
/// Returns [`WorkerError`] when the file is unreadable or malformed.
pub fn read_task(path: &Utf8Path) -> Result<ThemeTask, WorkerError> {
    let text = pbfcut_fs::read_to_string(path).map_err(|source| WorkerError::ReadTask {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| WorkerError::ParseTask {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `outcome` to `path` atomically.
///
/// # Errors
/// Returns [`WorkerError`] when encoding or writing fails.
pub fn write_outcome(path: &Utf8Path, outcome: &TaskOutcome) -> Result<(), WorkerError> {
    let bytes = serde_json::to_vec(outcome).map_err(WorkerError::EncodeResult)?;
    pbfcut_fs::write_atomic(path, &bytes).map_err(|source| WorkerError::WriteResult {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `task` to `path` for a worker to pick up.
///
/// # Errors
/// Returns [`WorkerError`] when encoding or writing fails.
pub fn write_task_file(path: &Utf8Path, task: &ThemeTask) -> Result<(), WorkerError> {
    let bytes = serde_json::to_vec(task).map_err(WorkerError::EncodeResult)?;
    pbfcut_fs::write_atomic(path, &bytes).map_err(|source| WorkerError::WriteResult {
        path: path.to_path_buf(),
        source,
    })
}

/// Read the outcome a worker left at `path`, if it wrote one.
///
/// # Errors
/// Returns [`WorkerError`] when the file exists but cannot be read or
/// parsed.
pub fn read_outcome_file(path: &Utf8Path) -> Result<Option<TaskOutcome>, WorkerError> {
    let exists = pbfcut_fs::path_exists(path).map_err(|source| WorkerError::ReadTask {
        path: path.to_path_buf(),
        source,
    })?;
    if !exists {
        return Ok(None);
    }
    let text = pbfcut_fs::read_to_string(path).map_err(|source| WorkerError::ReadTask {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| WorkerError::ParseTask {
            path: path.to_path_buf(),
            source,
        })
}

/// Run the task in `task_path` and record its outcome in `result_path`.
///
/// The reader skips features whose bounding box misses the boundary's, so
/// distant features never reach the clip stage.
///
/// # Errors
/// Returns [`WorkerError`] when the task cannot be read or the result
/// cannot be written. Task failures are reported through the outcome.
pub fn run_worker(task_path: &Utf8Path, result_path: &Utf8Path) -> Result<TaskOutcome, WorkerError> {
    let task = read_task(task_path)?;
    debug!("worker {} starting {}", std::process::id(), task.theme);
    let mut reader = OsmThemeReader::new(task.input.clone());
    if let Some(rect) = task.boundary.as_ref().and_then(|boundary| boundary.bounding_rect()) {
        reader = reader.with_spatial_filter(rect);
    }
    let exporter = FileExporter::new(task.output_dir.clone(), task.prefix.clone(), task.format);
    let outcome = run_theme_task(&task, &reader, &exporter);
    write_outcome(result_path, &outcome)?;
    Ok(outcome)
}

/// Process exit code for `outcome`.
pub const fn exit_code(outcome: &TaskOutcome) -> i32 {
    match outcome {
        TaskOutcome::Done(_) => 0,
        TaskOutcome::Failed(_) => FAILED_EXIT_CODE,
    }
}
