//! Worker processes spawned from the current executable.

use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use tempfile::TempDir;

use crate::PipelineError;
use crate::orchestrator::{LaunchError, WorkerHandle, WorkerLauncher};
use crate::task::{FailureStage, TaskFailure, TaskOutcome, ThemeTask};
use crate::worker::{ARG_RESULT, ARG_TASK, WORKER_SUBCOMMAND, read_outcome_file, write_task_file};

/// Launches `<program> worker --task <file> --result <file>` per task.
///
/// Task and result files live in a staging directory removed when the
/// launcher is dropped.
#[derive(Debug)]
pub struct ProcessLauncher {
    program: PathBuf,
    _staging: TempDir,
    staging_path: Utf8PathBuf,
}

impl ProcessLauncher {
    /// Spawn workers from the running executable.
    ///
    /// # Errors
    /// Returns [`PipelineError`] when the executable path or the staging
    /// directory is unavailable.
    pub fn from_current_exe() -> Result<Self, PipelineError> {
        let program = std::env::current_exe().map_err(PipelineError::CurrentExe)?;
        Self::new(program)
    }

    /// Spawn workers from `program`.
    ///
    /// # Errors
    /// Returns [`PipelineError::Staging`] when the staging directory cannot
    /// be created.
    pub fn new(program: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let staging = tempfile::Builder::new()
            .prefix("pbfcut-")
            .tempdir()
            .map_err(PipelineError::Staging)?;
        let staging_path = Utf8PathBuf::from_path_buf(staging.path().to_path_buf())
            .map_err(|path| {
                PipelineError::Staging(std::io::Error::other(format!(
                    "staging directory {} is not UTF-8",
                    path.display()
                )))
            })?;
        Ok(Self {
            program: program.into(),
            _staging: staging,
            staging_path,
        })
    }

    /// Directory holding task and result files.
    pub fn staging_dir(&self) -> &Utf8Path {
        &self.staging_path
    }
}

impl WorkerLauncher for ProcessLauncher {
    type Handle = ProcessHandle;

    fn launch(&mut self, task: &ThemeTask) -> Result<Self::Handle, LaunchError> {
        let task_path = self.staging_path.join(format!("{}.task.json", task.theme));
        let result_path = self.staging_path.join(format!("{}.result.json", task.theme));
        write_task_file(&task_path, task).map_err(|err| LaunchError {
            theme: task.theme,
            message: err.to_string(),
            source: None,
        })?;
        let child = Command::new(&self.program)
            .arg(WORKER_SUBCOMMAND)
            .arg(format!("--{ARG_TASK}"))
            .arg(task_path.as_str())
            .arg(format!("--{ARG_RESULT}"))
            .arg(result_path.as_str())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| LaunchError {
                theme: task.theme,
                message: format!("could not spawn {}", self.program.display()),
                source: Some(source),
            })?;
        debug!("worker {} started for {}", child.id(), task.theme);
        Ok(ProcessHandle {
            task: task.clone(),
            child,
            result_path,
        })
    }
}

/// A spawned worker process.
#[derive(Debug)]
pub struct ProcessHandle {
    task: ThemeTask,
    child: Child,
    result_path: Utf8PathBuf,
}

impl ProcessHandle {
    fn crashed(&self, message: String) -> TaskOutcome {
        TaskOutcome::Failed(TaskFailure::new(
            self.task.theme,
            FailureStage::Crashed,
            message,
        ))
    }

    fn finished(&self, status: ExitStatus) -> TaskOutcome {
        match read_outcome_file(&self.result_path) {
            Ok(Some(outcome)) => outcome,
            Ok(None) => self.crashed(format!("worker exited with {status} without a result")),
            Err(err) => self.crashed(format!("worker exited with {status}: {err}")),
        }
    }
}

impl WorkerHandle for ProcessHandle {
    fn poll(&mut self) -> Option<TaskOutcome> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(self.finished(status)),
            Ok(None) => None,
            Err(err) => Some(self.crashed(format!("failed to query worker status: {err}"))),
        }
    }

    fn kill(&mut self) {
        if let Err(err) = self.child.kill() {
            debug!("kill {} failed: {err}", self.child.id());
        }
        if let Err(err) = self.child.wait() {
            debug!("reaping {} failed: {err}", self.child.id());
        }
    }

    fn resident_memory(&self) -> Option<u64> {
        resident_memory(self.child.id())
    }
}

/// Resident set size of `pid` in bytes, read from `/proc/<pid>/status`.
#[cfg(target_os = "linux")]
pub fn resident_memory(pid: u32) -> Option<u64> {
    let status = pbfcut_fs::read_to_string(Utf8Path::new(&format!("/proc/{pid}/status"))).ok()?;
    parse_vm_rss(&status)
}

/// Resident set size is not sampled on this platform.
#[cfg(not(target_os = "linux"))]
pub fn resident_memory(_pid: u32) -> Option<u64> {
    None
}

fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find_map(|line| line.strip_prefix("VmRSS:"))?;
    let kib: u64 = line.trim().trim_end_matches("kB").trim().parse().ok()?;
    kib.checked_mul(1024)
}
