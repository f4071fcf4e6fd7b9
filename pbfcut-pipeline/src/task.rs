//! Work items exchanged between the orchestrator and theme workers.
//!
//! Both types travel as JSON files between processes, so everything here
//! derives `serde`.

use std::fmt;

use camino::Utf8PathBuf;
use pbfcut_core::{Boundary, ExportSummary, GeometryKind, OutputFormat, Theme};
use serde::{Deserialize, Serialize};

/// Everything a worker needs to process one theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeTask {
    /// Theme to extract.
    pub theme: Theme,
    /// Geometry kinds to export, in order.
    pub kinds: Vec<GeometryKind>,
    /// Source PBF file.
    pub input: Utf8PathBuf,
    /// Directory receiving the outputs.
    pub output_dir: Utf8PathBuf,
    /// Output file name prefix.
    pub prefix: String,
    /// Container format.
    pub format: OutputFormat,
    /// Clip area, copied into every task.
    pub boundary: Option<Boundary>,
    /// Export invalid geometries even when clipping.
    pub keep_invalid: bool,
}

/// The stage at which a task failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Reading the theme from the source.
    Load,
    /// Writing one or more buckets.
    Export,
    /// The worker died or produced no readable result.
    Crashed,
    /// The worker exceeded the configured memory ceiling.
    ResourceLimit,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Export => "export",
            Self::Crashed => "crashed",
            Self::ResourceLimit => "resource limit",
        })
    }
}

/// Why a task failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// Theme of the failed task.
    pub theme: Theme,
    /// Failing stage.
    pub stage: FailureStage,
    /// Human-readable detail.
    pub message: String,
}

impl TaskFailure {
    /// Describe a failure of `theme` at `stage`.
    pub fn new(theme: Theme, stage: FailureStage, message: impl Into<String>) -> Self {
        Self {
            theme,
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed ({}): {}", self.theme, self.stage, self.message)
    }
}

/// Result of one geometry kind within a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindReport {
    /// The geometry kind.
    pub kind: GeometryKind,
    /// The file written, or `None` when the bucket was empty.
    pub written: Option<ExportSummary>,
    /// Features dropped as invalid before clipping.
    pub removed_invalid: usize,
    /// Set when clipping failed and the bucket was exported unclipped.
    pub clip_fallback: Option<String>,
}

/// A successfully processed theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    /// Theme processed.
    pub theme: Theme,
    /// One entry per requested kind; empty when the theme had no features.
    pub kinds: Vec<KindReport>,
}

impl TaskReport {
    /// Files written by the task.
    pub fn outputs(&self) -> impl Iterator<Item = &ExportSummary> {
        self.kinds.iter().filter_map(|kind| kind.written.as_ref())
    }
}

/// Terminal result of a task as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Every requested kind was handled.
    Done(TaskReport),
    /// The task failed; siblings must be stopped.
    Failed(TaskFailure),
}

impl TaskOutcome {
    /// Theme the outcome belongs to.
    pub const fn theme(&self) -> Theme {
        match self {
            Self::Done(report) => report.theme,
            Self::Failed(failure) => failure.theme,
        }
    }

    /// Whether the task failed.
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_are_tagged_in_json() {
        let outcome = TaskOutcome::Failed(TaskFailure::new(
            Theme::Shop,
            FailureStage::ResourceLimit,
            "rss 900 MiB",
        ));
        let json = serde_json::to_value(&outcome).expect("serialise");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["stage"], "resource_limit");
        assert_eq!(json["theme"], "shop");
    }

    #[test]
    fn failures_render_theme_and_stage() {
        let failure = TaskFailure::new(Theme::Highway, FailureStage::Load, "truncated blob");
        assert_eq!(failure.to_string(), "highway failed (load): truncated blob");
    }
}
