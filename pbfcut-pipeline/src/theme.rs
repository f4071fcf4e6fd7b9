//! The per-theme algorithm run inside each worker.
//!
//! A task moves through `Loading`, then `Classifying`, `Clipping` (when a
//! boundary is set) and `Exporting` for each requested kind, and ends `Done`
//! or `Failed`. Export failures do not stop the remaining kinds; they are
//! gathered and fail the task once every kind has been attempted.

use std::time::Instant;

use log::{error, info, warn};
use pbfcut_core::{
    Bucket, ClipOutcome, FeatureExporter, FeatureSet, GeometryKind, InvalidGeometryPolicy,
    ThemeSource, classify, clip_features,
};

use crate::task::{FailureStage, KindReport, TaskFailure, TaskOutcome, TaskReport, ThemeTask};

/// Run `task` against `source`, writing through `exporter`.
pub fn run_theme_task<S, E>(task: &ThemeTask, source: &S, exporter: &E) -> TaskOutcome
where
    S: ThemeSource + ?Sized,
    E: FeatureExporter + ?Sized,
{
    let theme = task.theme;
    let started = Instant::now();
    let set = match source.load_theme(theme) {
        Ok(Some(set)) => set,
        Ok(None) => {
            info!("{theme}: empty theme");
            return TaskOutcome::Done(TaskReport {
                theme,
                kinds: Vec::new(),
            });
        }
        Err(err) => {
            error!("{theme}: load failed: {err}");
            return TaskOutcome::Failed(TaskFailure::new(theme, FailureStage::Load, err.to_string()));
        }
    };
    info!(
        "{theme}: load took {:.2?} ({} features)",
        started.elapsed(),
        set.len()
    );

    let policy = if task.boundary.is_some() && !task.keep_invalid {
        InvalidGeometryPolicy::Drop
    } else {
        InvalidGeometryPolicy::Keep
    };
    let mut kinds = Vec::with_capacity(task.kinds.len());
    let mut failures = Vec::new();
    for &kind in &task.kinds {
        match run_kind(task, &set, kind, policy, exporter) {
            Ok(report) => kinds.push(report),
            Err(message) => {
                error!("{theme} {kind}: {message}");
                failures.push(format!("{kind}: {message}"));
            }
        }
    }
    if !failures.is_empty() {
        return TaskOutcome::Failed(TaskFailure::new(
            theme,
            FailureStage::Export,
            failures.join("; "),
        ));
    }
    info!("{theme}: finished in {:.2?}", started.elapsed());
    TaskOutcome::Done(TaskReport { theme, kinds })
}

fn run_kind<E>(
    task: &ThemeTask,
    set: &FeatureSet,
    kind: GeometryKind,
    policy: InvalidGeometryPolicy,
    exporter: &E,
) -> Result<KindReport, String>
where
    E: FeatureExporter + ?Sized,
{
    let theme = task.theme;
    let started = Instant::now();
    let Bucket {
        features,
        removed_invalid,
        ..
    } = classify(set, kind, policy);
    if removed_invalid > 0 {
        warn!("{theme} {kind}: dropped {removed_invalid} invalid geometries");
    }
    let mut report = KindReport {
        kind,
        written: None,
        removed_invalid,
        clip_fallback: None,
    };
    let features = match &task.boundary {
        None => {
            info!("{theme} {kind}: classify took {:.2?}", started.elapsed());
            features
        }
        Some(boundary) => {
            let outcome = clip_features(features, boundary);
            info!("{theme} {kind}: clip took {:.2?}", started.elapsed());
            match outcome {
                ClipOutcome::Clipped(clipped) => clipped,
                ClipOutcome::ClipFailed { original, reason } => {
                    warn!("{theme} {kind}: clip failed ({reason}); exporting unclipped");
                    report.clip_fallback = Some(reason);
                    original
                }
            }
        }
    };
    if features.is_empty() {
        info!("{theme} {kind}: empty bucket");
        return Ok(report);
    }

    let started = Instant::now();
    let summary = exporter
        .export(theme, kind, &features)
        .map_err(|err| err.to_string())?;
    info!(
        "{theme} {kind}: write took {:.2?} ({} features to {})",
        started.elapsed(),
        summary.features,
        summary.path
    );
    report.written = Some(summary);
    Ok(report)
}
