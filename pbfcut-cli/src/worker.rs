//! Hidden `worker` subcommand run by the export pool.

use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Args;
use pbfcut_pipeline::worker::{ARG_RESULT, ARG_TASK};

use crate::CliError;

/// Task and result files handed over by the orchestrator.
#[derive(Debug, Clone, Args)]
pub(crate) struct WorkerArgs {
    /// JSON task description.
    #[arg(long = ARG_TASK, value_name = "path")]
    pub(crate) task: Utf8PathBuf,
    /// Where to write the JSON outcome.
    #[arg(long = ARG_RESULT, value_name = "path")]
    pub(crate) result: Utf8PathBuf,
}

pub(crate) fn run_worker(args: &WorkerArgs) -> Result<ExitCode, CliError> {
    let outcome = pbfcut_pipeline::run_worker(&args.task, &args.result)?;
    let code = pbfcut_pipeline::exit_code(&outcome);
    Ok(u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from))
}
