//! Combine command: merge single-layer GeoPackages sharing a prefix.

use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use log::{info, warn};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use pbfcut_data::combine_geopackages;
use serde::{Deserialize, Serialize};

use crate::{
    ARG_INPUT_DIR, ARG_OUTPUT, ARG_PREFIX, CliError, ENV_COMBINE_INPUT_DIR, ENV_COMBINE_OUTPUT,
    ENV_COMBINE_PREFIX,
};

/// CLI arguments for the `combine` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "combine",
    about = "Merge single-layer GeoPackages into one file"
)]
#[ortho_config(prefix = "PBFCUT")]
pub(crate) struct CombineArgs {
    /// Directory holding the GeoPackages to merge.
    #[arg(value_name = ARG_INPUT_DIR)]
    #[serde(default)]
    pub(crate) input_dir: Option<Utf8PathBuf>,
    /// GeoPackage to create; must not exist.
    #[arg(value_name = ARG_OUTPUT)]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Only merge files whose name contains this text.
    #[arg(value_name = ARG_PREFIX)]
    #[serde(default)]
    pub(crate) prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CombineConfig {
    pub(crate) input_dir: Utf8PathBuf,
    pub(crate) output: Utf8PathBuf,
    pub(crate) prefix: String,
}

impl TryFrom<CombineArgs> for CombineConfig {
    type Error = CliError;

    fn try_from(args: CombineArgs) -> Result<Self, Self::Error> {
        Ok(Self {
            input_dir: args.input_dir.ok_or(CliError::MissingArgument {
                field: ARG_INPUT_DIR,
                env: ENV_COMBINE_INPUT_DIR,
            })?,
            output: args.output.ok_or(CliError::MissingArgument {
                field: ARG_OUTPUT,
                env: ENV_COMBINE_OUTPUT,
            })?,
            prefix: args.prefix.ok_or(CliError::MissingArgument {
                field: ARG_PREFIX,
                env: ENV_COMBINE_PREFIX,
            })?,
        })
    }
}

pub(crate) fn run_combine(args: CombineArgs) -> Result<ExitCode, CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = CombineConfig::try_from(merged)?;
    let report = combine_geopackages(&config.input_dir, &config.output, &config.prefix)?;
    for skipped in &report.skipped {
        warn!("skipped {skipped}");
    }
    info!("combined {} layers into {}", report.layers.len(), config.output);
    Ok(ExitCode::SUCCESS)
}
