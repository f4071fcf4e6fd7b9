//! Export command implementation for the pbfcut CLI.

use std::process::ExitCode;
use std::str::FromStr;

use camino::Utf8PathBuf;
use clap::Parser;
use log::{error, info};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use pbfcut_core::{BoundarySource, BoundingBox, GeometryKind, OutputFormat, Theme};
use pbfcut_pipeline::{ExportConfig, PoolConfig};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_BBOX, ARG_CLIP, ARG_EXT, ARG_FEATURE, ARG_INPUT, ARG_KEEP_INVALID, ARG_LAYER,
    ARG_MAX_WORKER_MEMORY_MB, ARG_OUTPUT, ARG_PREFIX, ARG_THEME, ARG_WORKERS, CliError,
    ENV_EXPORT_INPUT, ENV_EXPORT_OUTPUT, ENV_EXPORT_PREFIX, require_existing_dir,
    require_existing_file,
};

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// CLI arguments for the `export` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "export",
    long_about = "Split an OSM PBF file into one output per theme and \
                 geometry kind, optionally clipped to a vector boundary or \
                 bounding box. Every option can also come from a \
                 configuration file or PBFCUT_CMDS_EXPORT_* variables.",
    about = "Export OSM themes to vector files"
)]
#[ortho_config(prefix = "PBFCUT")]
pub(crate) struct ExportArgs {
    /// Source `.osm.pbf` file.
    #[arg(value_name = ARG_INPUT)]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
    /// Existing directory receiving the outputs.
    #[arg(value_name = ARG_OUTPUT)]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Prefix for every output file name.
    #[arg(value_name = ARG_PREFIX)]
    #[serde(default)]
    pub(crate) prefix: Option<String>,
    /// Comma-separated themes to export; defaults to the whole catalog.
    #[arg(short = 't', long = ARG_THEME, value_name = "a,b")]
    #[serde(default)]
    pub(crate) theme: Option<String>,
    /// Comma-separated geometry kinds (point, line, polygon).
    #[arg(short = 'f', long = ARG_FEATURE, value_name = "kinds")]
    #[serde(default)]
    pub(crate) feature: Option<String>,
    /// Number of worker processes.
    #[arg(short = 'w', long = ARG_WORKERS, value_name = "N")]
    #[serde(default)]
    pub(crate) workers: Option<usize>,
    /// Output format: shp, geojson or gpkg.
    #[arg(short = 'e', long = ARG_EXT, value_name = "format")]
    #[serde(default)]
    pub(crate) ext: Option<String>,
    /// Keep invalid geometries when clipping.
    #[arg(long = ARG_KEEP_INVALID)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) keep_invalid: bool,
    /// Vector file whose polygons bound the export.
    #[arg(short = 'c', long = ARG_CLIP, value_name = "path")]
    #[serde(default)]
    pub(crate) clip: Option<Utf8PathBuf>,
    /// Layer inside a multi-layer clip file.
    #[arg(short = 'l', long = ARG_LAYER, value_name = "name")]
    #[serde(default)]
    pub(crate) layer: Option<String>,
    /// Bounding box `minx,miny,maxx,maxy` in decimal degrees.
    #[arg(short = 'b', long = ARG_BBOX, value_name = "minx,miny,maxx,maxy", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) bbox: Option<String>,
    /// Kill workers whose resident memory exceeds this many MiB.
    #[arg(long = ARG_MAX_WORKER_MEMORY_MB, value_name = "MiB")]
    #[serde(default)]
    pub(crate) max_worker_memory_mb: Option<u64>,
}

impl ExportArgs {
    pub(crate) fn into_config(self) -> Result<ExportConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        build_config(merged)
    }
}

/// Resolve and validate the merged arguments without touching workers.
pub(crate) fn build_config(args: ExportArgs) -> Result<ExportConfig, CliError> {
    let input = args.input.ok_or(CliError::MissingArgument {
        field: ARG_INPUT,
        env: ENV_EXPORT_INPUT,
    })?;
    let output_dir = args.output.ok_or(CliError::MissingArgument {
        field: ARG_OUTPUT,
        env: ENV_EXPORT_OUTPUT,
    })?;
    let prefix = args.prefix.ok_or(CliError::MissingArgument {
        field: ARG_PREFIX,
        env: ENV_EXPORT_PREFIX,
    })?;
    let themes = match args.theme.as_deref() {
        Some(list) => parse_list::<Theme>(list)?,
        None => Theme::ALL.to_vec(),
    };
    let kinds = match args.feature.as_deref() {
        Some(list) => parse_list::<GeometryKind>(list)?,
        None => GeometryKind::ALL.to_vec(),
    };
    let workers = args.workers.unwrap_or(1);
    if workers == 0 {
        return Err(CliError::InvalidWorkers { value: workers });
    }
    let format = args
        .ext
        .as_deref()
        .map(str::parse::<OutputFormat>)
        .transpose()?
        .unwrap_or_default();
    let bbox = args
        .bbox
        .as_deref()
        .map(str::parse::<BoundingBox>)
        .transpose()?;
    let boundary = BoundarySource::from_options(args.clip.as_deref(), args.layer.as_deref(), bbox)?;
    let max_worker_memory = args
        .max_worker_memory_mb
        .map(|megabytes| {
            megabytes
                .checked_mul(BYTES_PER_MIB)
                .ok_or(CliError::InvalidMemoryCeiling { megabytes })
        })
        .transpose()?;

    let config = ExportConfig {
        input,
        output_dir,
        prefix,
        themes,
        kinds,
        format,
        keep_invalid: args.keep_invalid,
        boundary,
        pool: PoolConfig {
            workers,
            max_worker_memory,
            ..PoolConfig::default()
        },
    };
    validate_paths(&config)?;
    Ok(config)
}

fn validate_paths(config: &ExportConfig) -> Result<(), CliError> {
    require_existing_file(&config.input, ARG_INPUT)?;
    require_existing_dir(&config.output_dir)?;
    if let BoundarySource::VectorFile { path, .. } = &config.boundary {
        require_existing_file(path, ARG_CLIP)?;
    }
    Ok(())
}

/// Parse a comma-separated list, dropping blanks and repeats.
fn parse_list<T>(list: &str) -> Result<Vec<T>, CliError>
where
    T: FromStr + PartialEq,
    CliError: From<T::Err>,
{
    let mut items = Vec::new();
    for name in list.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        let item = name.parse::<T>()?;
        if !items.contains(&item) {
            items.push(item);
        }
    }
    Ok(items)
}

pub(crate) fn run_export(args: ExportArgs) -> Result<ExitCode, CliError> {
    let config = args.into_config()?;
    info!(
        "exporting {} to {} as {}",
        config.input, config.output_dir, config.format
    );
    let report = pbfcut_pipeline::run_export(&config)?;
    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        if !report.terminated.is_empty() {
            error!("outputs of terminated themes may be incomplete");
        }
        Err(CliError::ExportFailed {
            summary: report.to_string(),
        })
    }
}
