//! Command-line interface for the pbfcut theme extractor.
#![forbid(unsafe_code)]

use std::process::ExitCode;

use camino::Utf8Path;
use clap::{Parser, Subcommand};

mod combine;
mod error;
mod export;
mod extract;
mod worker;

pub use error::CliError;

use combine::CombineArgs;
use export::ExportArgs;
use extract::ExtractArgs;
use worker::WorkerArgs;

const ARG_INPUT: &str = "INPUT";
const ARG_OUTPUT: &str = "OUTPUT";
const ARG_PREFIX: &str = "PREFIX";
const ARG_INPUT_DIR: &str = "INPUT_DIR";
const ARG_THEME: &str = "theme";
const ARG_FEATURE: &str = "feature";
const ARG_WORKERS: &str = "workers";
const ARG_EXT: &str = "ext";
const ARG_KEEP_INVALID: &str = "keep-invalid";
const ARG_CLIP: &str = "clip";
const ARG_LAYER: &str = "layer";
const ARG_BBOX: &str = "bbox";
const ARG_MAX_WORKER_MEMORY_MB: &str = "max-worker-memory-mb";
const ARG_OSMCONVERT: &str = "osmconvert";

const ENV_EXPORT_INPUT: &str = "PBFCUT_CMDS_EXPORT_INPUT";
const ENV_EXPORT_OUTPUT: &str = "PBFCUT_CMDS_EXPORT_OUTPUT";
const ENV_EXPORT_PREFIX: &str = "PBFCUT_CMDS_EXPORT_PREFIX";
const ENV_EXTRACT_INPUT: &str = "PBFCUT_CMDS_EXTRACT_INPUT";
const ENV_EXTRACT_OUTPUT: &str = "PBFCUT_CMDS_EXTRACT_OUTPUT";
const ENV_OSMCONVERT: &str = "OSMCONVERT";
const ENV_COMBINE_INPUT_DIR: &str = "PBFCUT_CMDS_COMBINE_INPUT_DIR";
const ENV_COMBINE_OUTPUT: &str = "PBFCUT_CMDS_COMBINE_OUTPUT";
const ENV_COMBINE_PREFIX: &str = "PBFCUT_CMDS_COMBINE_PREFIX";

/// Run the pbfcut CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when the arguments are invalid or the command fails.
pub fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Export(args) => export::run_export(args),
        Command::Extract(args) => extract::run_extract(args),
        Command::Combine(args) => combine::run_combine(args),
        Command::Worker(args) => worker::run_worker(&args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "pbfcut",
    about = "Split OpenStreetMap extracts into per-theme vector files",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Export OSM themes to Shapefile, GeoJSON or GeoPackage files.
    Export(ExportArgs),
    /// Cut a region out of a PBF file with osmconvert.
    Extract(ExtractArgs),
    /// Merge single-layer GeoPackages into one file.
    Combine(CombineArgs),
    /// Run one theme task; spawned by `export`.
    #[command(hide = true)]
    Worker(WorkerArgs),
}

fn require_existing_file(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match pbfcut_fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectPath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn require_existing_dir(path: &Utf8Path) -> Result<(), CliError> {
    match pbfcut_fs::dir_is_dir(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::OutputDirectoryNotDirectory {
            path: path.to_path_buf(),
        }),
        Err(source)
            if matches!(
                source.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
            ) =>
        {
            Err(CliError::OutputDirectoryNotDirectory {
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectPath {
            field: ARG_OUTPUT,
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests;
