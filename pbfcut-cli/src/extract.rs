//! Extract command: cut a region out of a PBF file with `osmconvert`.

use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use pbfcut_core::{BoundarySource, BoundingBox};
use pbfcut_data::{DEFAULT_OSMCONVERT, OsmConvert, prepare_request};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_BBOX, ARG_CLIP, ARG_INPUT, ARG_LAYER, ARG_OSMCONVERT, ARG_OUTPUT, CliError,
    ENV_EXTRACT_INPUT, ENV_EXTRACT_OUTPUT, ENV_OSMCONVERT, require_existing_file,
};

/// CLI arguments for the `extract` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "extract",
    long_about = "Write the clip polygons as an osmconvert polygon filter \
                 next to OUTPUT and run osmconvert to cut the region out of \
                 INPUT. A bounding box is passed straight to osmconvert.",
    about = "Cut a region out of a PBF file"
)]
#[ortho_config(prefix = "PBFCUT")]
pub(crate) struct ExtractArgs {
    /// Source `.osm.pbf` file.
    #[arg(value_name = ARG_INPUT)]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
    /// Extract to write.
    #[arg(value_name = ARG_OUTPUT)]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Vector file whose polygons bound the extract.
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
    /// Path to the osmconvert executable.
    #[arg(long = ARG_OSMCONVERT, env = ENV_OSMCONVERT, value_name = "path")]
    #[serde(default)]
    pub(crate) osmconvert: Option<Utf8PathBuf>,
}

/// Resolved `extract` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExtractConfig {
    pub(crate) input: Utf8PathBuf,
    pub(crate) output: Utf8PathBuf,
    pub(crate) boundary: BoundarySource,
    pub(crate) osmconvert: Utf8PathBuf,
}

impl ExtractArgs {
    fn into_config(self) -> Result<ExtractConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ExtractConfig::try_from(merged)
    }
}

impl TryFrom<ExtractArgs> for ExtractConfig {
    type Error = CliError;

    fn try_from(args: ExtractArgs) -> Result<Self, Self::Error> {
        let input = args.input.ok_or(CliError::MissingArgument {
            field: ARG_INPUT,
            env: ENV_EXTRACT_INPUT,
        })?;
        let output = args.output.ok_or(CliError::MissingArgument {
            field: ARG_OUTPUT,
            env: ENV_EXTRACT_OUTPUT,
        })?;
        let bbox = args
            .bbox
            .as_deref()
            .map(str::parse::<BoundingBox>)
            .transpose()?;
        let boundary =
            BoundarySource::from_options(args.clip.as_deref(), args.layer.as_deref(), bbox)?;
        Ok(Self {
            input,
            output,
            boundary,
            osmconvert: args
                .osmconvert
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OSMCONVERT)),
        })
    }
}

impl ExtractConfig {
    fn validate_sources(&self) -> Result<(), CliError> {
        require_existing_file(&self.input, ARG_INPUT)?;
        if let BoundarySource::VectorFile { path, .. } = &self.boundary {
            require_existing_file(path, ARG_CLIP)?;
        }
        Ok(())
    }
}

pub(crate) fn run_extract(args: ExtractArgs) -> Result<ExitCode, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    let request = prepare_request(&config.input, &config.output, &config.boundary)?;
    OsmConvert::new(config.osmconvert).run(&request)?;
    Ok(ExitCode::SUCCESS)
}
