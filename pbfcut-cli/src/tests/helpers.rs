//! Test helpers for composing export datasets and layered overrides.

use super::*;
use crate::export::{ExportArgs, build_config};
use camino::Utf8PathBuf;
use pbfcut_pipeline::ExportConfig;
use std::fs;
use tempfile::TempDir;

#[derive(Debug, Clone, Default)]
pub(super) struct LayerOverrides {
    pub(super) theme: Option<String>,
    pub(super) workers: Option<usize>,
    pub(super) ext: Option<String>,
}

#[derive(Debug)]
pub(super) struct DatasetFiles {
    _dir: TempDir,
    input: Utf8PathBuf,
    output: Utf8PathBuf,
    clip: Utf8PathBuf,
}

impl DatasetFiles {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        let input = root.join("region.osm.pbf");
        let output = root.join("out");
        let clip = root.join("city.geojson");
        fs::write(&input, b"pbf contents").expect("write input placeholder");
        fs::write(&clip, b"{}").expect("write clip placeholder");
        fs::create_dir(&output).expect("create output dir");
        Self {
            _dir: dir,
            input,
            output,
            clip,
        }
    }

    pub(super) fn input(&self) -> &Utf8PathBuf {
        &self.input
    }

    pub(super) fn output(&self) -> &Utf8PathBuf {
        &self.output
    }

    pub(super) fn clip(&self) -> &Utf8PathBuf {
        &self.clip
    }

    /// Arguments naming the three required positionals.
    pub(super) fn args(&self) -> ExportArgs {
        ExportArgs {
            input: Some(self.input.clone()),
            output: Some(self.output.clone()),
            prefix: Some("region".to_owned()),
            ..ExportArgs::default()
        }
    }
}

pub(super) fn merge_layers(
    mut cli_args: ExportArgs,
    file_layer: Option<LayerOverrides>,
    env_layer: Option<LayerOverrides>,
) -> Result<ExportConfig, CliError> {
    merge_field(
        &mut cli_args.theme,
        extract_field(env_layer.as_ref(), |layer| &layer.theme),
        extract_field(file_layer.as_ref(), |layer| &layer.theme),
    );
    merge_field(
        &mut cli_args.workers,
        extract_field(env_layer.as_ref(), |layer| &layer.workers),
        extract_field(file_layer.as_ref(), |layer| &layer.workers),
    );
    merge_field(
        &mut cli_args.ext,
        extract_field(env_layer.as_ref(), |layer| &layer.ext),
        extract_field(file_layer.as_ref(), |layer| &layer.ext),
    );
    build_config(cli_args)
}

fn merge_field<T: Clone>(target: &mut Option<T>, env_value: Option<T>, file_value: Option<T>) {
    if target.is_none()
        && let Some(value) = env_value.or(file_value)
    {
        *target = Some(value);
    }
}

fn extract_field<T: Clone>(
    layer: Option<&LayerOverrides>,
    accessor: fn(&LayerOverrides) -> &Option<T>,
) -> Option<T> {
    layer.and_then(|entry| accessor(entry).clone())
}
