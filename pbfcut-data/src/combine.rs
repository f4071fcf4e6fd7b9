//! Merge single-layer GeoPackages into one multi-layer file.

use camino::{Utf8Path, Utf8PathBuf};
use log::{info, warn};
use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;

use crate::geopackage::{feature_layers, initialise, quote_identifier};

const SOURCE_SCHEMA: &str = "source";

/// Errors raised while combining GeoPackages.
#[derive(Debug, Error)]
pub enum CombineError {
    /// The output already exists.
    #[error("refusing to overwrite existing output {path:?}")]
    OutputExists {
        /// The existing file.
        path: Utf8PathBuf,
    },
    /// The input directory could not be listed.
    #[error("failed to list GeoPackages in {path:?}")]
    ListInputs {
        /// Directory being listed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A database statement failed.
    #[error("failed to {step} for {path:?}")]
    Sqlite {
        /// File being processed.
        path: Utf8PathBuf,
        /// Step that failed.
        step: &'static str,
        /// Error reported by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
}

/// What a combine run copied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CombineReport {
    /// Layers written, in copy order.
    pub layers: Vec<String>,
    /// Inputs skipped because they did not hold exactly one layer.
    pub skipped: Vec<Utf8PathBuf>,
}

/// Copy the single feature layer of every `*.gpkg` in `input_dir` whose
/// name contains `prefix` into a new GeoPackage at `output`.
///
/// # Errors
/// Returns [`CombineError`] when `output` exists, the directory cannot be
/// listed, or a copy fails.
pub fn combine_geopackages(
    input_dir: &Utf8Path,
    output: &Utf8Path,
    prefix: &str,
) -> Result<CombineReport, CombineError> {
    if pbfcut_fs::path_exists(output).unwrap_or(true) {
        return Err(CombineError::OutputExists {
            path: output.to_path_buf(),
        });
    }
    let inputs: Vec<Utf8PathBuf> = pbfcut_fs::list_files_with_extension(input_dir, "gpkg")
        .map_err(|source| CombineError::ListInputs {
            path: input_dir.to_path_buf(),
            source,
        })?
        .into_iter()
        .filter(|path| path.file_name().is_some_and(|name| name.contains(prefix)))
        .filter(|path| path != output)
        .collect();
    let mut report = CombineReport::default();
    if inputs.is_empty() {
        warn!("no GeoPackages matching '{prefix}' in {input_dir}");
        return Ok(report);
    }

    let sqlite = |path: &Utf8Path, step: &'static str| {
        let path = path.to_path_buf();
        move |source: rusqlite::Error| CombineError::Sqlite { path, step, source }
    };
    let connection =
        Connection::open(output.as_std_path()).map_err(sqlite(output, "create output"))?;
    initialise(&connection).map_err(sqlite(output, "create metadata tables"))?;

    for input in inputs {
        connection
            .execute("ATTACH DATABASE ?1 AS source", [input.as_str()])
            .map_err(sqlite(&input, "attach input"))?;
        let copied = copy_single_layer(&connection, &input);
        connection
            .execute_batch("DETACH DATABASE source")
            .map_err(sqlite(&input, "detach input"))?;
        match copied? {
            Some(layer) => {
                info!("copied layer {layer} from {input}");
                report.layers.push(layer);
            }
            None => report.skipped.push(input),
        }
    }
    Ok(report)
}

fn copy_single_layer(connection: &Connection, input: &Utf8Path) -> Result<Option<String>, CombineError> {
    let sqlite = |step: &'static str| {
        let path = input.to_path_buf();
        move |source: rusqlite::Error| CombineError::Sqlite { path, step, source }
    };
    let layers = feature_layers(connection, SOURCE_SCHEMA).map_err(sqlite("list layers"))?;
    let [layer] = layers.as_slice() else {
        warn!("skipping {input}: expected one layer, found {}", layers.len());
        return Ok(None);
    };
    let definition: String = connection
        .query_row(
            "SELECT sql FROM source.sqlite_master WHERE type = 'table' AND name = ?1",
            [layer],
            |row| row.get(0),
        )
        .map_err(sqlite("read layer schema"))?;

    let quoted = quote_identifier(layer);
    let exists: Option<String> = connection
        .query_row(
            "SELECT name FROM main.sqlite_master WHERE type = 'table' AND name = ?1",
            [layer],
            |row| row.get(0),
        )
        .optional()
        .map_err(sqlite("look up existing layer"))?;
    if exists.is_some() {
        warn!("replacing layer {layer} with the copy from {input}");
        connection
            .execute(&format!("DROP TABLE main.{quoted}"), [])
            .map_err(sqlite("drop existing layer"))?;
        connection
            .execute(
                "DELETE FROM main.gpkg_geometry_columns WHERE table_name = ?1",
                [layer],
            )
            .map_err(sqlite("drop existing layer"))?;
    }

    connection
        .execute_batch(&definition)
        .map_err(sqlite("create layer"))?;
    connection
        .execute(
            &format!("INSERT INTO main.{quoted} SELECT * FROM source.{quoted}"),
            [],
        )
        .map_err(sqlite("copy rows"))?;
    connection
        .execute_batch(
            "INSERT OR IGNORE INTO main.gpkg_spatial_ref_sys SELECT * FROM source.gpkg_spatial_ref_sys",
        )
        .map_err(sqlite("copy spatial reference systems"))?;
    connection
        .execute(
            "INSERT OR REPLACE INTO main.gpkg_contents SELECT * FROM source.gpkg_contents WHERE table_name = ?1",
            [layer],
        )
        .map_err(sqlite("copy contents entry"))?;
    connection
        .execute(
            "INSERT OR REPLACE INTO main.gpkg_geometry_columns SELECT * FROM source.gpkg_geometry_columns WHERE table_name = ?1",
            [layer],
        )
        .map_err(sqlite("copy geometry column"))?;
    Ok(Some(layer.clone()))
}
