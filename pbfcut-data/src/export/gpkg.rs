//! Single-layer GeoPackage output.

use camino::Utf8Path;
use pbfcut_core::{ExportError, Feature};
use rusqlite::types::Value;
use rusqlite::{Connection, Transaction, params_from_iter};

use super::columns::{Column, OSM_ID, OSM_TYPE, tag_columns};
use crate::geopackage::{WGS84_SRS_ID, encode_geometry, extent, initialise, quote_identifier};

/// Geometry column name in every layer this crate writes.
pub const GEOMETRY_COLUMN: &str = "geom";
const FID_COLUMN: &str = "fid";

/// Replace `path` with a GeoPackage holding `features` in the layer `layer`.
pub(super) fn write(path: &Utf8Path, layer: &str, features: &[Feature]) -> Result<usize, ExportError> {
    pbfcut_fs::remove_file_if_exists(path)
        .map_err(|source| ExportError::new(path, "remove previous file", source))?;
    let mut connection = Connection::open(path.as_std_path())
        .map_err(|source| ExportError::new(path, "open database", source))?;
    initialise(&connection)
        .map_err(|source| ExportError::new(path, "create metadata tables", source))?;

    let columns = tag_columns(features, None, &[FID_COLUMN, GEOMETRY_COLUMN, OSM_ID, OSM_TYPE]);
    let transaction = connection
        .transaction()
        .map_err(|source| ExportError::new(path, "begin transaction", source))?;
    create_layer(&transaction, layer, &columns)
        .map_err(|source| ExportError::new(path, "create layer", source))?;
    register_layer(&transaction, layer, features)
        .map_err(|source| ExportError::new(path, "register layer", source))?;
    insert_rows(path, &transaction, layer, &columns, features)?;
    transaction
        .commit()
        .map_err(|source| ExportError::new(path, "commit", source))?;
    Ok(features.len())
}

fn create_layer(
    transaction: &Transaction<'_>,
    layer: &str,
    columns: &[Column],
) -> rusqlite::Result<()> {
    let mut definition = format!(
        "CREATE TABLE {} ({FID_COLUMN} INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, \
         {GEOMETRY_COLUMN} GEOMETRY, {OSM_ID} INTEGER, {OSM_TYPE} TEXT",
        quote_identifier(layer)
    );
    for column in columns {
        definition.push_str(", ");
        definition.push_str(&quote_identifier(&column.name));
        definition.push_str(" TEXT");
    }
    definition.push(')');
    transaction.execute(&definition, [])?;
    Ok(())
}

fn register_layer(
    transaction: &Transaction<'_>,
    layer: &str,
    features: &[Feature],
) -> rusqlite::Result<()> {
    let bounds = extent(features.iter().map(Feature::geometry));
    transaction.execute(
        "INSERT INTO gpkg_contents
            (table_name, data_type, identifier, description, min_x, min_y, max_x, max_y, srs_id)
         VALUES (?1, 'features', ?1, '', ?2, ?3, ?4, ?5, ?6)",
        (
            layer,
            bounds.map(|rect| rect.min().x),
            bounds.map(|rect| rect.min().y),
            bounds.map(|rect| rect.max().x),
            bounds.map(|rect| rect.max().y),
            WGS84_SRS_ID,
        ),
    )?;
    transaction.execute(
        "INSERT INTO gpkg_geometry_columns
            (table_name, column_name, geometry_type_name, srs_id, z, m)
         VALUES (?1, ?2, 'GEOMETRY', ?3, 0, 0)",
        (layer, GEOMETRY_COLUMN, WGS84_SRS_ID),
    )?;
    Ok(())
}

fn insert_rows(
    path: &Utf8Path,
    transaction: &Transaction<'_>,
    layer: &str,
    columns: &[Column],
    features: &[Feature],
) -> Result<(), ExportError> {
    let mut names = vec![
        GEOMETRY_COLUMN.to_owned(),
        OSM_ID.to_owned(),
        OSM_TYPE.to_owned(),
    ];
    names.extend(columns.iter().map(|column| quote_identifier(&column.name)));
    let placeholders = vec!["?"; names.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        quote_identifier(layer),
        names.join(", ")
    );
    let mut statement = transaction
        .prepare(&sql)
        .map_err(|source| ExportError::new(path, "prepare insert", source))?;
    for feature in features {
        let blob = encode_geometry(feature.geometry())
            .map_err(|source| ExportError::new(path, "encode geometry", source))?;
        let mut values = vec![
            Value::Blob(blob),
            Value::Integer(feature.id()),
            Value::Text(feature.element().as_str().to_owned()),
        ];
        values.extend(columns.iter().map(|column| {
            feature
                .tags()
                .get(&column.key)
                .map_or(Value::Null, |value| Value::Text(value.clone()))
        }));
        statement
            .execute(params_from_iter(values))
            .map_err(|source| {
                ExportError::new(
                    path,
                    format!("insert {} {}", feature.element().as_str(), feature.id()),
                    source,
                )
            })?;
    }
    Ok(())
}
