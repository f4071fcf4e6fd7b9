//! GeoJSON output.

use std::io::{BufWriter, Write};

use camino::Utf8Path;
use geojson::{FeatureCollection, JsonObject, JsonValue};
use pbfcut_core::{ExportError, Feature};

use super::columns::{OSM_ID, OSM_TYPE};

/// Write `features` to `path` as one `FeatureCollection`.
pub(super) fn write(path: &Utf8Path, features: &[Feature]) -> Result<usize, ExportError> {
    let collection = FeatureCollection {
        bbox: None,
        features: features.iter().map(to_geojson).collect(),
        foreign_members: None,
    };
    let file = pbfcut_fs::create_file(path)
        .map_err(|source| ExportError::new(path, "create file", source))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &collection)
        .map_err(|source| ExportError::new(path, "serialise features", source))?;
    writer
        .flush()
        .map_err(|source| ExportError::new(path, "flush file", source))?;
    Ok(collection.features.len())
}

fn to_geojson(feature: &Feature) -> geojson::Feature {
    let mut properties = JsonObject::new();
    properties.insert(OSM_ID.to_owned(), JsonValue::from(feature.id()));
    properties.insert(
        OSM_TYPE.to_owned(),
        JsonValue::from(feature.element().as_str()),
    );
    for (key, value) in feature.tags() {
        properties.insert(key.clone(), JsonValue::from(value.as_str()));
    }
    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(feature.geometry()))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}
