//! File writers for classified feature buckets.
//!
//! [`FileExporter`] names each output `{prefix}_{theme}_{kind}.{ext}` inside
//! its output directory and dispatches to the writer for its format.

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use pbfcut_core::{
    ExportError, ExportSummary, Feature, FeatureExporter, GeometryKind, OutputFormat, Theme,
    layer_name, output_stem,
};

mod columns;
mod gpkg;
mod json;
mod shp;

pub use columns::{OSM_ID, OSM_TYPE};
pub use gpkg::GEOMETRY_COLUMN;

/// Writes buckets as files in one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileExporter {
    output_dir: Utf8PathBuf,
    prefix: String,
    format: OutputFormat,
}

impl FileExporter {
    /// Write `format` files named after `prefix` into `output_dir`.
    pub fn new(
        output_dir: impl Into<Utf8PathBuf>,
        prefix: impl Into<String>,
        format: OutputFormat,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
            format,
        }
    }

    /// Directory receiving the outputs.
    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    /// Container format.
    pub const fn format(&self) -> OutputFormat {
        self.format
    }

    /// Path written for `theme` and `kind`.
    ///
    /// # Examples
    /// ```
    /// use pbfcut_core::{GeometryKind, OutputFormat, Theme};
    /// use pbfcut_data::FileExporter;
    ///
    /// let exporter = FileExporter::new("out", "lagos", OutputFormat::GeoPackage);
    /// assert_eq!(
    ///     exporter.path_for(Theme::Building, GeometryKind::Polygon),
    ///     "out/lagos_building_polygon.gpkg"
    /// );
    /// ```
    pub fn path_for(&self, theme: Theme, kind: GeometryKind) -> Utf8PathBuf {
        let stem = output_stem(&self.prefix, theme, kind);
        self.output_dir
            .join(format!("{stem}.{}", self.format.extension()))
    }
}

impl FeatureExporter for FileExporter {
    fn export(
        &self,
        theme: Theme,
        kind: GeometryKind,
        features: &[Feature],
    ) -> Result<ExportSummary, ExportError> {
        let path = self.path_for(theme, kind);
        let written = match self.format {
            OutputFormat::Shapefile => shp::write(&path, kind, features)?,
            OutputFormat::GeoJson => json::write(&path, features)?,
            OutputFormat::GeoPackage => gpkg::write(&path, &layer_name(theme, kind), features)?,
        };
        debug!("wrote {written} records to {path}");
        Ok(ExportSummary {
            path,
            features: written,
        })
    }
}
