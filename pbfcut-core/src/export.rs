//! Output formats and the exporter seam used by theme workers.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Feature, GeometryKind, Theme};

/// Container written for each theme and geometry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// ESRI Shapefile with `.shx`, `.dbf` and `.prj` sidecars.
    #[default]
    Shapefile,
    /// A GeoJSON `FeatureCollection`.
    GeoJson,
    /// A single-layer GeoPackage.
    GeoPackage,
}

/// Error returned when parsing an unknown output format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown output format '{name}' (expected shp, geojson or gpkg)")]
pub struct UnknownFormat {
    /// The rejected input.
    pub name: String,
}

impl OutputFormat {
    /// File extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Shapefile => "shp",
            Self::GeoJson => "geojson",
            Self::GeoPackage => "gpkg",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "shp" | "shapefile" => Ok(Self::Shapefile),
            "geojson" => Ok(Self::GeoJson),
            "gpkg" | "geopackage" => Ok(Self::GeoPackage),
            _ => Err(UnknownFormat { name: s.to_owned() }),
        }
    }
}

/// Output file stem: `{prefix}_{theme}_{kind}`.
///
/// # Examples
/// ```
/// use pbfcut_core::{GeometryKind, Theme, output_stem};
///
/// assert_eq!(output_stem("lagos", Theme::Highway, GeometryKind::Line), "lagos_highway_line");
/// ```
#[must_use]
pub fn output_stem(prefix: &str, theme: Theme, kind: GeometryKind) -> String {
    format!("{prefix}_{theme}_{kind}")
}

/// Layer name inside a GeoPackage: `{theme}_{kind}`.
#[must_use]
pub fn layer_name(theme: Theme, kind: GeometryKind) -> String {
    format!("{theme}_{kind}")
}

/// What an exporter wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    /// Main output file.
    pub path: Utf8PathBuf,
    /// Number of records written.
    pub features: usize,
}

/// Errors raised by a [`FeatureExporter`].
#[derive(Debug, Error)]
#[error("failed to write {path:?}: {message}")]
pub struct ExportError {
    /// File being written.
    pub path: Utf8PathBuf,
    /// Short description of the failed step.
    pub message: String,
    /// Underlying error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ExportError {
    /// Wrap an underlying error with the step that failed.
    pub fn new<E>(path: impl Into<Utf8PathBuf>, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// An error with no underlying cause.
    pub fn message(path: impl Into<Utf8PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }
}

/// Writes one bucket of features.
///
/// Implementations create or overwrite their target; buckets are never
/// empty when a theme worker calls this.
pub trait FeatureExporter {
    /// Persist `features` for `theme` and `kind`.
    ///
    /// # Errors
    /// Returns [`ExportError`] when the target cannot be written.
    fn export(
        &self,
        theme: Theme,
        kind: GeometryKind,
        features: &[Feature],
    ) -> Result<ExportSummary, ExportError>;
}
