//! Theme extraction from OpenStreetMap PBF files.
//!
//! [`OsmThemeReader`] reads a PBF file in up to three passes:
//! 1. a parallel scan collecting nodes, ways and area relations carrying the
//!    theme key;
//! 2. a scan for relation member ways that were not themselves tagged; and
//! 3. a scan resolving the node coordinates referenced by those ways.
//!
//! Later passes only run when the earlier ones left references unresolved.
use std::collections::HashSet;

use camino::{Utf8Path, Utf8PathBuf};
use geo::{BoundingRect, Coord, Intersects, Rect};
use log::{debug, warn};
use osmpbf::{Element, ElementReader};
use pbfcut_core::{Feature, FeatureSet, SourceError, Theme, ThemeSource};
use thiserror::Error;

mod accumulator;
mod rings;
mod tags;

use accumulator::ThemeAccumulator;

/// Counts of theme-tagged OSM elements found during extraction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OsmThemeSummary {
    /// Number of theme-tagged nodes, including dense-node entries.
    pub nodes: u64,
    /// Number of theme-tagged ways.
    pub ways: u64,
    /// Number of theme-tagged multipolygon or boundary relations.
    pub relations: u64,
    /// Bounding box covering the theme-tagged nodes, if any were present.
    /// Coordinates are WGS84 with `x = longitude`, `y = latitude`.
    pub bounds: Option<Rect<f64>>,
}

impl OsmThemeSummary {
    fn combine(mut self, other: Self) -> Self {
        self.nodes += other.nodes;
        self.ways += other.ways;
        self.relations += other.relations;
        if let Some(bounds) = other.bounds {
            self.include_bounds(bounds);
        }
        self
    }

    fn include_bounds(&mut self, bounds: Rect<f64>) {
        match &mut self.bounds {
            Some(existing) => {
                let min = Coord {
                    x: existing.min().x.min(bounds.min().x),
                    y: existing.min().y.min(bounds.min().y),
                };
                let max = Coord {
                    x: existing.max().x.max(bounds.max().x),
                    y: existing.max().y.max(bounds.max().y),
                };
                *existing = Rect::new(min, max);
            }
            None => self.bounds = Some(bounds),
        }
    }

    fn record_node(&mut self, location: Coord<f64>) {
        self.nodes += 1;
        self.include_bounds(Rect::new(location, location));
    }

    fn record_way(&mut self) {
        self.ways += 1;
    }

    fn record_relation(&mut self) {
        self.relations += 1;
    }
}

/// Features of one theme together with the element counts behind them.
#[derive(Debug, Clone, PartialEq)]
pub struct OsmThemeReport {
    /// Element counts and bounding box information.
    pub summary: OsmThemeSummary,
    /// Features sorted by element kind, then id.
    pub features: Vec<Feature>,
}

/// Errors returned when reading an OSM PBF file.
#[derive(Debug, Error)]
pub enum OsmReadError {
    /// The file could not be opened.
    #[error("failed to open OSM PBF file at {path:?}")]
    Open {
        /// Error reported by the PBF decoder.
        #[source]
        source: osmpbf::Error,
        /// File being opened.
        path: Utf8PathBuf,
    },
    /// A blob could not be decoded.
    #[error("failed to decode OSM PBF data at {path:?}")]
    Decode {
        /// Error reported by the PBF decoder.
        #[source]
        source: osmpbf::Error,
        /// File being decoded.
        path: Utf8PathBuf,
    },
}

/// Reads the features of one theme from a PBF file.
///
/// # Examples
/// ```no_run
/// use pbfcut_core::Theme;
/// use pbfcut_data::OsmThemeReader;
///
/// # fn main() -> Result<(), pbfcut_data::OsmReadError> {
/// let reader = OsmThemeReader::new("lagos.osm.pbf");
/// let report = reader.read_theme(Theme::Highway)?;
/// println!("{} highway features", report.features.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OsmThemeReader {
    path: Utf8PathBuf,
    spatial_filter: Option<Rect<f64>>,
}

impl OsmThemeReader {
    /// Read from the PBF file at `path`.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            spatial_filter: None,
        }
    }

    /// Drop features whose bounding rectangle misses `rect`.
    #[must_use]
    pub const fn with_spatial_filter(mut self, rect: Rect<f64>) -> Self {
        self.spatial_filter = Some(rect);
        self
    }

    /// The PBF file being read.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Extract every feature carrying the theme key.
    ///
    /// # Errors
    /// Returns [`OsmReadError`] when the file cannot be opened or decoded.
    pub fn read_theme(&self, theme: Theme) -> Result<OsmThemeReport, OsmReadError> {
        let key = theme.as_str();
        let mut accumulator = self
            .open()?
            .par_map_reduce(
                |element| {
                    let mut accumulator = ThemeAccumulator::default();
                    accumulator.process_element(element, key);
                    accumulator
                },
                ThemeAccumulator::default,
                ThemeAccumulator::combine,
            )
            .map_err(|source| self.decode_error(source))?;

        if accumulator.has_relations() {
            self.collect_member_ways(&mut accumulator)?;
        }
        self.resolve_nodes(&mut accumulator)?;

        let summary = accumulator.summary().clone();
        let mut features = accumulator.into_features(theme);
        if let Some(filter) = self.spatial_filter {
            features.retain(|feature| {
                feature
                    .geometry()
                    .bounding_rect()
                    .is_some_and(|rect| rect.intersects(&filter))
            });
        }
        debug!(
            "{theme}: {} nodes, {} ways, {} relations, {} features",
            summary.nodes,
            summary.ways,
            summary.relations,
            features.len()
        );
        Ok(OsmThemeReport { summary, features })
    }

    fn collect_member_ways(&self, accumulator: &mut ThemeAccumulator) -> Result<(), OsmReadError> {
        let wanted = accumulator.missing_member_ways();
        if wanted.is_empty() {
            return Ok(());
        }
        let mut found = Vec::new();
        self.open()?
            .for_each(|element| {
                if let Element::Way(way) = element
                    && wanted.contains(&way.id())
                {
                    found.push((way.id(), way.refs().collect::<Vec<_>>()));
                }
            })
            .map_err(|source| self.decode_error(source))?;
        for (id, refs) in found {
            accumulator.record_member_way(id, refs);
        }
        Ok(())
    }

    fn resolve_nodes(&self, accumulator: &mut ThemeAccumulator) -> Result<(), OsmReadError> {
        let pending: HashSet<i64> = accumulator.pending_nodes();
        if pending.is_empty() {
            return Ok(());
        }
        self.open()?
            .for_each(|element| match element {
                Element::Node(node) if pending.contains(&node.id()) => {
                    accumulator.resolve_node(node.id(), node.lon(), node.lat());
                }
                Element::DenseNode(node) if pending.contains(&node.id()) => {
                    accumulator.resolve_node(node.id(), node.lon(), node.lat());
                }
                _ => {}
            })
            .map_err(|source| self.decode_error(source))?;
        let unresolved = accumulator.pending_nodes().len();
        if unresolved > 0 {
            warn!("Skipped {unresolved} node references without usable coordinates");
        }
        Ok(())
    }

    fn open(&self) -> Result<ElementReader<std::io::BufReader<std::fs::File>>, OsmReadError> {
        ElementReader::from_path(&self.path).map_err(|source| OsmReadError::Open {
            source,
            path: self.path.clone(),
        })
    }

    fn decode_error(&self, source: osmpbf::Error) -> OsmReadError {
        OsmReadError::Decode {
            source,
            path: self.path.clone(),
        }
    }
}

impl ThemeSource for OsmThemeReader {
    fn load_theme(&self, theme: Theme) -> Result<Option<FeatureSet>, SourceError> {
        let report = self
            .read_theme(theme)
            .map_err(|err| SourceError::new(theme, err))?;
        if report.features.is_empty() {
            return Ok(None);
        }
        Ok(Some(FeatureSet::new(theme, report.features)))
    }
}
