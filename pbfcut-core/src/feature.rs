//! Feature records and the geometry-kind buckets they are sorted into.

use std::collections::BTreeMap;

use geo::Geometry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Theme;

/// OpenStreetMap-style tags, ordered by key so exported columns are stable.
pub type Tags = BTreeMap<String, String>;

/// The OpenStreetMap element a feature was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// A single node.
    Node,
    /// A way (open line or closed ring).
    Way,
    /// A multipolygon or boundary relation.
    Relation,
}

impl ElementKind {
    /// Lowercase OSM element name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

/// Geometry family of a feature. Each family includes its multi variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    /// `Point` and `MultiPoint`.
    Point,
    /// `Line`, `LineString` and `MultiLineString`.
    Line,
    /// `Polygon`, `MultiPolygon`, `Rect` and `Triangle`.
    Polygon,
}

/// Error returned when parsing an unknown geometry kind name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown feature type '{name}' (expected point, line or polygon)")]
pub struct UnknownGeometryKind {
    /// The rejected input.
    pub name: String,
}

impl GeometryKind {
    /// All kinds in export order.
    pub const ALL: [Self; 3] = [Self::Point, Self::Line, Self::Polygon];

    /// Derive the kind of a geometry, or `None` for collections.
    ///
    /// # Examples
    /// ```
    /// use geo::{Geometry, line_string};
    /// use pbfcut_core::GeometryKind;
    ///
    /// let line = Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]);
    /// assert_eq!(GeometryKind::of(&line), Some(GeometryKind::Line));
    /// ```
    #[must_use]
    pub const fn of(geometry: &Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Point(_) | Geometry::MultiPoint(_) => Some(Self::Point),
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
                Some(Self::Line)
            }
            Geometry::Polygon(_)
            | Geometry::MultiPolygon(_)
            | Geometry::Rect(_)
            | Geometry::Triangle(_) => Some(Self::Polygon),
            Geometry::GeometryCollection(_) => None,
        }
    }

    /// Lowercase label used in output names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Line => "line",
            Self::Polygon => "polygon",
        }
    }

    /// Parse a comma separated kind list, keeping order and dropping repeats.
    ///
    /// # Errors
    /// Returns [`UnknownGeometryKind`] for the first unrecognised entry.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, UnknownGeometryKind> {
        let mut kinds = Vec::new();
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let kind: Self = entry.parse()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }
}

impl std::fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GeometryKind {
    type Err = UnknownGeometryKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "point" => Ok(Self::Point),
            "line" => Ok(Self::Line),
            "polygon" => Ok(Self::Polygon),
            _ => Err(UnknownGeometryKind { name: s.to_owned() }),
        }
    }
}

/// Errors returned by [`Feature::new`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    /// The geometry has no point, line or polygon kind.
    #[error("{element} {id} has a geometry collection, which cannot be exported")]
    UnsupportedGeometry {
        /// OSM identifier of the rejected feature.
        id: i64,
        /// Element the feature came from.
        element: &'static str,
    },
}

/// A single exported record: geometry, tags and the derived kind.
///
/// The kind is derived from the geometry at construction and whenever the
/// geometry is replaced, so the two cannot disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    id: i64,
    element: ElementKind,
    tags: Tags,
    geometry: Geometry<f64>,
    kind: GeometryKind,
}

impl Feature {
    /// Validates and constructs a [`Feature`].
    ///
    /// # Errors
    /// Returns [`FeatureError::UnsupportedGeometry`] for geometry collections.
    ///
    /// # Examples
    /// ```
    /// use geo::{Geometry, Point};
    /// use pbfcut_core::{ElementKind, Feature, GeometryKind, Tags};
    ///
    /// let feature = Feature::new(7, ElementKind::Node, Geometry::Point(Point::new(1.0, 2.0)), Tags::new())?;
    /// assert_eq!(feature.kind(), GeometryKind::Point);
    /// # Ok::<(), pbfcut_core::FeatureError>(())
    /// ```
    pub fn new(
        id: i64,
        element: ElementKind,
        geometry: Geometry<f64>,
        tags: Tags,
    ) -> Result<Self, FeatureError> {
        let kind = GeometryKind::of(&geometry).ok_or(FeatureError::UnsupportedGeometry {
            id,
            element: element.as_str(),
        })?;
        Ok(Self {
            id,
            element,
            tags,
            geometry,
            kind,
        })
    }

    /// Copy of this feature carrying a different geometry.
    ///
    /// # Errors
    /// Returns [`FeatureError::UnsupportedGeometry`] for geometry collections.
    pub fn with_geometry(&self, geometry: Geometry<f64>) -> Result<Self, FeatureError> {
        Self::new(self.id, self.element, geometry, self.tags.clone())
    }

    /// OSM identifier.
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.id
    }

    /// Element the feature was built from.
    #[must_use]
    pub const fn element(&self) -> ElementKind {
        self.element
    }

    /// Tags carried over from the source element.
    #[must_use]
    pub const fn tags(&self) -> &Tags {
        &self.tags
    }

    /// The feature geometry in WGS84 (`x = longitude`, `y = latitude`).
    #[must_use]
    pub const fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    /// Geometry family derived from [`Self::geometry`].
    #[must_use]
    pub const fn kind(&self) -> GeometryKind {
        self.kind
    }
}

/// Every feature loaded for one theme.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    theme: Theme,
    features: Vec<Feature>,
}

impl FeatureSet {
    /// Group features under a theme.
    #[must_use]
    pub const fn new(theme: Theme, features: Vec<Feature>) -> Self {
        Self { theme, features }
    }

    /// Theme the features were selected for.
    #[must_use]
    pub const fn theme(&self) -> Theme {
        self.theme
    }

    /// Features in load order.
    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the set holds no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
