//! Split a theme's features into geometry-kind buckets.

use geo::Validation;
use log::debug;

use crate::{Feature, FeatureSet, GeometryKind};

/// What to do with features whose geometry fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidGeometryPolicy {
    /// Export every feature as found.
    #[default]
    Keep,
    /// Remove features with invalid geometry.
    Drop,
}

/// Features of one geometry kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    /// Kind shared by every feature in the bucket.
    pub kind: GeometryKind,
    /// Matching features in their original order.
    pub features: Vec<Feature>,
    /// How many matching features were removed as invalid.
    pub removed_invalid: usize,
}

impl Bucket {
    /// Whether nothing is left to export.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Select the features of `kind`, optionally dropping invalid geometries.
///
/// # Examples
/// ```
/// use geo::{Geometry, Point};
/// use pbfcut_core::{
///     ElementKind, Feature, FeatureSet, GeometryKind, InvalidGeometryPolicy, Tags, Theme,
///     classify,
/// };
///
/// let cafe = Feature::new(1, ElementKind::Node, Geometry::Point(Point::new(0.0, 0.0)), Tags::new())?;
/// let set = FeatureSet::new(Theme::Amenity, vec![cafe]);
/// let bucket = classify(&set, GeometryKind::Line, InvalidGeometryPolicy::Keep);
/// assert!(bucket.is_empty());
/// # Ok::<(), pbfcut_core::FeatureError>(())
/// ```
#[must_use]
pub fn classify(set: &FeatureSet, kind: GeometryKind, policy: InvalidGeometryPolicy) -> Bucket {
    let mut removed_invalid = 0;
    let features = set
        .features()
        .iter()
        .filter(|feature| feature.kind() == kind)
        .filter(|feature| match policy {
            InvalidGeometryPolicy::Keep => true,
            InvalidGeometryPolicy::Drop => {
                let valid = feature.geometry().is_valid();
                if !valid {
                    removed_invalid += 1;
                    debug!(
                        "dropping invalid {} {} from {} {kind} bucket",
                        feature.element().as_str(),
                        feature.id(),
                        set.theme()
                    );
                }
                valid
            }
        })
        .cloned()
        .collect();
    Bucket {
        kind,
        features,
        removed_invalid,
    }
}
