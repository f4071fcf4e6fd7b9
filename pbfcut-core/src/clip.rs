//! Intersect feature buckets with a [`Boundary`].
//!
//! The boolean-operation engine is treated as fallible: a bucket it cannot
//! process comes back as [`ClipOutcome::ClipFailed`] with the untouched
//! features, so the caller can still export them.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use geo::{
    BooleanOps, BoundingRect, CoordsIter, Geometry, Intersects, LineString, MultiLineString,
    MultiPoint, MultiPolygon, Polygon, Rect,
};

use crate::{Boundary, Feature};

/// Result of clipping one bucket.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipOutcome {
    /// Features intersected with the boundary; those outside are gone.
    Clipped(Vec<Feature>),
    /// The bucket could not be clipped.
    ClipFailed {
        /// The features as they were before clipping.
        original: Vec<Feature>,
        /// Why clipping failed.
        reason: String,
    },
}

/// Clip every feature to `boundary`.
///
/// Points are kept when the boundary covers them, lines are cut at the
/// boundary edge, and polygons are replaced by their intersection with it.
/// Features that end up empty are dropped.
///
/// # Examples
/// ```
/// use geo::{Geometry, Point};
/// use pbfcut_core::{Boundary, BoundingBox, ClipOutcome, ElementKind, Feature, Tags, clip_features};
///
/// let boundary = Boundary::from_bbox(&"0,0,1,1".parse::<BoundingBox>()?);
/// let inside = Feature::new(1, ElementKind::Node, Geometry::Point(Point::new(0.5, 0.5)), Tags::new())?;
/// let outside = Feature::new(2, ElementKind::Node, Geometry::Point(Point::new(5.0, 5.0)), Tags::new())?;
/// let ClipOutcome::Clipped(kept) = clip_features(vec![inside, outside], &boundary) else {
///     panic!("points always clip");
/// };
/// assert_eq!(kept.len(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[must_use]
pub fn clip_features(features: Vec<Feature>, boundary: &Boundary) -> ClipOutcome {
    if let Some(feature) = features.iter().find(|f| !has_finite_coords(f.geometry())) {
        let reason = format!(
            "{} {} has non-finite coordinates",
            feature.element().as_str(),
            feature.id()
        );
        return ClipOutcome::ClipFailed {
            original: features,
            reason,
        };
    }
    let Some(envelope) = boundary.bounding_rect() else {
        return ClipOutcome::Clipped(Vec::new());
    };
    let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
        clip_all(&features, boundary.area(), envelope)
    }));
    match attempt {
        Ok(Ok(clipped)) => ClipOutcome::Clipped(clipped),
        Ok(Err(reason)) => ClipOutcome::ClipFailed {
            original: features,
            reason,
        },
        Err(payload) => ClipOutcome::ClipFailed {
            original: features,
            reason: format!("geometry engine panicked: {}", panic_message(payload.as_ref())),
        },
    }
}

fn clip_all(
    features: &[Feature],
    area: &MultiPolygon<f64>,
    envelope: Rect<f64>,
) -> Result<Vec<Feature>, String> {
    let mut clipped = Vec::with_capacity(features.len());
    for feature in features {
        let Some(rect) = feature.geometry().bounding_rect() else {
            continue;
        };
        if !rect.intersects(&envelope) {
            continue;
        }
        let Some(geometry) = clip_geometry(feature.geometry(), area) else {
            continue;
        };
        let replaced = feature
            .with_geometry(geometry)
            .map_err(|err| err.to_string())?;
        clipped.push(replaced);
    }
    Ok(clipped)
}

fn clip_geometry(geometry: &Geometry<f64>, area: &MultiPolygon<f64>) -> Option<Geometry<f64>> {
    match geometry {
        Geometry::Point(point) => area.intersects(point).then_some(Geometry::Point(*point)),
        Geometry::MultiPoint(points) => {
            let inside: Vec<_> = points.iter().filter(|p| area.intersects(*p)).copied().collect();
            (!inside.is_empty()).then(|| Geometry::MultiPoint(MultiPoint(inside)))
        }
        Geometry::Line(line) => {
            clip_lines(area, MultiLineString(vec![LineString::from(*line)]), true)
        }
        Geometry::LineString(line) => clip_lines(area, MultiLineString(vec![line.clone()]), true),
        Geometry::MultiLineString(lines) => clip_lines(area, lines.clone(), false),
        Geometry::Polygon(polygon) => clip_polygon(area, polygon, true),
        Geometry::MultiPolygon(polygons) => {
            let result = polygons.intersection(area);
            (!result.0.is_empty()).then_some(Geometry::MultiPolygon(result))
        }
        Geometry::Rect(rect) => clip_polygon(area, &rect.to_polygon(), true),
        Geometry::Triangle(triangle) => clip_polygon(area, &triangle.to_polygon(), true),
        Geometry::GeometryCollection(_) => None,
    }
}

fn clip_lines(
    area: &MultiPolygon<f64>,
    lines: MultiLineString<f64>,
    single: bool,
) -> Option<Geometry<f64>> {
    let mut result = area.clip(&lines, false);
    result.0.retain(|line| line.0.len() >= 2);
    match result.0.len() {
        0 => None,
        1 if single => result.0.pop().map(Geometry::LineString),
        _ => Some(Geometry::MultiLineString(result)),
    }
}

fn clip_polygon(
    area: &MultiPolygon<f64>,
    polygon: &Polygon<f64>,
    single: bool,
) -> Option<Geometry<f64>> {
    let mut result = polygon.intersection(area);
    match result.0.len() {
        0 => None,
        1 if single => result.0.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(result)),
    }
}

fn has_finite_coords(geometry: &Geometry<f64>) -> bool {
    geometry
        .coords_iter()
        .all(|coord| coord.x.is_finite() && coord.y.is_finite())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
