//! Internal accumulator for theme extraction from OpenStreetMap (OSM) PBF
//! files.
//!
//! The first pass collects theme-tagged nodes, ways and area relations. The
//! later passes fill in relation member ways and the node coordinates those
//! elements reference, after which [`ThemeAccumulator::into_features`] builds
//! the geometries.
use std::collections::{HashMap, HashSet};

use geo::{Coord, Geometry, LineString, Point, Polygon};
use log::warn;
use osmpbf::{Element, RelMemberType};
use pbfcut_core::{ElementKind, Feature, Tags, Theme};

use super::OsmThemeSummary;
use super::rings::{RingRole, assemble_area};
use super::tags::{area_override, collect_tags, has_theme_key, is_area_relation};

#[derive(Debug, Default)]
pub(super) struct ThemeAccumulator {
    summary: OsmThemeSummary,
    coords: HashMap<i64, Coord<f64>>,
    nodes: Vec<NodeCandidate>,
    ways: Vec<WayCandidate>,
    relations: Vec<RelationCandidate>,
    member_ways: HashMap<i64, Vec<i64>>,
}

#[derive(Debug)]
struct NodeCandidate {
    id: i64,
    location: Coord<f64>,
    tags: Tags,
}

#[derive(Debug)]
struct WayCandidate {
    id: i64,
    refs: Vec<i64>,
    tags: Tags,
}

#[derive(Debug)]
struct RelationCandidate {
    id: i64,
    members: Vec<(i64, RingRole)>,
    tags: Tags,
}

impl ThemeAccumulator {
    pub(super) fn process_element(&mut self, element: Element<'_>, key: &str) {
        match element {
            Element::Node(node) => {
                self.process_node(node.id(), node.lon(), node.lat(), node.tags(), node.tags(), key);
            }
            Element::DenseNode(node) => {
                self.process_node(node.id(), node.lon(), node.lat(), node.tags(), node.tags(), key);
            }
            Element::Way(way) => {
                if !has_theme_key(way.tags(), key) {
                    return;
                }
                self.summary.record_way();
                self.ways.push(WayCandidate {
                    id: way.id(),
                    refs: way.refs().collect(),
                    tags: collect_tags(way.tags()),
                });
            }
            Element::Relation(relation) => {
                if !has_theme_key(relation.tags(), key) || !is_area_relation(relation.tags()) {
                    return;
                }
                self.summary.record_relation();
                let members = relation
                    .members()
                    .filter(|member| matches!(member.member_type, RelMemberType::Way))
                    .map(|member| {
                        let role = match member.role() {
                            Ok("inner") => RingRole::Inner,
                            _ => RingRole::Outer,
                        };
                        (member.member_id, role)
                    })
                    .collect();
                self.relations.push(RelationCandidate {
                    id: relation.id(),
                    members,
                    tags: collect_tags(relation.tags()),
                });
            }
        }
    }

    fn process_node<'a, R, T>(
        &mut self,
        id: i64,
        lon: f64,
        lat: f64,
        membership_tags: R,
        tags: T,
        key: &str,
    ) where
        R: IntoIterator<Item = (&'a str, &'a str)>,
        T: IntoIterator<Item = (&'a str, &'a str)>,
    {
        if !has_theme_key(membership_tags, key) {
            return;
        }
        let Some(location) = validated_coord(lon, lat) else {
            warn!("Skipped node {id}: coordinate ({lon}, {lat}) is out of range");
            return;
        };
        self.summary.record_node(location);
        self.coords.insert(id, location);
        self.nodes.push(NodeCandidate {
            id,
            location,
            tags: collect_tags(tags),
        });
    }

    pub(super) fn combine(mut self, other: Self) -> Self {
        self.summary = self.summary.combine(other.summary);
        self.coords.extend(other.coords);
        self.nodes.extend(other.nodes);
        self.ways.extend(other.ways);
        self.relations.extend(other.relations);
        self.member_ways.extend(other.member_ways);
        self
    }

    pub(super) fn has_relations(&self) -> bool {
        !self.relations.is_empty()
    }

    /// Relation member ways whose node refs are not known yet.
    pub(super) fn missing_member_ways(&self) -> HashSet<i64> {
        let known: HashSet<i64> = self.ways.iter().map(|way| way.id).collect();
        self.relations
            .iter()
            .flat_map(|relation| relation.members.iter().map(|(id, _)| *id))
            .filter(|id| !known.contains(id) && !self.member_ways.contains_key(id))
            .collect()
    }

    pub(super) fn record_member_way(&mut self, id: i64, refs: Vec<i64>) {
        self.member_ways.insert(id, refs);
    }

    /// Node refs that still lack coordinates.
    pub(super) fn pending_nodes(&self) -> HashSet<i64> {
        self.ways
            .iter()
            .flat_map(|way| way.refs.iter())
            .chain(self.member_ways.values().flatten())
            .filter(|id| !self.coords.contains_key(id))
            .copied()
            .collect()
    }

    pub(super) fn resolve_node(&mut self, id: i64, lon: f64, lat: f64) {
        if let Some(location) = validated_coord(lon, lat) {
            self.coords.insert(id, location);
        }
    }

    pub(super) fn summary(&self) -> &OsmThemeSummary {
        &self.summary
    }

    /// Build geometries for every candidate, skipping those that cannot be
    /// resolved.
    pub(super) fn into_features(self, theme: Theme) -> Vec<Feature> {
        let mut features = Vec::with_capacity(self.nodes.len() + self.ways.len());
        for node in self.nodes {
            push_feature(
                &mut features,
                node.id,
                ElementKind::Node,
                Some(Geometry::Point(Point(node.location))),
                node.tags,
            );
        }

        let mut way_refs: HashMap<i64, &[i64]> = self
            .member_ways
            .iter()
            .map(|(id, refs)| (*id, refs.as_slice()))
            .collect();
        for way in &self.ways {
            way_refs.insert(way.id, way.refs.as_slice());
        }
        let resolve = |refs: &[i64]| -> Option<Vec<Coord<f64>>> {
            refs.iter().map(|id| self.coords.get(id).copied()).collect()
        };

        for way in &self.ways {
            let geometry = way_geometry(theme, way, &resolve);
            if geometry.is_none() {
                warn!("Skipped way {}: unresolved or degenerate node references", way.id);
            }
            push_feature(&mut features, way.id, ElementKind::Way, geometry, way.tags.clone());
        }

        for relation in &self.relations {
            let mut parts = Vec::new();
            for (member, role) in &relation.members {
                match way_refs.get(member).copied().and_then(|refs| resolve(refs)) {
                    Some(coords) => parts.push((coords, *role)),
                    None => warn!(
                        "Relation {} is missing member way {member}; assembling without it",
                        relation.id
                    ),
                }
            }
            let geometry = assemble_area(relation.id, parts).map(Geometry::MultiPolygon);
            push_feature(
                &mut features,
                relation.id,
                ElementKind::Relation,
                geometry,
                relation.tags.clone(),
            );
        }

        features.sort_by_key(|feature| (feature.element(), feature.id()));
        features
    }
}

fn way_geometry<F>(theme: Theme, way: &WayCandidate, resolve: &F) -> Option<Geometry<f64>>
where
    F: Fn(&[i64]) -> Option<Vec<Coord<f64>>>,
{
    let coords = resolve(&way.refs)?;
    let closed = way.refs.len() >= 4 && way.refs.first() == way.refs.last();
    let area_like = area_override(&way.tags).unwrap_or(!theme.is_linear());
    if closed && area_like {
        return Some(Geometry::Polygon(Polygon::new(LineString::from(coords), Vec::new())));
    }
    (coords.len() >= 2).then(|| Geometry::LineString(LineString::from(coords)))
}

fn push_feature(
    features: &mut Vec<Feature>,
    id: i64,
    element: ElementKind,
    geometry: Option<Geometry<f64>>,
    tags: Tags,
) {
    let Some(geometry) = geometry else {
        return;
    };
    match Feature::new(id, element, geometry, tags) {
        Ok(feature) => features.push(feature),
        Err(err) => warn!("Skipped {}: {err}", element.as_str()),
    }
}

pub(super) fn validated_coord(lon: f64, lat: f64) -> Option<Coord<f64>> {
    (lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat))
    .then_some(Coord { x: lon, y: lat })
}
