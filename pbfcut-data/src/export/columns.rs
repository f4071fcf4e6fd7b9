//! Attribute column naming shared by the tabular writers.

use std::collections::{BTreeSet, HashSet};

use pbfcut_core::Feature;

/// Identifier column written for every record.
pub const OSM_ID: &str = "osm_id";
/// Element kind column written for every record.
pub const OSM_TYPE: &str = "osm_type";

/// A tag key and the column it is stored in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub key: String,
    pub name: String,
}

/// Columns for every tag key in `features`, sorted by key.
///
/// Names are cut to `max_len` bytes when a limit is given and made unique
/// case-insensitively, also against `reserved`.
pub fn tag_columns(features: &[Feature], max_len: Option<usize>, reserved: &[&str]) -> Vec<Column> {
    let keys: BTreeSet<&str> = features
        .iter()
        .flat_map(|feature| feature.tags().keys().map(String::as_str))
        .collect();
    let mut taken: HashSet<String> = reserved.iter().map(|name| name.to_lowercase()).collect();
    keys.into_iter()
        .map(|key| {
            let name = unique_name(key, max_len, &mut taken);
            Column {
                key: key.to_owned(),
                name,
            }
        })
        .collect()
}

fn unique_name(key: &str, max_len: Option<usize>, taken: &mut HashSet<String>) -> String {
    let base = max_len.map_or(key, |limit| truncate_bytes(key, limit));
    if taken.insert(base.to_lowercase()) {
        return base.to_owned();
    }
    let mut suffix = 1_u32;
    loop {
        let tail = suffix.to_string();
        let head = max_len.map_or(base, |limit| {
            truncate_bytes(base, limit.saturating_sub(tail.len()))
        });
        let candidate = format!("{head}{tail}");
        if taken.insert(candidate.to_lowercase()) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Longest prefix of `value` that fits in `limit` bytes on a char boundary.
pub fn truncate_bytes(value: &str, limit: usize) -> &str {
    if value.len() <= limit {
        return value;
    }
    let mut end = limit;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value.get(..end).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, point};
    use pbfcut_core::{ElementKind, Tags};
    use rstest::rstest;

    fn tagged(pairs: &[(&str, &str)]) -> Feature {
        let tags: Tags = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Feature::new(1, ElementKind::Node, Geometry::Point(point!(x: 0.0, y: 0.0)), tags)
            .expect("feature")
    }

    #[test]
    fn long_keys_are_cut_and_made_unique() {
        let features = [tagged(&[
            ("addr:housenumber", "4"),
            ("addr:housename", "Rose Cottage"),
            ("name", "x"),
        ])];
        let names: Vec<_> = tag_columns(&features, Some(10), &[OSM_ID, OSM_TYPE])
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["addr:house", "addr:hous1", "name"]);
    }

    #[test]
    fn reserved_names_are_avoided_case_insensitively() {
        let features = [tagged(&[("OSM_ID", "clash")])];
        let columns = tag_columns(&features, None, &[OSM_ID]);
        assert_eq!(columns.first().map(|c| c.name.as_str()), Some("OSM_ID1"));
    }

    #[rstest]
    #[case("short", 10, "short")]
    #[case("abcdefghijk", 10, "abcdefghij")]
    #[case("caf\u{e9}", 4, "caf")]
    fn truncation_respects_char_boundaries(
        #[case] input: &str,
        #[case] limit: usize,
        #[case] expected: &str,
    ) {
        assert_eq!(truncate_bytes(input, limit), expected);
    }
}
