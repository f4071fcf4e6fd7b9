//! Tag utilities for theme extraction.
//!
//! Provides helpers to:
//! - detect whether an element carries the theme key;
//! - collect key/value tags into the feature tag map; and
//! - read the area hints that decide whether a closed way is a polygon.
use pbfcut_core::Tags;

pub(super) fn has_theme_key<'a, T>(tags: T, key: &str) -> bool
where
    T: IntoIterator<Item = (&'a str, &'a str)>,
{
    tags.into_iter().any(|(candidate, _)| candidate == key)
}

pub(super) fn collect_tags<'a, T>(tags: T) -> Tags
where
    T: IntoIterator<Item = (&'a str, &'a str)>,
{
    tags.into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

/// Explicit `area=yes|no` on a way, if present.
pub(super) fn area_override(tags: &Tags) -> Option<bool> {
    match tags.get("area").map(String::as_str) {
        Some("yes") => Some(true),
        Some("no") => Some(false),
        _ => None,
    }
}

/// Relations assembled into areas: `type=multipolygon` and `type=boundary`.
pub(super) fn is_area_relation<'a, T>(tags: T) -> bool
where
    T: IntoIterator<Item = (&'a str, &'a str)>,
{
    tags.into_iter()
        .any(|(key, value)| key == "type" && matches!(value, "multipolygon" | "boundary"))
}
