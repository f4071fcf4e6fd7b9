//! Themes describing the OpenStreetMap top-level keys that can be exported.
//!
//! An element belongs to a theme when it carries a tag whose key equals the
//! theme name. The enum offers compile-time safety for the catalog.
//!
//! # Examples
//! ```
//! use pbfcut_core::Theme;
//!
//! assert_eq!(Theme::Highway.as_str(), "highway");
//! assert_eq!(Theme::PublicTransport.to_string(), "public_transport");
//! ```
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named category of OpenStreetMap features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    /// Cable cars, chair lifts and drag lifts.
    Aerialway,
    /// Airports, runways and helipads.
    Aeroway,
    /// Community facilities such as cafes, schools and toilets.
    Amenity,
    /// Administrative and protected-area boundaries.
    Boundary,
    /// Building footprints.
    Building,
    /// Workshops producing on-site goods.
    Craft,
    /// Emergency infrastructure such as defibrillators and hydrants.
    Emergency,
    /// Geological features.
    Geological,
    /// The road network.
    Highway,
    /// Historic sites and monuments.
    Historic,
    /// Land use areas.
    Landuse,
    /// Leisure facilities such as parks and pitches.
    Leisure,
    /// Natural features such as water and woodland.
    Natural,
    /// Offices.
    Office,
    /// Named places such as towns and neighbourhoods.
    Place,
    /// Power generation and transmission.
    Power,
    /// Public transport stops and platforms.
    PublicTransport,
    /// Railway lines and stations.
    Railway,
    /// Route relations and ferries.
    Route,
    /// Shops.
    Shop,
    /// Tourist attractions and accommodation.
    Tourism,
    /// Rivers, streams and canals.
    Waterway,
}

/// Error returned when parsing a name outside the theme catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown theme '{name}'")]
pub struct UnknownTheme {
    /// The rejected input.
    pub name: String,
}

impl Theme {
    /// Every theme in catalog order.
    pub const ALL: [Self; 22] = [
        Self::Aerialway,
        Self::Aeroway,
        Self::Amenity,
        Self::Boundary,
        Self::Building,
        Self::Craft,
        Self::Emergency,
        Self::Geological,
        Self::Highway,
        Self::Historic,
        Self::Landuse,
        Self::Leisure,
        Self::Natural,
        Self::Office,
        Self::Place,
        Self::Power,
        Self::PublicTransport,
        Self::Railway,
        Self::Route,
        Self::Shop,
        Self::Tourism,
        Self::Waterway,
    ];

    /// Return the theme as the lowercase OSM key.
    ///
    /// # Examples
    /// ```
    /// use pbfcut_core::Theme;
    ///
    /// assert_eq!(Theme::Landuse.as_str(), "landuse");
    /// ```
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aerialway => "aerialway",
            Self::Aeroway => "aeroway",
            Self::Amenity => "amenity",
            Self::Boundary => "boundary",
            Self::Building => "building",
            Self::Craft => "craft",
            Self::Emergency => "emergency",
            Self::Geological => "geological",
            Self::Highway => "highway",
            Self::Historic => "historic",
            Self::Landuse => "landuse",
            Self::Leisure => "leisure",
            Self::Natural => "natural",
            Self::Office => "office",
            Self::Place => "place",
            Self::Power => "power",
            Self::PublicTransport => "public_transport",
            Self::Railway => "railway",
            Self::Route => "route",
            Self::Shop => "shop",
            Self::Tourism => "tourism",
            Self::Waterway => "waterway",
        }
    }

    /// Whether closed ways of this theme usually describe lines rather than
    /// areas (a closed ring road is still a road).
    #[must_use]
    pub const fn is_linear(self) -> bool {
        matches!(
            self,
            Self::Aerialway
                | Self::Highway
                | Self::Power
                | Self::Railway
                | Self::Route
                | Self::Waterway
        )
    }

    /// Parse a comma separated theme list, keeping the input order and
    /// dropping repeats.
    ///
    /// # Errors
    /// Returns [`UnknownTheme`] for the first entry outside the catalog.
    ///
    /// # Examples
    /// ```
    /// use pbfcut_core::Theme;
    ///
    /// let themes = Theme::parse_list("highway, building,highway").unwrap();
    /// assert_eq!(themes, vec![Theme::Highway, Theme::Building]);
    /// ```
    pub fn parse_list(list: &str) -> Result<Vec<Self>, UnknownTheme> {
        let mut themes = Vec::new();
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let theme: Self = entry.parse()?;
            if !themes.contains(&theme) {
                themes.push(theme);
            }
        }
        Ok(themes)
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Theme {
    type Err = UnknownTheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|theme| theme.as_str() == wanted)
            .ok_or_else(|| UnknownTheme { name: s.to_owned() })
    }
}
