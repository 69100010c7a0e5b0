#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Location, schema, and filter types shared across the notion map toolchain.
//!
//! Two record shapes flow through the system. [`LocationData`] is the
//! transient output of a single page extraction; [`Location`] is the
//! persisted record read back from a Notion database and rendered on the
//! map. Both are driven by a [`DatabaseSchema`], the live description of
//! the user's database properties.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

// ── Extraction output ────────────────────────────────────────────────────

/// A value attached to a dynamic (schema-driven) key of [`LocationData`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DynamicValue {
    /// A single text value (select-like).
    Text(String),
    /// A list of text values (multi-select-like).
    List(Vec<String>),
}

/// The canonical record produced by one extraction call.
///
/// Coordinates are kept as the strings found on the page so that no
/// precision is lost before the form layer validates them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationData {
    /// Place name. Empty when no title strategy matched.
    pub title: String,
    /// Street address. Empty when no address strategy matched.
    pub address: String,
    /// Latitude in decimal degrees.
    pub latitude: String,
    /// Longitude in decimal degrees.
    pub longitude: String,
    /// Emoji to use as the page icon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    /// Free-form tags (site categories, cuisines, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// City, when it can be derived from the address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Site-specific values keyed by lower-cased property name.
    #[serde(flatten)]
    pub extra: BTreeMap<String, DynamicValue>,
}

// ── Select palette ───────────────────────────────────────────────────────

/// Semantic color key attached to a select option.
///
/// Unrecognized keys deserialize to [`SelectColor::Default`] so a new
/// upstream color can never break rendering.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case", from = "String")]
#[strum(serialize_all = "snake_case")]
pub enum SelectColor {
    #[default]
    Default,
    Gray,
    LightGray,
    Brown,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Pink,
    Red,
}

impl From<String> for SelectColor {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_default()
    }
}

/// Colors used to render a select badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BadgeStyle {
    /// Background color as a CSS hex string.
    pub background: &'static str,
    /// Foreground (text) color as a CSS hex string.
    pub text: &'static str,
}

impl SelectColor {
    /// Returns every palette key.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Default,
            Self::Gray,
            Self::LightGray,
            Self::Brown,
            Self::Orange,
            Self::Yellow,
            Self::Green,
            Self::Blue,
            Self::Purple,
            Self::Pink,
            Self::Red,
        ]
    }

    /// Returns the badge colors for this palette key.
    #[must_use]
    pub const fn badge(self) -> BadgeStyle {
        let (background, text) = match self {
            Self::Default => ("#e3e2e080", "#32302c"),
            Self::Gray => ("#e3e2e0", "#32302c"),
            Self::LightGray => ("#f1f1ef", "#5a5955"),
            Self::Brown => ("#eee0da", "#442a1e"),
            Self::Orange => ("#fadec9", "#49290e"),
            Self::Yellow => ("#fdecc8", "#402c1b"),
            Self::Green => ("#dbeddb", "#1c3829"),
            Self::Blue => ("#d3e5ef", "#183347"),
            Self::Purple => ("#e8deee", "#412454"),
            Self::Pink => ("#f5e0e9", "#4c2337"),
            Self::Red => ("#ffe2dd", "#5d1715"),
        };
        BadgeStyle { background, text }
    }

    /// Resolves a raw palette key to its badge colors, falling back to the
    /// default style for unknown keys.
    #[must_use]
    pub fn badge_for(key: &str) -> BadgeStyle {
        key.parse::<Self>().unwrap_or_default().badge()
    }
}

/// One option of a select or multi-select property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectValue {
    /// Upstream option id.
    #[serde(default)]
    pub id: String,
    /// Display name; filters and groups match on this.
    pub name: String,
    /// Palette key.
    #[serde(default)]
    pub color: SelectColor,
}

impl SelectValue {
    /// Creates an option with the default color and no id.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            id: String::new(),
            name: name.to_owned(),
            color: SelectColor::Default,
        }
    }
}

// ── Database schema ──────────────────────────────────────────────────────

/// Type of a database property.
///
/// Unknown upstream types map to [`PropertyType::Other`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case", from = "String")]
#[strum(serialize_all = "snake_case")]
pub enum PropertyType {
    Title,
    RichText,
    Number,
    Select,
    MultiSelect,
    Status,
    Relation,
    Url,
    Date,
    Checkbox,
    Email,
    PhoneNumber,
    Formula,
    Other,
}

impl From<String> for PropertyType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or(Self::Other)
    }
}

impl PropertyType {
    /// Whether values of this type are drawn from a fixed option list.
    #[must_use]
    pub const fn is_select_like(self) -> bool {
        matches!(self, Self::Select | Self::MultiSelect)
    }
}

/// Describes one property of a database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseProperty {
    /// Upstream property id.
    #[serde(default)]
    pub id: String,
    /// Display name.
    pub name: String,
    /// Property type.
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    /// Option list in schema order (select and multi-select only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectValue>,
}

impl DatabaseProperty {
    /// Creates a property without options.
    #[must_use]
    pub fn new(name: &str, property_type: PropertyType) -> Self {
        Self {
            id: String::new(),
            name: name.to_owned(),
            property_type,
            options: Vec::new(),
        }
    }

    /// Attaches an option list.
    #[must_use]
    pub fn with_options(mut self, options: Vec<SelectValue>) -> Self {
        self.options = options;
        self
    }

    /// Position of an option name in the schema order.
    #[must_use]
    pub fn option_rank(&self, name: &str) -> Option<usize> {
        self.options.iter().position(|o| o.name == name)
    }
}

/// The live schema of one database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSchema {
    /// Database id.
    pub id: String,
    /// Database title (plain text).
    #[serde(default)]
    pub title: String,
    /// Properties keyed by display name.
    pub properties: BTreeMap<String, DatabaseProperty>,
}

impl DatabaseSchema {
    /// Builds a schema from a list of properties.
    #[must_use]
    pub fn from_properties(id: &str, properties: Vec<DatabaseProperty>) -> Self {
        Self {
            id: id.to_owned(),
            title: String::new(),
            properties: properties
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
        }
    }

    /// Looks up a property by display name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&DatabaseProperty> {
        self.properties.get(name)
    }

    /// Name of the title-typed property, if the schema has one.
    #[must_use]
    pub fn title_property(&self) -> Option<&str> {
        self.properties
            .values()
            .find(|p| p.property_type == PropertyType::Title)
            .map(|p| p.name.as_str())
    }
}

// ── Persisted location ───────────────────────────────────────────────────

/// One schema-derived facet of a [`Location`].
///
/// `values` is populated for select and multi-select properties, `value`
/// for number properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOption {
    /// Property display name.
    pub name: String,
    /// Selected options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<SelectValue>>,
    /// Numeric value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl FilterOption {
    /// Creates a select-backed option.
    #[must_use]
    pub fn select(name: &str, values: Vec<SelectValue>) -> Self {
        Self {
            name: name.to_owned(),
            values: Some(values),
            value: None,
        }
    }

    /// Creates a number-backed option.
    #[must_use]
    pub fn number(name: &str, value: Option<f64>) -> Self {
        Self {
            name: name.to_owned(),
            values: None,
            value,
        }
    }

    /// Option names, or an empty slice for number facets.
    #[must_use]
    pub fn value_names(&self) -> Vec<&str> {
        self.values
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|v| v.name.as_str())
            .collect()
    }
}

/// Type tag and numeric payload of a record property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySummary {
    /// Property type.
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    /// Numeric value for number properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<f64>,
}

/// A saved location as read back from the database.
///
/// Never mutated after a query; filtering, grouping, and offsetting all
/// derive new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Source-system page id.
    pub id: String,
    /// Place name.
    pub name: String,
    /// Street address.
    pub address: String,
    /// Website, if recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Link back to the page in Notion.
    pub notion_url: String,
    /// Emoji or image icon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Schema-derived facets in schema order.
    pub filter_options: Vec<FilterOption>,
    /// Type summaries keyed by property name.
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySummary>,
}

impl Location {
    /// Looks up the facet for a property.
    #[must_use]
    pub fn filter_option(&self, property: &str) -> Option<&FilterOption> {
        self.filter_options.iter().find(|o| o.name == property)
    }
}

// ── View state ───────────────────────────────────────────────────────────

/// Values to include for one select or multi-select property.
///
/// Absence of a `FilterState` for a property means no filter is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    /// Property display name.
    pub property: String,
    /// Option names to include.
    pub values: Vec<String>,
}

impl FilterState {
    /// Creates a filter entry.
    #[must_use]
    pub fn new(property: &str, values: &[&str]) -> Self {
        Self {
            property: property.to_owned(),
            values: values.iter().map(|v| (*v).to_owned()).collect(),
        }
    }

    /// Entries with no values do not constrain anything.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.values.is_empty()
    }
}

/// Sort direction for grouping and sorting.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}
