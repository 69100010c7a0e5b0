#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map presentation engine.
//!
//! Pure functions that turn a saved location list, the current view
//! state, and the database schema into what the map and sidebar render:
//! filtering, grouping and sorting, duplicate-coordinate offsets, marker
//! clustering with deterministic glyphs, derived bounds, and query-string
//! sync. None of these functions fail on malformed input; they fall back
//! to identity filters, ungrouped lists, and empty results instead.

pub mod bounds;
pub mod cluster;
pub mod filter;
pub mod glyph;
pub mod group;
pub mod markers;
pub mod offset;
pub mod store;
pub mod url_state;
pub mod view;

pub use bounds::{MapBounds, compute_bounds};
pub use cluster::{Cluster, ClusterIndex, cluster_fit_bounds, cluster_radius, normalize_zoom};
pub use filter::filter_locations;
pub use glyph::{ClusterGlyph, cluster_glyph};
pub use group::{LocationGroup, group_locations, sort_locations};
pub use markers::{ClusterLayer, Marker, MarkerSet};
pub use offset::{OFFSET_DEGREES, get_offset_locations};
pub use store::{ViewState, ViewStore};
pub use url_state::{UrlState, create_url_from_filters, parse_filters_from_url};
pub use view::{MapView, RenderedView};

/// Errors a clustering layer reports for marker operations.
#[derive(Debug, thiserror::Error)]
pub enum ClusterLayerError {
    /// The layer refused to add the marker.
    #[error("Marker {0} was rejected by the layer")]
    Rejected(String),

    /// The marker is not on the layer (e.g., already removed).
    #[error("Marker {0} is not on the layer")]
    NotFound(String),
}

#[cfg(test)]
pub(crate) mod test_support {
    use notion_map_location_models::{
        DatabaseProperty, DatabaseSchema, FilterOption, Location, PropertyType, SelectValue,
    };

    pub fn location(id: &str, lat: f64, lng: f64, facets: &[(&str, &[&str])]) -> Location {
        Location {
            id: id.to_owned(),
            name: id.to_owned(),
            address: String::new(),
            website: None,
            lat,
            lng,
            notion_url: format!("https://www.notion.so/{id}"),
            icon: None,
            filter_options: facets
                .iter()
                .map(|(name, values)| {
                    FilterOption::select(
                        name,
                        values.iter().map(|v| SelectValue::named(v)).collect(),
                    )
                })
                .collect(),
            properties: std::collections::BTreeMap::new(),
        }
    }

    pub fn schema() -> DatabaseSchema {
        DatabaseSchema::from_properties(
            "db",
            vec![
                DatabaseProperty::new("Name", PropertyType::Title),
                DatabaseProperty::new("Category", PropertyType::Select).with_options(vec![
                    SelectValue::named("Cafe"),
                    SelectValue::named("Bar"),
                ]),
                DatabaseProperty::new("Tags", PropertyType::MultiSelect),
                DatabaseProperty::new("City", PropertyType::Select),
                DatabaseProperty::new("Rating", PropertyType::Number),
            ],
        )
    }
}
