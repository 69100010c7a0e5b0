//! One render pass over the location list.

use notion_map_location_models::{DatabaseSchema, Location};
use serde::Serialize;

use crate::bounds::{MapBounds, compute_bounds};
use crate::filter::filter_locations;
use crate::group::{LocationGroup, group_locations, sort_locations};
use crate::offset::get_offset_locations;
use crate::store::ViewState;

/// What the map and sidebar show for one view state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedView {
    /// Marker positions: filtered, with duplicate coordinates offset.
    pub markers: Vec<Location>,
    /// Sidebar sections.
    pub groups: Vec<LocationGroup>,
    /// Viewport covering the markers.
    pub bounds: Option<MapBounds>,
    /// Number of locations before filtering.
    pub total: usize,
    /// Query string reproducing this view.
    pub query: String,
}

/// Renders location lists against one database schema.
#[derive(Debug, Clone)]
pub struct MapView {
    schema: DatabaseSchema,
}

impl MapView {
    /// Creates a view for a schema.
    #[must_use]
    pub const fn new(schema: DatabaseSchema) -> Self {
        Self { schema }
    }

    /// The schema used for grouping and sorting.
    #[must_use]
    pub const fn schema(&self) -> &DatabaseSchema {
        &self.schema
    }

    /// Filters, sorts by name, groups, offsets, and bounds the locations.
    #[must_use]
    pub fn render(&self, locations: &[Location], state: &ViewState) -> RenderedView {
        let visible = filter_locations(locations, &state.filters);
        let sorted = sort_locations(&visible, "name", state.direction, &self.schema);
        let groups = group_locations(
            &sorted,
            state.group_by.as_deref(),
            state.direction,
            &self.schema,
            &state.filters,
        );
        let markers = get_offset_locations(&visible);
        let bounds = compute_bounds(&markers);

        RenderedView {
            markers,
            groups,
            bounds,
            total: locations.len(),
            query: state.to_query(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{location, schema};
    use notion_map_location_models::{FilterState, SortDirection};

    #[test]
    fn composes_the_pipeline() {
        let locations = vec![
            location("b", 40.0, -73.0, &[("Category", &["Cafe"])]),
            location("a", 40.0, -73.0, &[("Category", &["Cafe", "Bar"])]),
            location("c", 41.0, -74.0, &[("Category", &["Bakery"])]),
        ];
        let state = ViewState {
            filters: vec![FilterState::new("Category", &["Cafe", "Bar"])],
            group_by: Some("Category".into()),
            direction: SortDirection::Asc,
            selected: None,
        };

        let view = MapView::new(schema()).render(&locations, &state);

        assert_eq!(view.total, 3);
        assert_eq!(view.markers.len(), 2);
        assert!((view.markers[1].lat - 40.0002).abs() < 1e-9);
        let names: Vec<&str> = view.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Cafe", "Bar"]);
        let cafe: Vec<&str> = view.groups[0].locations.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(cafe, vec!["a", "b"]);
        assert_eq!(view.query, "filter=Category:Cafe,Bar&group=Category&direction=asc");
        assert!(view.bounds.unwrap().contains(40.0, -73.0));
    }

    #[test]
    fn empty_list_renders_empty_view() {
        let view = MapView::new(DatabaseSchema::default()).render(&[], &ViewState::default());
        assert!(view.markers.is_empty());
        assert!(view.bounds.is_none());
        assert_eq!(view.groups.len(), 1);
    }
}
