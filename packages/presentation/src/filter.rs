//! Select-value filtering.

use notion_map_location_models::{FilterState, Location};

fn matches(location: &Location, filter: &FilterState) -> bool {
    location.filter_option(&filter.property).is_some_and(|option| {
        option
            .value_names()
            .iter()
            .any(|name| filter.values.iter().any(|v| v == name))
    })
}

/// Keeps the locations that satisfy every active filter.
///
/// Filters combine with AND across properties and OR within one
/// property's values. A location without the filtered property is
/// excluded. With no active filters every location passes.
#[must_use]
pub fn filter_locations(locations: &[Location], filters: &[FilterState]) -> Vec<Location> {
    let active: Vec<&FilterState> = filters.iter().filter(|f| f.is_active()).collect();
    if active.is_empty() {
        return locations.to_vec();
    }

    locations
        .iter()
        .filter(|location| active.iter().all(|f| matches(location, f)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::location;

    fn sample() -> Vec<Location> {
        vec![
            location("a", 40.0, -73.0, &[("Category", &["Cafe", "Bar"]), ("City", &["NYC"])]),
            location("b", 41.0, -74.0, &[("Category", &["Bar"]), ("City", &["Boston"])]),
            location("c", 42.0, -75.0, &[("City", &["NYC"])]),
        ]
    }

    fn ids(locations: &[Location]) -> Vec<&str> {
        locations.iter().map(|l| l.id.as_str()).collect()
    }

    #[test]
    fn no_filters_is_identity() {
        let all = sample();
        assert_eq!(filter_locations(&all, &[]), all);
        assert_eq!(filter_locations(&all, &[FilterState::new("Category", &[])]), all);
    }

    #[test]
    fn or_within_property() {
        let result = filter_locations(&sample(), &[FilterState::new("Category", &["Cafe"])]);
        assert_eq!(ids(&result), vec!["a"]);

        let result = filter_locations(&sample(), &[FilterState::new("Category", &["Cafe", "Bar"])]);
        assert_eq!(ids(&result), vec!["a", "b"]);
    }

    #[test]
    fn and_across_properties() {
        let filters = [
            FilterState::new("Category", &["Bar"]),
            FilterState::new("City", &["NYC"]),
        ];
        assert_eq!(ids(&filter_locations(&sample(), &filters)), vec!["a"]);
    }

    #[test]
    fn missing_property_is_excluded() {
        let result = filter_locations(&sample(), &[FilterState::new("Category", &["Bar"])]);
        assert!(!ids(&result).contains(&"c"));
    }

    #[test]
    fn idempotent() {
        let filters = [FilterState::new("City", &["NYC"])];
        let once = filter_locations(&sample(), &filters);
        assert_eq!(filter_locations(&once, &filters), once);
    }
}
