//! Grouping and sorting for the sidebar list.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use notion_map_location_models::{
    DatabaseSchema, FilterState, Location, PropertyType, SelectColor, SortDirection,
};
use notion_map_schema::option_order;
use serde::Serialize;

/// Bucket for locations without a value for the group property.
pub const OTHER_GROUP: &str = "Other";

/// Label of the single group produced when grouping is off or unusable.
pub const ALL_GROUP: &str = "All";

/// One section of the grouped list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationGroup {
    /// Option name, [`OTHER_GROUP`], or [`ALL_GROUP`].
    pub name: String,
    /// Badge color of the option.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<SelectColor>,
    /// Members in input order.
    pub locations: Vec<Location>,
}

impl LocationGroup {
    fn all(locations: &[Location]) -> Self {
        Self {
            name: ALL_GROUP.to_owned(),
            color: None,
            locations: locations.to_vec(),
        }
    }
}

fn groupable(schema: &DatabaseSchema, property: &str) -> bool {
    schema
        .property(property)
        .is_some_and(|p| p.property_type.is_select_like())
}

/// Groups locations by the values of a select or multi-select property.
///
/// A multi-select location appears once in every group it has a value
/// for. Locations without a value go to [`OTHER_GROUP`], which is only
/// shown while no value filter is active for the property and is always
/// last. Groups follow the schema's option order when it has one, with
/// unknown labels after it in lexicographic order; otherwise labels sort
/// lexicographically. [`SortDirection::Desc`] reverses the order.
///
/// Without a usable group property the result is a single
/// [`ALL_GROUP`] group.
#[must_use]
pub fn group_locations(
    locations: &[Location],
    group_by: Option<&str>,
    direction: SortDirection,
    schema: &DatabaseSchema,
    filters: &[FilterState],
) -> Vec<LocationGroup> {
    let Some(property) = group_by.filter(|p| groupable(schema, p)) else {
        if let Some(p) = group_by {
            log::debug!("Cannot group by '{p}', showing an ungrouped list");
        }
        return vec![LocationGroup::all(locations)];
    };

    let mut buckets: BTreeMap<String, LocationGroup> = BTreeMap::new();
    let mut other = Vec::new();

    for location in locations {
        let values = location
            .filter_option(property)
            .and_then(|o| o.values.as_deref())
            .unwrap_or_default();

        if values.is_empty() {
            other.push(location.clone());
            continue;
        }

        for value in values {
            buckets
                .entry(value.name.clone())
                .or_insert_with(|| LocationGroup {
                    name: value.name.clone(),
                    color: Some(value.color),
                    locations: Vec::new(),
                })
                .locations
                .push(location.clone());
        }
    }

    let order = option_order(schema, property).unwrap_or_default();
    let rank = |name: &str| order.iter().position(|o| *o == name);

    let mut groups: Vec<LocationGroup> = buckets.into_values().collect();
    groups.sort_by(|a, b| match (rank(&a.name), rank(&b.name)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.name.cmp(&b.name),
    });
    if direction == SortDirection::Desc {
        groups.reverse();
    }

    let filtered = filters
        .iter()
        .any(|f| f.property == property && f.is_active());
    if !filtered && !other.is_empty() {
        groups.push(LocationGroup {
            name: OTHER_GROUP.to_owned(),
            color: None,
            locations: other,
        });
    }

    groups
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
enum SortKey {
    Text(String),
    Number(f64),
    Rank(usize, String),
}

fn sort_key(location: &Location, key: &str, schema: &DatabaseSchema) -> Option<SortKey> {
    let Some(property) = schema.property(key) else {
        return Some(SortKey::Text(location.name.to_lowercase()));
    };

    match property.property_type {
        PropertyType::Number => location
            .properties
            .get(key)
            .and_then(|p| p.number)
            .or_else(|| location.filter_option(key).and_then(|o| o.value))
            .map(SortKey::Number),
        PropertyType::Select | PropertyType::MultiSelect => {
            let first = location.filter_option(key)?.values.as_deref()?.first()?;
            let rank = property.option_rank(&first.name).unwrap_or(usize::MAX);
            Some(SortKey::Rank(rank, first.name.clone()))
        }
        _ => Some(SortKey::Text(location.name.to_lowercase())),
    }
}

/// Sorts locations by name, a number property, or a select property's
/// option order. Locations without a value sort last in either direction;
/// an unknown key sorts by name.
#[must_use]
pub fn sort_locations(
    locations: &[Location],
    key: &str,
    direction: SortDirection,
    schema: &DatabaseSchema,
) -> Vec<Location> {
    let mut keyed: Vec<(Option<SortKey>, &Location)> = locations
        .iter()
        .map(|l| (sort_key(l, key, schema), l))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => {
            let ord = a.partial_cmp(b).unwrap_or(Ordering::Equal);
            match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    keyed.into_iter().map(|(_, l)| l.clone()).collect()
}
