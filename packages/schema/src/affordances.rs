//! Filter, group, and sort affordances derived from a schema.
//!
//! Absent or unusable schema data yields empty lists rather than errors,
//! so the map falls back to "no filters available" and an ungrouped list.

use notion_map_location_models::{DatabaseProperty, DatabaseSchema, PropertyType};

/// Properties the map can filter by: select-like properties that have at
/// least one option.
#[must_use]
pub fn filterable_properties(schema: &DatabaseSchema) -> Vec<&DatabaseProperty> {
    schema
        .properties
        .values()
        .filter(|p| p.property_type.is_select_like() && !p.options.is_empty())
        .collect()
}

/// Properties the list can be grouped by.
#[must_use]
pub fn groupable_properties(schema: &DatabaseSchema) -> Vec<&DatabaseProperty> {
    schema
        .properties
        .values()
        .filter(|p| p.property_type.is_select_like())
        .collect()
}

/// Properties the list can be sorted by.
#[must_use]
pub fn sortable_properties(schema: &DatabaseSchema) -> Vec<&DatabaseProperty> {
    schema
        .properties
        .values()
        .filter(|p| {
            matches!(
                p.property_type,
                PropertyType::Title | PropertyType::Number | PropertyType::Select
            )
        })
        .collect()
}

/// Explicit option order of a select-like property, if the schema has one.
#[must_use]
pub fn option_order<'a>(schema: &'a DatabaseSchema, property: &str) -> Option<Vec<&'a str>> {
    let property = schema.property(property)?;
    if !property.property_type.is_select_like() || property.options.is_empty() {
        return None;
    }
    Some(property.options.iter().map(|o| o.name.as_str()).collect())
}
