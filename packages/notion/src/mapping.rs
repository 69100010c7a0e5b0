//! Translation between Notion JSON and the location model.
//!
//! Base fields live in fixed properties matched case-insensitively by
//! name: the title-typed property, `Address`, `Latitude`, `Longitude`,
//! and `Website`. Properties the form treats as base-backed (see
//! [`is_base_property`]) are never facets; every other select,
//! multi-select, and number property becomes a facet of the location,
//! strictly in the current schema's terms: a property renamed or deleted
//! upstream simply disappears.

use std::collections::BTreeMap;

use notion_map_location_models::{
    DatabaseProperty, DatabaseSchema, FilterOption, Location, PropertySummary, PropertyType,
    SelectValue,
};
use notion_map_schema::{FieldValue, Submission, is_base_property};
use serde_json::{Value, json};

use crate::{NotionError, NotionStore};

/// Names of the base-backed properties, lower-cased.
const ADDRESS: &str = "address";
const LATITUDE: &str = "latitude";
const LONGITUDE: &str = "longitude";
const WEBSITE: &str = "website";

/// Concatenated `plain_text` of a rich-text array.
#[must_use]
pub fn plain_text(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| {
                    p.get("plain_text")
                        .or_else(|| p.pointer("/text/content"))
                        .and_then(Value::as_str)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn rich_text(content: &str) -> Value {
    json!([{ "type": "text", "text": { "content": content } }])
}

fn base_property<'a>(schema: &'a DatabaseSchema, key: &str) -> Option<&'a DatabaseProperty> {
    schema
        .properties
        .values()
        .find(|p| p.name.to_lowercase() == key)
}

fn options(config: Option<&Value>) -> Vec<SelectValue> {
    config
        .and_then(|c| c.get("options"))
        .and_then(|o| serde_json::from_value(o.clone()).ok())
        .unwrap_or_default()
}

/// Parses a retrieved database object into a schema.
///
/// # Errors
///
/// Returns [`NotionError::Decode`] if the object has no id or properties.
pub fn schema_from_database(body: &Value) -> Result<DatabaseSchema, NotionError> {
    let id = body
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| NotionError::Decode {
            message: "database has no id".to_owned(),
        })?;
    let raw = body
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| NotionError::Decode {
            message: format!("database {id} has no properties"),
        })?;

    let properties = raw
        .iter()
        .map(|(name, prop)| {
            let property_type = PropertyType::from(
                prop.get("type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
            );
            let options = if property_type.is_select_like() {
                options(prop.get(property_type.as_ref()))
            } else {
                Vec::new()
            };
            DatabaseProperty {
                id: prop
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                name: name.clone(),
                property_type,
                options,
            }
        })
        .collect();

    let mut schema = DatabaseSchema::from_properties(id, properties);
    schema.title = plain_text(body.get("title"));
    Ok(schema)
}

fn page_property<'a>(page: &'a Value, name: &str) -> Option<&'a Value> {
    page.get("properties")?.get(name)
}

fn number_of(page: &Value, property: Option<&DatabaseProperty>) -> Option<f64> {
    page_property(page, &property?.name)?
        .get("number")?
        .as_f64()
}

fn select_values(value: &Value, property_type: PropertyType) -> Vec<SelectValue> {
    let raw = value.get(property_type.as_ref());
    match property_type {
        PropertyType::Select => raw
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .into_iter()
            .collect(),
        PropertyType::MultiSelect => raw
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn icon_of(page: &Value) -> Option<String> {
    let icon = page.get("icon")?;
    let text = match icon.get("type")?.as_str()? {
        "emoji" => icon.get("emoji")?.as_str()?,
        "external" => icon.pointer("/external/url")?.as_str()?,
        "file" => icon.pointer("/file/url")?.as_str()?,
        _ => return None,
    };
    Some(text.to_owned())
}

/// Builds a [`Location`] from a queried record.
///
/// Returns `None` for records without numeric latitude and longitude.
#[must_use]
pub fn location_from_page(page: &Value, schema: &DatabaseSchema) -> Option<Location> {
    let id = page.get("id")?.as_str()?.to_owned();

    let (Some(lat), Some(lng)) = (
        number_of(page, base_property(schema, LATITUDE)),
        number_of(page, base_property(schema, LONGITUDE)),
    ) else {
        log::debug!("Skipping record {id} without coordinates");
        return None;
    };

    let name = schema
        .title_property()
        .and_then(|title| page_property(page, title))
        .map(|v| plain_text(v.get("title")))
        .unwrap_or_default();
    let address = base_property(schema, ADDRESS)
        .and_then(|p| page_property(page, &p.name))
        .map(|v| plain_text(v.get("rich_text")))
        .unwrap_or_default();
    let website = base_property(schema, WEBSITE)
        .and_then(|p| page_property(page, &p.name))
        .and_then(|v| v.get("url"))
        .and_then(Value::as_str)
        .map(str::to_owned);

    let mut filter_options = Vec::new();
    let mut properties = BTreeMap::new();

    for property in schema.properties.values() {
        let Some(value) = page_property(page, &property.name) else {
            continue;
        };
        let number = value.get("number").and_then(Value::as_f64);
        properties.insert(
            property.name.clone(),
            PropertySummary {
                property_type: property.property_type,
                number,
            },
        );

        if is_base_property(property) {
            continue;
        }
        match property.property_type {
            PropertyType::Select | PropertyType::MultiSelect => filter_options.push(
                FilterOption::select(&property.name, select_values(value, property.property_type)),
            ),
            PropertyType::Number => {
                filter_options.push(FilterOption::number(&property.name, number));
            }
            _ => {}
        }
    }

    Some(Location {
        id,
        name,
        address,
        website,
        lat,
        lng,
        notion_url: page
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        icon: icon_of(page),
        filter_options,
        properties,
    })
}

/// Page-property payload for a validated submission.
///
/// Base values are written to their base properties when the schema has
/// them; dynamic values are written by property name and skipped with a
/// warning if the schema's type no longer matches.
#[must_use]
pub fn build_page_properties(schema: &DatabaseSchema, submission: &Submission) -> Value {
    let mut props = serde_json::Map::new();

    let title = schema.title_property().unwrap_or("Name");
    props.insert(title.to_owned(), json!({ "title": rich_text(&submission.title) }));

    if let Some(p) = base_property(schema, ADDRESS) {
        props.insert(p.name.clone(), json!({ "rich_text": rich_text(&submission.address) }));
    }
    if let Some(p) = base_property(schema, LATITUDE) {
        props.insert(p.name.clone(), json!({ "number": submission.latitude }));
    }
    if let Some(p) = base_property(schema, LONGITUDE) {
        props.insert(p.name.clone(), json!({ "number": submission.longitude }));
    }
    if let (Some(p), Some(url)) = (base_property(schema, WEBSITE), &submission.website) {
        props.insert(p.name.clone(), json!({ "url": url }));
    }

    for (name, value) in &submission.properties {
        let Some(property) = schema.property(name) else {
            log::warn!("Dropping value for unknown property '{name}'");
            continue;
        };
        let payload = match (property.property_type, value) {
            (PropertyType::MultiSelect, FieldValue::List(names)) => json!({
                "multi_select": names.iter().map(|n| json!({ "name": n })).collect::<Vec<_>>()
            }),
            (PropertyType::Select, FieldValue::Text(n)) if n.is_empty() => json!({ "select": null }),
            (PropertyType::Select, FieldValue::Text(n)) => json!({ "select": { "name": n } }),
            (PropertyType::Number, FieldValue::Number(n)) => json!({ "number": n }),
            (other, _) => {
                log::warn!("Dropping value for '{name}': type is now {other}");
                continue;
            }
        };
        props.insert(name.clone(), payload);
    }

    Value::Object(props)
}

/// Reads a database's schema and every placeable record.
///
/// # Errors
///
/// Returns [`NotionError`] if either call to the store fails.
pub async fn load_locations(
    store: &dyn NotionStore,
    database_id: &str,
) -> Result<(DatabaseSchema, Vec<Location>), NotionError> {
    let schema = store.retrieve_database(database_id).await?;
    let records = store.query_database(database_id).await?;
    let locations: Vec<Location> = records
        .iter()
        .filter_map(|r| location_from_page(r, &schema))
        .collect();

    log::debug!(
        "Mapped {} of {} records in {database_id} to locations",
        locations.len(),
        records.len()
    );
    Ok((schema, locations))
}

/// Writes a validated submission as a new record.
///
/// # Errors
///
/// Returns [`NotionError::WriteFailed`] if the store rejects the page.
pub async fn save_location(
    store: &dyn NotionStore,
    database_id: &str,
    schema: &DatabaseSchema,
    submission: &Submission,
) -> Result<Value, NotionError> {
    let properties = build_page_properties(schema, submission);
    store
        .create_page(database_id, properties, submission.emoji.clone())
        .await
}
