//! Submission schema for the save form.

use std::collections::BTreeMap;

use notion_map_location_models::{
    DatabaseProperty, DynamicValue, LocationData, PropertyType, SelectValue,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{SchemaError, ValidationIssue};

/// Keys of the fixed base fields, in form order.
pub const BASE_KEYS: &[&str] = &["title", "address", "latitude", "longitude", "emoji", "website"];

/// Returns `true` if `property` is backed by a base field: the title-typed
/// property, or any property whose lower-cased name is one of
/// [`BASE_KEYS`]. Such a property never becomes a dynamic field or a facet.
#[must_use]
pub fn is_base_property(property: &DatabaseProperty) -> bool {
    property.property_type == PropertyType::Title
        || BASE_KEYS.contains(&property.name.to_lowercase().as_str())
}

/// How a form field is validated and coerced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text.
    Text,
    /// Decimal degrees, accepted as a number or numeric string.
    Coordinate {
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
    /// Absolute `http`/`https` URL.
    Url,
    /// One option name; defaults to `""`.
    Select,
    /// Any number of option names; defaults to `[]`.
    MultiSelect,
    /// Number coerced from numeric strings; defaults to `0`.
    Number,
}

/// One field of the generated form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    /// Form key (lower-cased property name for dynamic fields).
    pub key: String,
    /// Label shown next to the input.
    pub label: String,
    /// Backing database property for dynamic fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    /// Validation behaviour.
    pub kind: FieldKind,
    /// Whether the field must be present and non-empty.
    pub required: bool,
    /// Choices for select inputs, in schema order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectValue>,
}

impl FieldSpec {
    fn base(key: &str, label: &str, kind: FieldKind, required: bool) -> Self {
        Self {
            key: key.to_owned(),
            label: label.to_owned(),
            property: None,
            kind,
            required,
            options: Vec::new(),
        }
    }

    fn dynamic(key: String, property: &DatabaseProperty, kind: FieldKind) -> Self {
        Self {
            key,
            label: property.name.clone(),
            property: Some(property.name.clone()),
            kind,
            required: false,
            options: property.options.clone(),
        }
    }

    fn default_value(&self) -> Value {
        match self.kind {
            FieldKind::MultiSelect => json!([]),
            FieldKind::Number => json!(0),
            _ => json!(""),
        }
    }
}

/// A validated dynamic value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Select option name.
    Text(String),
    /// Multi-select option names.
    List(Vec<String>),
    /// Number value.
    Number(f64),
}

/// A form submission that passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Place name.
    pub title: String,
    /// Street address; may be empty.
    pub address: String,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Page icon emoji.
    pub emoji: Option<String>,
    /// Website URL.
    pub website: Option<String>,
    /// Dynamic values keyed by database property name.
    pub properties: BTreeMap<String, FieldValue>,
}

/// The form schema generated from a database's properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationSchema {
    fields: Vec<FieldSpec>,
}

/// Builds the submission schema for a database.
///
/// The base fields are always present. Each `multi_select`, `select`, and
/// `number` property adds one field keyed by its lower-cased name; other
/// property types are ignored. A property whose key equals a base key is
/// already covered by the base field and is skipped.
///
/// # Errors
///
/// Returns [`SchemaError::KeyCollision`] if two dynamic properties
/// lower-case to the same key.
pub fn build_schema(
    properties: &BTreeMap<String, DatabaseProperty>,
) -> Result<ValidationSchema, SchemaError> {
    let mut fields = vec![
        FieldSpec::base("title", "Title", FieldKind::Text, true),
        FieldSpec::base("address", "Address", FieldKind::Text, false),
        FieldSpec::base(
            "latitude",
            "Latitude",
            FieldKind::Coordinate {
                min: -90.0,
                max: 90.0,
            },
            true,
        ),
        FieldSpec::base(
            "longitude",
            "Longitude",
            FieldKind::Coordinate {
                min: -180.0,
                max: 180.0,
            },
            true,
        ),
        FieldSpec::base("emoji", "Emoji", FieldKind::Text, false),
        FieldSpec::base("website", "Website", FieldKind::Url, false),
    ];

    let mut owners: BTreeMap<String, &str> = BTreeMap::new();

    for (name, property) in properties {
        let kind = match property.property_type {
            PropertyType::MultiSelect => FieldKind::MultiSelect,
            PropertyType::Select => FieldKind::Select,
            PropertyType::Number => FieldKind::Number,
            _ => continue,
        };

        let key = name.to_lowercase();
        if is_base_property(property) {
            log::debug!("Property '{name}' is backed by the base '{key}' field");
            continue;
        }

        if let Some(first) = owners.insert(key.clone(), name) {
            return Err(SchemaError::KeyCollision {
                key,
                first: first.to_owned(),
                second: name.clone(),
            });
        }

        fields.push(FieldSpec::dynamic(key, property, kind));
    }

    Ok(ValidationSchema { fields })
}

fn present<'a>(input: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    input.get(key).filter(|v| !v.is_null())
}

fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn optional_text(value: Option<&Value>) -> Result<Option<String>, &'static str> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_owned()))
        }
        Some(_) => Err("must be a string"),
    }
}

fn is_absolute_url(value: &str) -> bool {
    url::Url::parse(value).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

impl ValidationSchema {
    /// All fields: base fields first, then dynamic fields by property name.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Looks up a field by key.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Fields backed by a database property.
    pub fn dynamic_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.property.is_some())
    }

    /// Initial form values.
    #[must_use]
    pub fn defaults(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|f| (f.key.clone(), f.default_value()))
            .collect()
    }

    /// Form values pre-filled from an extraction result.
    ///
    /// Dynamic fields pick up `tags`, `city`, and any extra keys of the
    /// record whose lower-cased name equals the field key.
    #[must_use]
    pub fn prefill(&self, data: &LocationData) -> Map<String, Value> {
        let mut values = self.defaults();
        values.insert("title".into(), json!(data.title));
        values.insert("address".into(), json!(data.address));
        values.insert("latitude".into(), json!(data.latitude));
        values.insert("longitude".into(), json!(data.longitude));
        if let Some(emoji) = &data.emoji {
            values.insert("emoji".into(), json!(emoji));
        }
        if let Some(website) = data.extra.get("website").and_then(first_text) {
            values.insert("website".into(), json!(website));
        }

        for field in self.dynamic_fields() {
            let Some(source) = extracted_value(data, &field.key) else {
                continue;
            };
            let value = match (&field.kind, source) {
                (FieldKind::MultiSelect, DynamicValue::List(items)) => json!(items),
                (FieldKind::MultiSelect, DynamicValue::Text(text)) if !text.is_empty() => {
                    json!([text])
                }
                (FieldKind::Select, value) => match first_text(&value) {
                    Some(text) => json!(text),
                    None => continue,
                },
                (FieldKind::Number, value) => {
                    match first_text(&value).and_then(|t| t.trim().parse::<f64>().ok()) {
                        Some(n) => json!(n),
                        None => continue,
                    }
                }
                _ => continue,
            };
            values.insert(field.key.clone(), value);
        }

        values
    }

    /// Validates a submitted form, collecting every issue before rejecting.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Validation`] listing every problem found.
    pub fn validate(&self, input: &Value) -> Result<Submission, SchemaError> {
        let Some(input) = input.as_object() else {
            return Err(SchemaError::Validation {
                issues: vec![ValidationIssue::new("form", "must be an object")],
            });
        };

        let mut issues = Vec::new();

        let title = match optional_text(present(input, "title")) {
            Ok(Some(title)) => title,
            Ok(None) => {
                issues.push(ValidationIssue::new("title", "is required"));
                String::new()
            }
            Err(message) => {
                issues.push(ValidationIssue::new("title", message));
                String::new()
            }
        };

        let address = optional_text(present(input, "address"))
            .unwrap_or_else(|message| {
                issues.push(ValidationIssue::new("address", message));
                None
            })
            .unwrap_or_default();

        let latitude = self.coordinate(input, "latitude", &mut issues);
        let longitude = self.coordinate(input, "longitude", &mut issues);

        let emoji = optional_text(present(input, "emoji")).unwrap_or_else(|message| {
            issues.push(ValidationIssue::new("emoji", message));
            None
        });

        let website = match optional_text(present(input, "website")) {
            Ok(Some(url)) if !is_absolute_url(&url) => {
                issues.push(ValidationIssue::new("website", "must be an absolute URL"));
                None
            }
            Ok(url) => url,
            Err(message) => {
                issues.push(ValidationIssue::new("website", message));
                None
            }
        };

        let mut properties = BTreeMap::new();
        for field in self.dynamic_fields() {
            let Some(property) = &field.property else {
                continue;
            };
            match dynamic_value(field, present(input, &field.key)) {
                Ok(value) => {
                    properties.insert(property.clone(), value);
                }
                Err(message) => issues.push(ValidationIssue::new(&field.key, message)),
            }
        }

        if !issues.is_empty() {
            log::debug!("Rejected submission with {} issue(s)", issues.len());
            return Err(SchemaError::Validation { issues });
        }

        Ok(Submission {
            title,
            address,
            latitude,
            longitude,
            emoji,
            website,
            properties,
        })
    }

    fn coordinate(
        &self,
        input: &Map<String, Value>,
        key: &str,
        issues: &mut Vec<ValidationIssue>,
    ) -> f64 {
        let (min, max) = match self.field(key).map(|f| &f.kind) {
            Some(FieldKind::Coordinate { min, max }) => (*min, *max),
            _ => (f64::MIN, f64::MAX),
        };

        let Some(value) = present(input, key).filter(|v| v.as_str() != Some("")) else {
            issues.push(ValidationIssue::new(key, "is required"));
            return 0.0;
        };

        match coerce_number(value) {
            Some(n) if (min..=max).contains(&n) => n,
            Some(_) => {
                issues.push(ValidationIssue::new(
                    key,
                    format!("must be between {min} and {max}"),
                ));
                0.0
            }
            None => {
                issues.push(ValidationIssue::new(key, "must be a number"));
                0.0
            }
        }
    }
}

fn dynamic_value(field: &FieldSpec, value: Option<&Value>) -> Result<FieldValue, &'static str> {
    match (&field.kind, value) {
        (FieldKind::MultiSelect, None) => Ok(FieldValue::List(Vec::new())),
        (FieldKind::MultiSelect, Some(Value::Array(items))) => items
            .iter()
            .map(|item| item.as_str().map(|s| s.trim().to_owned()))
            .collect::<Option<Vec<_>>>()
            .map(|names| FieldValue::List(names.into_iter().filter(|n| !n.is_empty()).collect()))
            .ok_or("must be a list of strings"),
        (FieldKind::MultiSelect, Some(_)) => Err("must be a list of strings"),

        (FieldKind::Select, None) => Ok(FieldValue::Text(String::new())),
        (FieldKind::Select, Some(Value::String(s))) => Ok(FieldValue::Text(s.trim().to_owned())),
        (FieldKind::Select, Some(_)) => Err("must be a string"),

        (FieldKind::Number, None) => Ok(FieldValue::Number(0.0)),
        (FieldKind::Number, Some(Value::String(s))) if s.trim().is_empty() => {
            Ok(FieldValue::Number(0.0))
        }
        (FieldKind::Number, Some(v)) => coerce_number(v)
            .map(FieldValue::Number)
            .ok_or("must be a number"),

        (FieldKind::Text | FieldKind::Url | FieldKind::Coordinate { .. }, _) => {
            Err("is not a dynamic field")
        }
    }
}

fn first_text(value: &DynamicValue) -> Option<String> {
    match value {
        DynamicValue::Text(text) => (!text.is_empty()).then(|| text.clone()),
        DynamicValue::List(items) => items.first().cloned(),
    }
}

fn extracted_value(data: &LocationData, key: &str) -> Option<DynamicValue> {
    match key {
        "tags" if !data.tags.is_empty() => Some(DynamicValue::List(data.tags.clone())),
        "city" => data.city.clone().map(DynamicValue::Text),
        _ => data
            .extra
            .iter()
            .find(|(k, _)| k.to_lowercase() == key)
            .map(|(_, v)| v.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties(list: Vec<DatabaseProperty>) -> BTreeMap<String, DatabaseProperty> {
        list.into_iter().map(|p| (p.name.clone(), p)).collect()
    }

    fn sample() -> ValidationSchema {
        build_schema(&properties(vec![
            DatabaseProperty::new("Name", PropertyType::Title),
            DatabaseProperty::new("Tags", PropertyType::MultiSelect),
            DatabaseProperty::new("City", PropertyType::Select),
            DatabaseProperty::new("Rating", PropertyType::Number),
            DatabaseProperty::new("Notes", PropertyType::RichText),
        ]))
        .unwrap()
    }

    #[test]
    fn builds_base_and_dynamic_fields() {
        let schema = sample();
        let keys: Vec<&str> = schema.fields().iter().map(|f| f.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "title", "address", "latitude", "longitude", "emoji", "website", "city",
                "rating", "tags"
            ]
        );
        assert_eq!(schema.field("city").unwrap().property.as_deref(), Some("City"));
        assert!(schema.field("notes").is_none());
    }

    #[test]
    fn defaults_per_kind() {
        let defaults = sample().defaults();
        assert_eq!(defaults["tags"], json!([]));
        assert_eq!(defaults["city"], json!(""));
        assert_eq!(defaults["rating"], json!(0));
    }

    #[test]
    fn case_collision_is_an_error() {
        let err = build_schema(&properties(vec![
            DatabaseProperty::new("Tags", PropertyType::MultiSelect),
            DatabaseProperty::new("tags", PropertyType::Select),
        ]))
        .unwrap_err();
        assert!(matches!(err, SchemaError::KeyCollision { ref key, .. } if key == "tags"));
    }

    #[test]
    fn base_named_property_is_not_duplicated() {
        let schema = build_schema(&properties(vec![DatabaseProperty::new(
            "Latitude",
            PropertyType::Number,
        )]))
        .unwrap();
        assert_eq!(schema.fields().len(), BASE_KEYS.len());
        assert_eq!(schema.dynamic_fields().count(), 0);
    }

    #[test]
    fn select_named_after_base_field_is_base_backed() {
        let emoji = DatabaseProperty::new("Emoji", PropertyType::Select);
        let title = DatabaseProperty::new("title", PropertyType::MultiSelect);
        assert!(is_base_property(&emoji));
        assert!(is_base_property(&title));
        assert!(is_base_property(&DatabaseProperty::new("Name", PropertyType::Title)));
        assert!(!is_base_property(&DatabaseProperty::new("Mood", PropertyType::Select)));

        let schema = build_schema(&properties(vec![emoji, title])).unwrap();
        assert_eq!(schema.dynamic_fields().count(), 0);
    }

    #[test]
    fn validates_and_coerces() {
        let submission = sample()
            .validate(&json!({
                "title": "  Tartine ",
                "latitude": "37.7614",
                "longitude": -122.4241,
                "website": "https://tartinebakery.com",
                "tags": ["Bakery", " Cafe ", ""],
                "rating": "4.5",
            }))
            .unwrap();

        assert_eq!(submission.title, "Tartine");
        assert_eq!(submission.address, "");
        assert!((submission.latitude - 37.7614).abs() < f64::EPSILON);
        assert_eq!(
            submission.properties["Tags"],
            FieldValue::List(vec!["Bakery".into(), "Cafe".into()])
        );
        assert_eq!(submission.properties["City"], FieldValue::Text(String::new()));
        assert_eq!(submission.properties["Rating"], FieldValue::Number(4.5));
        assert_eq!(submission.emoji, None);
    }

    #[test]
    fn collects_every_issue() {
        let err = sample()
            .validate(&json!({
                "title": "",
                "latitude": 123,
                "longitude": "east",
                "website": "tartine.com",
                "tags": "Bakery",
                "rating": "lots",
            }))
            .unwrap_err();

        let fields: Vec<&str> = err.issues().iter().map(|i| i.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["title", "latitude", "longitude", "website", "rating", "tags"]
        );
    }

    #[test]
    fn non_object_is_rejected() {
        let err = sample().validate(&json!([1, 2])).unwrap_err();
        assert_eq!(err.issues().len(), 1);
    }

    #[test]
    fn prefill_maps_extraction_output() {
        let mut data = LocationData {
            title: "Blue Bottle".into(),
            address: "1 Ferry Building, San Francisco, CA 94111".into(),
            latitude: "37.7955".into(),
            longitude: "-122.3937".into(),
            emoji: Some("☕".into()),
            tags: vec!["Coffee".into()],
            city: Some("San Francisco".into()),
            ..LocationData::default()
        };
        data.extra.insert("Rating".into(), DynamicValue::Text("4.6".into()));

        let schema = sample();
        let values = schema.prefill(&data);

        assert_eq!(values["title"], json!("Blue Bottle"));
        assert_eq!(values["tags"], json!(["Coffee"]));
        assert_eq!(values["city"], json!("San Francisco"));
        assert_eq!(values["rating"], json!(4.6));
        assert_eq!(values["emoji"], json!("☕"));

        let submission = schema.validate(&Value::Object(values)).unwrap();
        assert_eq!(submission.properties["City"], FieldValue::Text("San Francisco".into()));
    }
}
