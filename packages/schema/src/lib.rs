#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dynamic schema bridge.
//!
//! Turns the live property list of a database into a submission schema
//! for the save form and into filter/group/sort affordances for the map,
//! without hardcoding any property name. The only name-mapping rule is
//! lower-casing: a property called `Category` backs the form field
//! `category`.

pub mod affordances;
pub mod form;

pub use affordances::{
    filterable_properties, groupable_properties, option_order, sortable_properties,
};
pub use form::{
    BASE_KEYS, FieldKind, FieldSpec, FieldValue, Submission, ValidationSchema, build_schema,
    is_base_property,
};

/// One problem found while validating a submission.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationIssue {
    /// Form field key.
    pub field: String,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_owned(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors raised while building or applying a submission schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The submission does not match the schema. Every issue is listed.
    #[error("Invalid submission: {}", issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Validation {
        /// All issues found.
        issues: Vec<ValidationIssue>,
    },

    /// Two properties map to the same form field key.
    #[error("Properties '{first}' and '{second}' both map to field '{key}'")]
    KeyCollision {
        /// The shared lower-cased key.
        key: String,
        /// First property name.
        first: String,
        /// Second property name.
        second: String,
    },
}

impl SchemaError {
    /// The validation issues, or an empty slice for other errors.
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            Self::Validation { issues } => issues,
            Self::KeyCollision { .. } => &[],
        }
    }
}
