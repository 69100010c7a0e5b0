#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the notion map server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the engine types so the API contract can evolve independently.

use notion_map_location_models::{DatabaseProperty, LocationData};
use notion_map_presentation::{Cluster, ClusterGlyph};
use notion_map_schema::{FieldSpec, ValidationIssue};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Human-readable message.
    pub error: String,
    /// Per-field validation problems.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ApiIssue>,
    /// Display names of supported sites, for unsupported extraction URLs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_sites: Vec<String>,
}

impl ApiError {
    /// An error with only a message.
    #[must_use]
    pub fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::default()
        }
    }
}

/// One field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiIssue {
    /// Form field key.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl From<&ValidationIssue> for ApiIssue {
    fn from(issue: &ValidationIssue) -> Self {
        Self {
            field: issue.field.clone(),
            message: issue.message.clone(),
        }
    }
}

/// Form and view affordances for one database.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSchema {
    /// Database id.
    pub id: String,
    /// Database title.
    pub title: String,
    /// Form fields, base fields first.
    pub fields: Vec<FieldSpec>,
    /// Initial form values.
    pub defaults: serde_json::Map<String, serde_json::Value>,
    /// Properties offered as filters.
    pub filterable: Vec<DatabaseProperty>,
    /// Properties offered for grouping.
    pub groupable: Vec<DatabaseProperty>,
    /// Properties offered for sorting.
    pub sortable: Vec<DatabaseProperty>,
}

/// Response after a location was saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCreated {
    /// New page id.
    pub id: String,
    /// Link to the new page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Body of `POST /api/extract`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    /// Page URL; selects the extractor.
    pub url: String,
    /// Page HTML snapshot.
    pub html: String,
    /// When set, the response also carries form values prefilled for
    /// this database.
    #[serde(default)]
    pub database_id: Option<String>,
}

/// Response of `POST /api/extract`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiExtraction {
    /// Extracted record.
    pub data: LocationData,
    /// Form values for the requested database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefill: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Query parameters for the clusters endpoint. Filter, group, and
/// direction are read from the same query string.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterQueryParams {
    /// Map zoom level.
    pub zoom: f64,
}

/// One cluster with its rendered glyph.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCluster {
    /// Cluster membership and position.
    #[serde(flatten)]
    pub cluster: Cluster,
    /// Glyph for multi-member clusters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glyph: Option<ClusterGlyph>,
}
