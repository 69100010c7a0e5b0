#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Notion-compatible data store.
//!
//! [`NotionStore`] is the contract the rest of the toolchain depends on:
//! retrieve a database schema, query its records, create a page, and
//! retrieve a page. Records are passed around as raw JSON; only the
//! `{type, select?, multi_select?, number?}` shape of each property and
//! the `{properties, icon}` shape of each record are interpreted, in
//! [`mapping`].

pub mod cache;
pub mod client;
pub mod mapping;
pub mod retry;

use async_trait::async_trait;
use notion_map_location_models::DatabaseSchema;
use serde::{Deserialize, Serialize};

pub use cache::SchemaCache;
pub use client::{NotionClient, NotionConfig};
pub use mapping::{build_page_properties, load_locations, location_from_page, save_location};

/// Errors that can occur while talking to the data store.
#[derive(Debug, thiserror::Error)]
pub enum NotionError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with an error status.
    #[error("Notion API returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// A response could not be interpreted.
    #[error("Unexpected response: {message}")]
    Decode {
        /// What was wrong.
        message: String,
    },

    /// Page creation was rejected. Never retried.
    #[error("Failed to save location: {message}")]
    WriteFailed {
        /// Upstream reason.
        message: String,
    },

    /// Required configuration is missing.
    #[error("Missing configuration: {0}")]
    Config(String),
}

/// A database the integration can see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSummary {
    /// Database id.
    pub id: String,
    /// Plain-text title.
    pub title: String,
}

/// Operations the toolchain needs from a Notion-compatible store.
#[async_trait]
pub trait NotionStore: Send + Sync {
    /// Reads a database's live schema.
    ///
    /// # Errors
    ///
    /// Returns [`NotionError`] if the request fails or the response is
    /// malformed.
    async fn retrieve_database(&self, database_id: &str) -> Result<DatabaseSchema, NotionError>;

    /// Reads every record of a database, following pagination.
    ///
    /// # Errors
    ///
    /// Returns [`NotionError`] if any page of results fails.
    async fn query_database(&self, database_id: &str)
    -> Result<Vec<serde_json::Value>, NotionError>;

    /// Creates a record.
    ///
    /// # Errors
    ///
    /// Returns [`NotionError::WriteFailed`] if the store rejects the page.
    async fn create_page(
        &self,
        database_id: &str,
        properties: serde_json::Value,
        icon: Option<String>,
    ) -> Result<serde_json::Value, NotionError>;

    /// Reads one record.
    ///
    /// # Errors
    ///
    /// Returns [`NotionError`] if the request fails.
    async fn retrieve_page(&self, page_id: &str) -> Result<serde_json::Value, NotionError>;

    /// Lists the databases shared with the integration.
    ///
    /// # Errors
    ///
    /// Returns [`NotionError`] if the request fails.
    async fn list_databases(&self) -> Result<Vec<DatabaseSummary>, NotionError>;
}
