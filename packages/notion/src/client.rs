//! HTTP client for the Notion REST API.

use std::time::Duration;

use async_trait::async_trait;
use notion_map_location_models::DatabaseSchema;
use serde_json::{Value, json};

use crate::mapping::{plain_text, schema_from_database};
use crate::retry::{self, RetryPolicy};
use crate::{DatabaseSummary, NotionError, NotionStore};

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://api.notion.com/v1";

/// API version sent with every request.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Default schema cache lifetime in seconds.
pub const DEFAULT_SCHEMA_CACHE_SECS: u64 = 60;

/// Records requested per query page.
const PAGE_SIZE: u32 = 100;

/// Connection settings, usually read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotionConfig {
    /// Integration token.
    pub token: String,
    /// API base URL without a trailing slash.
    pub api_url: String,
    /// How long retrieved schemas stay cached.
    pub schema_cache_ttl: Duration,
}

impl NotionConfig {
    /// Reads `NOTION_TOKEN`, `NOTION_API_URL`, and
    /// `NOTION_SCHEMA_CACHE_SECS`.
    ///
    /// # Errors
    ///
    /// Returns [`NotionError::Config`] if `NOTION_TOKEN` is unset or empty.
    pub fn from_env() -> Result<Self, NotionError> {
        let token = std::env::var("NOTION_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| NotionError::Config("NOTION_TOKEN is not set".to_owned()))?;
        let api_url = std::env::var("NOTION_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let cache_secs = std::env::var("NOTION_SCHEMA_CACHE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SCHEMA_CACHE_SECS);

        Ok(Self::new(&token, &api_url, Duration::from_secs(cache_secs)))
    }

    /// Builds a config from explicit values.
    #[must_use]
    pub fn new(token: &str, api_url: &str, schema_cache_ttl: Duration) -> Self {
        Self {
            token: token.to_owned(),
            api_url: api_url.trim_end_matches('/').to_owned(),
            schema_cache_ttl,
        }
    }
}

/// [`NotionStore`] backed by the REST API.
#[derive(Debug, Clone)]
pub struct NotionClient {
    http: reqwest::Client,
    config: NotionConfig,
    policy: RetryPolicy,
}

impl NotionClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns [`NotionError::Http`] if the HTTP client cannot be built.
    pub fn new(config: NotionConfig) -> Result<Self, NotionError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("notion-map/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            config,
            policy: RetryPolicy::default(),
        })
    }

    /// Overrides the retry policy for reads.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The connection settings.
    #[must_use]
    pub const fn config(&self) -> &NotionConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url, path.trim_start_matches('/'))
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(self.endpoint(path))
            .bearer_auth(&self.config.token)
            .header("Notion-Version", NOTION_VERSION)
    }

    fn post(&self, path: &str, body: &Value) -> reqwest::RequestBuilder {
        self.http
            .post(self.endpoint(path))
            .bearer_auth(&self.config.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(body)
    }
}

fn next_cursor(body: &Value) -> Option<String> {
    if body.get("has_more").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    body.get("next_cursor")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn results(body: &Value) -> Result<Vec<Value>, NotionError> {
    body.get("results")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| NotionError::Decode {
            message: "response has no results array".to_owned(),
        })
}

#[async_trait]
impl NotionStore for NotionClient {
    async fn retrieve_database(&self, database_id: &str) -> Result<DatabaseSchema, NotionError> {
        log::debug!("Retrieving database {database_id}");
        let path = format!("databases/{database_id}");
        let body = retry::send_json(&self.policy, || self.get(&path)).await?;
        schema_from_database(&body)
    }

    async fn query_database(&self, database_id: &str) -> Result<Vec<Value>, NotionError> {
        let path = format!("databases/{database_id}/query");
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = json!({ "page_size": PAGE_SIZE });
            if let Some(cursor) = &cursor {
                request["start_cursor"] = json!(cursor);
            }

            let body = retry::send_json(&self.policy, || self.post(&path, &request)).await?;
            records.extend(results(&body)?);

            cursor = next_cursor(&body);
            if cursor.is_none() {
                break;
            }
        }

        log::info!("Fetched {} records from database {database_id}", records.len());
        Ok(records)
    }

    async fn create_page(
        &self,
        database_id: &str,
        properties: Value,
        icon: Option<String>,
    ) -> Result<Value, NotionError> {
        let mut body = json!({
            "parent": { "database_id": database_id },
            "properties": properties,
        });
        if let Some(emoji) = icon.filter(|e| !e.is_empty()) {
            body["icon"] = json!({ "type": "emoji", "emoji": emoji });
        }

        retry::send_json(&RetryPolicy::NO_RETRY, || self.post("pages", &body))
            .await
            .map_err(|e| {
                log::error!("Page creation in {database_id} failed: {e}");
                NotionError::WriteFailed {
                    message: e.to_string(),
                }
            })
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<Value, NotionError> {
        let path = format!("pages/{page_id}");
        retry::send_json(&self.policy, || self.get(&path)).await
    }

    async fn list_databases(&self) -> Result<Vec<DatabaseSummary>, NotionError> {
        let mut databases = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = json!({
                "filter": { "property": "object", "value": "database" },
                "page_size": PAGE_SIZE,
            });
            if let Some(cursor) = &cursor {
                request["start_cursor"] = json!(cursor);
            }

            let body = retry::send_json(&self.policy, || self.post("search", &request)).await?;
            databases.extend(results(&body)?.iter().filter_map(|db| {
                Some(DatabaseSummary {
                    id: db.get("id")?.as_str()?.to_owned(),
                    title: plain_text(db.get("title")),
                })
            }));

            cursor = next_cursor(&body);
            if cursor.is_none() {
                break;
            }
        }

        Ok(databases)
    }
}
