#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Location extraction from map and listing pages.
//!
//! Each supported site is described by a TOML file under `sites/` and
//! served by one adapter implementing the [`Extractor`] trait. The
//! [`registry::ExtractorRegistry`] picks the first adapter whose URL
//! patterns match the current page and runs it against a [`PageHost`],
//! the abstraction over the live DOM the adapter is injected into.
//!
//! Adapters never own the page. They read serialized DOM snapshots,
//! nudge lazy loaders through the host, and return a
//! [`LocationData`] record or an [`ExtractError`].

pub mod adapters;
pub mod coords;
pub mod dom;
pub mod host;
pub mod lazy_load;
pub mod message;
pub mod registry;
pub mod site;

use std::time::Duration;

use async_trait::async_trait;
use notion_map_location_models::LocationData;

pub use host::{HostEvent, PageHost, SavedPosition, StaticPage};
pub use registry::ExtractorRegistry;
pub use site::SiteConfig;

/// Errors that can occur while extracting a location from a page.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// No registered adapter handles the page URL.
    #[error("No extractor found for {url}. Supported sites: {}", supported.join(", "))]
    NoExtractorFound {
        /// The URL that was looked up.
        url: String,
        /// Display names of every registered site.
        supported: Vec<String>,
    },

    /// The page exposed no usable coordinate pair.
    #[error("Could not find coordinates on this {site} page")]
    CoordinatesNotFound {
        /// Display name of the site.
        site: String,
    },

    /// A bounded wait for a DOM element timed out.
    #[error("Timed out after {waited:?} waiting for {what}")]
    ElementNotReady {
        /// What was being waited for.
        what: String,
        /// How long the wait lasted.
        waited: Duration,
    },

    /// A CSS selector from a site config failed to parse.
    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector {
        /// The offending selector.
        selector: String,
        /// Parser message.
        message: String,
    },

    /// The host environment rejected an operation.
    #[error("Host error: {0}")]
    Host(String),

    /// Fetching a page snapshot over HTTP failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ExtractError {
    /// Whether a fresh attempt could succeed once the page settles.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CoordinatesNotFound { .. } | Self::ElementNotReady { .. }
        )
    }
}

/// A per-site extraction strategy.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// The site configuration this adapter was built from.
    fn site(&self) -> &SiteConfig;

    /// Returns `true` if this adapter handles the given URL.
    fn can_extract(&self, url: &str) -> bool;

    /// Scrapes the page into a [`LocationData`] record.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::CoordinatesNotFound`] if no coordinate
    /// source yields two numbers, or a host/wait error from the page.
    async fn extract_location_data(&self, page: &dyn PageHost)
    -> Result<LocationData, ExtractError>;
}
