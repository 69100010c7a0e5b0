//! Compile-time registry of supported sites and the runtime adapter list.
//!
//! Each site is defined in a TOML file under `sites/`. The configs are
//! embedded at compile time and exposed via [`all_sites`];
//! [`ExtractorRegistry::with_default_sites`] builds one adapter per config
//! in key order.

use std::time::Duration;

use notion_map_location_models::LocationData;

use crate::adapters::build_extractor;
use crate::host::PageHost;
use crate::site::{SiteConfig, parse_site_toml};
use crate::{ExtractError, Extractor};

// ── Compile-time embedded TOML files ────────────────────────────────

const SITE_TOMLS: &[(&str, &str)] = &[
    ("google_maps", include_str!("../sites/google_maps.toml")),
    ("tripadvisor", include_str!("../sites/tripadvisor.toml")),
    ("yelp", include_str!("../sites/yelp.toml")),
];

#[cfg(test)]
const EXPECTED_SITE_COUNT: usize = 3;

/// Returns every embedded site config, sorted by key.
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_sites() -> Vec<SiteConfig> {
    let mut tomls = SITE_TOMLS.to_vec();
    tomls.sort_by_key(|(key, _)| *key);
    tomls
        .into_iter()
        .map(|(key, toml_str)| {
            parse_site_toml(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse site config '{key}': {e}"))
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn site_by_id(id: &str) -> SiteConfig {
    all_sites()
        .into_iter()
        .find(|s| s.id == id)
        .unwrap_or_else(|| panic!("no embedded site '{id}'"))
}

/// Ordered list of adapters; the first whose URL patterns match wins.
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding an adapter for every embedded site.
    ///
    /// # Panics
    ///
    /// Panics if an embedded site carries an invalid URL pattern.
    #[must_use]
    pub fn with_default_sites() -> Self {
        let mut registry = Self::new();
        for site in all_sites() {
            let id = site.id.clone();
            let extractor = build_extractor(site)
                .unwrap_or_else(|e| panic!("Invalid URL pattern in site config '{id}': {e}"));
            registry.register(extractor);
        }
        registry
    }

    /// Appends an adapter. Registration order decides ties.
    pub fn register(&mut self, extractor: Box<dyn Extractor>) {
        log::debug!("Registered extractor for {}", extractor.site().name);
        self.extractors.push(extractor);
    }

    /// Number of registered adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// The first adapter that claims `url`.
    #[must_use]
    pub fn get_extractor(&self, url: &str) -> Option<&dyn Extractor> {
        self.extractors
            .iter()
            .find(|e| e.can_extract(url))
            .map(AsRef::as_ref)
    }

    /// Display names of every registered site, in registration order.
    #[must_use]
    pub fn supported_sites(&self) -> Vec<String> {
        self.extractors
            .iter()
            .map(|e| e.site().name.clone())
            .collect()
    }

    /// Resolves the adapter for the page URL and runs it.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::NoExtractorFound`] if no adapter claims the
    /// URL, or whatever error the adapter raises.
    pub async fn extract(&self, page: &dyn PageHost) -> Result<LocationData, ExtractError> {
        let url = page.url();
        let Some(extractor) = self.get_extractor(&url) else {
            return Err(ExtractError::NoExtractorFound {
                url,
                supported: self.supported_sites(),
            });
        };

        log::info!("Extracting location from {} page", extractor.site().name);
        extractor.extract_location_data(page).await
    }

    /// Like [`Self::extract`], re-running the adapter up to `attempts`
    /// times with a fixed `delay` while it fails with a retryable error.
    ///
    /// # Errors
    ///
    /// Returns the last error once attempts are exhausted, or the first
    /// non-retryable error.
    pub async fn extract_with_retry(
        &self,
        page: &dyn PageHost,
        attempts: u32,
        delay: Duration,
    ) -> Result<LocationData, ExtractError> {
        let attempts = attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.extract(page).await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    log::warn!("Extraction attempt {attempt}/{attempts} failed: {e}, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StaticPage;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn loads_all_sites() {
        assert_eq!(all_sites().len(), EXPECTED_SITE_COUNT);
    }

    #[test]
    fn site_ids_are_unique() {
        let mut seen = BTreeSet::new();
        for site in &all_sites() {
            assert!(seen.insert(site.id.clone()), "Duplicate site ID: {}", site.id);
        }
    }

    #[test]
    fn all_sites_have_required_fields() {
        for site in &all_sites() {
            assert!(!site.name.is_empty(), "Site {} has empty name", site.id);
            assert!(!site.url_patterns.is_empty(), "Site {} has no URL patterns", site.id);
            assert!(!site.title.is_empty(), "Site {} has no title strategy", site.id);
            assert!(site.compile_patterns().is_ok(), "Site {} has a bad pattern", site.id);
        }
    }

    #[test]
    fn default_registry_is_sorted_by_key() {
        let registry = ExtractorRegistry::with_default_sites();
        assert_eq!(
            registry.supported_sites(),
            vec!["Google Maps", "Tripadvisor", "Yelp"]
        );
    }

    #[test]
    fn resolves_by_url() {
        let registry = ExtractorRegistry::with_default_sites();
        let cases = [
            ("https://www.google.com/maps/place/X/@1,2,3z", "google_maps"),
            ("https://maps.google.co.uk/?q=cafe", "google_maps"),
            ("https://www.yelp.com/biz/some-cafe", "yelp"),
            ("https://m.yelp.ca/biz/some-cafe", "yelp"),
            (
                "https://www.tripadvisor.co.uk/Hotel_Review-g1-d2-Reviews-X.html",
                "tripadvisor",
            ),
        ];
        for (url, id) in cases {
            let extractor = registry.get_extractor(url).unwrap();
            assert_eq!(extractor.site().id, id, "{url}");
        }
        assert!(registry.get_extractor("https://example.com").is_none());
        assert!(
            registry
                .get_extractor("https://www.yelp.com/search?find_desc=cafe")
                .is_none()
        );
    }

    #[tokio::test]
    async fn unsupported_site_lists_names() {
        let registry = ExtractorRegistry::with_default_sites();
        let page = StaticPage::new("https://example.com/", "<p></p>");
        let err = registry.extract(&page).await.unwrap_err();

        assert!(matches!(err, ExtractError::NoExtractorFound { .. }));
        assert_eq!(
            err.to_string(),
            "No extractor found for https://example.com/. \
             Supported sites: Google Maps, Tripadvisor, Yelp"
        );
    }

    #[tokio::test]
    async fn empty_registry_fails() {
        let registry = ExtractorRegistry::new();
        assert!(registry.is_empty());
        let page = StaticPage::new("https://www.yelp.com/biz/x", "<p></p>");
        assert!(registry.extract(&page).await.is_err());
    }

    struct Flaky {
        site: SiteConfig,
        calls: AtomicU32,
        succeed_on: u32,
    }

    #[async_trait::async_trait]
    impl Extractor for Flaky {
        fn site(&self) -> &SiteConfig {
            &self.site
        }

        fn can_extract(&self, _url: &str) -> bool {
            true
        }

        async fn extract_location_data(
            &self,
            _page: &dyn PageHost,
        ) -> Result<LocationData, ExtractError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call < self.succeed_on {
                return Err(ExtractError::CoordinatesNotFound {
                    site: self.site.name.clone(),
                });
            }
            Ok(LocationData {
                title: "Flaky".into(),
                latitude: "1".into(),
                longitude: "2".into(),
                ..LocationData::default()
            })
        }
    }

    fn flaky(succeed_on: u32) -> ExtractorRegistry {
        let mut registry = ExtractorRegistry::new();
        registry.register(Box::new(Flaky {
            site: site_by_id("google_maps"),
            calls: AtomicU32::new(0),
            succeed_on,
        }));
        registry
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_failure() {
        let registry = flaky(3);
        let page = StaticPage::new("https://example.com", "");
        let data = registry
            .extract_with_retry(&page, 3, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(data.title, "Flaky");
    }

    #[tokio::test]
    async fn retry_gives_up() {
        let registry = flaky(5);
        let page = StaticPage::new("https://example.com", "");
        let err = registry
            .extract_with_retry(&page, 2, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::CoordinatesNotFound { .. }));
    }

    #[tokio::test]
    async fn unsupported_site_is_not_retried() {
        let registry = ExtractorRegistry::with_default_sites();
        let page = StaticPage::new("https://example.com/", "");
        let started = std::time::Instant::now();
        let err = registry
            .extract_with_retry(&page, 5, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::NoExtractorFound { .. }));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
