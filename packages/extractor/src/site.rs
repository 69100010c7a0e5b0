//! Site definitions loaded from the embedded TOML configs.

use regex::Regex;
use serde::Deserialize;

/// Everything unique about one supported site.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Unique identifier (e.g., `"google_maps"`).
    pub id: String,
    /// Human-readable name shown in "supported sites" messages.
    pub name: String,
    /// Regular expressions matched against the page URL.
    pub url_patterns: Vec<String>,
    /// Where the coordinates come from.
    pub coordinates: CoordinateSource,
    /// Title strategies in priority order.
    #[serde(default)]
    pub title: Vec<FieldStrategy>,
    /// Address strategies in priority order.
    #[serde(default)]
    pub address: Vec<FieldStrategy>,
    /// Tag strategies; every match of every strategy is collected.
    #[serde(default)]
    pub tags: Vec<FieldStrategy>,
    /// Emoji to attach to every record from this site.
    #[serde(default)]
    pub emoji: Option<String>,
}

/// Site-specific coordinate encoding.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinateSource {
    /// `!3d<lat>!4d<lng>` markers (last wins), falling back to `@lat,lng`.
    PageUrl,
    /// Query parameters of a static-map `<img>` URL.
    StaticMap {
        /// Containers to pull into view so the lazy loader fires.
        map_containers: Vec<String>,
        /// Selector for the static-map image.
        image_selector: String,
        /// Settle delay after nudging the lazy loader.
        #[serde(default = "default_settle_ms")]
        settle_ms: u64,
        /// Upper bound on the wait for the image.
        #[serde(default = "default_wait_timeout_ms")]
        wait_timeout_ms: u64,
    },
    /// Marker parameter of a CSS `background-image` URL.
    BackgroundImage {
        /// Containers to pull into view so the lazy loader fires.
        map_containers: Vec<String>,
        /// Selector for the element carrying the background image.
        element_selector: String,
        /// Settle delay after nudging the lazy loader.
        #[serde(default = "default_settle_ms")]
        settle_ms: u64,
        /// Upper bound on the wait for the element.
        #[serde(default = "default_wait_timeout_ms")]
        wait_timeout_ms: u64,
    },
}

const fn default_settle_ms() -> u64 {
    300
}

const fn default_wait_timeout_ms() -> u64 {
    5000
}

/// One DOM query used to read a text field.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldStrategy {
    /// CSS selector.
    pub selector: String,
    /// Read this attribute instead of the element text.
    #[serde(default)]
    pub attribute: Option<String>,
    /// Prefix removed from the value (e.g., `"Address:"`).
    #[serde(default)]
    pub strip_prefix: Option<String>,
    /// Suffix removed from the value (e.g., `" - Google Maps"`).
    #[serde(default)]
    pub strip_suffix: Option<String>,
    /// Regex the value must match; the first capture group is kept.
    #[serde(default)]
    pub pattern: Option<String>,
}

impl SiteConfig {
    /// Compiles the URL patterns.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] if any pattern is invalid.
    pub fn compile_patterns(&self) -> Result<Vec<Regex>, regex::Error> {
        self.url_patterns.iter().map(|p| Regex::new(p)).collect()
    }
}

/// Parses a site config from its TOML source.
///
/// # Errors
///
/// Returns [`toml::de::Error`] if the TOML is malformed or missing fields.
pub fn parse_site_toml(toml_str: &str) -> Result<SiteConfig, toml::de::Error> {
    toml::de::from_str(toml_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_site() {
        let site = parse_site_toml(
            r#"
            id = "example"
            name = "Example"
            url_patterns = ['^https://example\.com/']

            [coordinates]
            type = "page_url"
            "#,
        )
        .unwrap();

        assert_eq!(site.id, "example");
        assert!(matches!(site.coordinates, CoordinateSource::PageUrl));
        assert!(site.title.is_empty());
    }

    #[test]
    fn static_map_defaults_timings() {
        let site = parse_site_toml(
            r#"
            id = "example"
            name = "Example"
            url_patterns = []

            [coordinates]
            type = "static_map"
            map_containers = [".map"]
            image_selector = "img"
            "#,
        )
        .unwrap();

        let CoordinateSource::StaticMap {
            settle_ms,
            wait_timeout_ms,
            ..
        } = site.coordinates
        else {
            panic!("expected static_map");
        };
        assert_eq!(settle_ms, 300);
        assert_eq!(wait_timeout_ms, 5000);
    }
}
