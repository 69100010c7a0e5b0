//! Adapter implementations, one per coordinate encoding.
//!
//! Every site config is served by the adapter matching its
//! `[coordinates]` type; title, address, and tag strategies are shared.

pub mod background_image;
pub mod page_url;
pub mod static_map;

use std::collections::BTreeMap;

use notion_map_location_models::LocationData;
use regex::Regex;
use scraper::Html;

use crate::Extractor;
use crate::coords::Coordinates;
use crate::dom::{all_matches, city_from_address, first_match};
use crate::site::{CoordinateSource, SiteConfig};

pub use background_image::BackgroundImageExtractor;
pub use page_url::PageUrlExtractor;
pub use static_map::StaticMapExtractor;

/// A site config with its URL patterns compiled.
#[derive(Debug, Clone)]
pub struct SiteMatcher {
    site: SiteConfig,
    patterns: Vec<Regex>,
}

impl SiteMatcher {
    /// Compiles the site's URL patterns.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] if any pattern is invalid.
    pub fn new(site: SiteConfig) -> Result<Self, regex::Error> {
        let patterns = site.compile_patterns()?;
        Ok(Self { site, patterns })
    }

    /// The underlying config.
    #[must_use]
    pub const fn site(&self) -> &SiteConfig {
        &self.site
    }

    /// Returns `true` if any pattern matches `url`.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(url))
    }
}

/// Builds the adapter for a site config.
///
/// # Errors
///
/// Returns [`regex::Error`] if the site's URL patterns are invalid.
pub fn build_extractor(site: SiteConfig) -> Result<Box<dyn Extractor>, regex::Error> {
    let extractor: Box<dyn Extractor> = match &site.coordinates {
        CoordinateSource::PageUrl => Box::new(PageUrlExtractor::new(SiteMatcher::new(site)?)),
        CoordinateSource::StaticMap { .. } => {
            Box::new(StaticMapExtractor::new(SiteMatcher::new(site)?))
        }
        CoordinateSource::BackgroundImage { .. } => {
            Box::new(BackgroundImageExtractor::new(SiteMatcher::new(site)?))
        }
    };
    Ok(extractor)
}

/// Reads the text fields from a snapshot and combines them with the
/// coordinates into a record.
pub(crate) fn assemble(snapshot: &str, site: &SiteConfig, coords: Coordinates) -> LocationData {
    let document = Html::parse_document(snapshot);
    let title = first_match(&document, &site.title, "title");
    let address = first_match(&document, &site.address, "address");
    let tags = all_matches(&document, &site.tags);
    let city = city_from_address(&address);

    log::debug!(
        "Extracted '{title}' at {},{} from {}",
        coords.latitude,
        coords.longitude,
        site.name
    );

    LocationData {
        title,
        address,
        latitude: coords.latitude,
        longitude: coords.longitude,
        emoji: site.emoji.clone(),
        tags,
        city,
        extra: BTreeMap::new(),
    }
}
