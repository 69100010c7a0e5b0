//! Adapter for sites that paint the map as a CSS background image.

use std::time::Duration;

use async_trait::async_trait;
use notion_map_location_models::LocationData;

use super::{SiteMatcher, assemble};
use crate::coords::coordinates_from_background_image;
use crate::host::PageHost;
use crate::lazy_load::{trigger_lazy_load, wait_for_element};
use crate::site::{CoordinateSource, SiteConfig};
use crate::{ExtractError, Extractor};

/// Wakes the map lazy loader, waits for an element with a qualifying
/// `background-image`, and reads the marker parameter of that URL.
pub struct BackgroundImageExtractor {
    matcher: SiteMatcher,
}

impl BackgroundImageExtractor {
    /// Creates the adapter.
    #[must_use]
    pub const fn new(matcher: SiteMatcher) -> Self {
        Self { matcher }
    }
}

#[async_trait]
impl Extractor for BackgroundImageExtractor {
    fn site(&self) -> &SiteConfig {
        self.matcher.site()
    }

    fn can_extract(&self, url: &str) -> bool {
        self.matcher.matches(url)
    }

    async fn extract_location_data(
        &self,
        page: &dyn PageHost,
    ) -> Result<LocationData, ExtractError> {
        let site = self.matcher.site();
        let CoordinateSource::BackgroundImage {
            map_containers,
            element_selector,
            settle_ms,
            wait_timeout_ms,
        } = &site.coordinates
        else {
            return Err(ExtractError::Host(format!(
                "{} is not configured for background-image maps",
                site.id
            )));
        };

        trigger_lazy_load(page, map_containers, Duration::from_millis(*settle_ms)).await?;

        let style = match wait_for_element(
            page,
            element_selector,
            true,
            Duration::from_millis(*wait_timeout_ms),
        )
        .await
        {
            Ok(found) => found.style,
            Err(ExtractError::ElementNotReady { what, waited }) => {
                log::warn!("{}: map image '{what}' not ready after {waited:?}", site.name);
                None
            }
            Err(e) => return Err(e),
        };

        let coords = style
            .as_deref()
            .and_then(coordinates_from_background_image)
            .ok_or_else(|| ExtractError::CoordinatesNotFound {
                site: site.name.clone(),
            })?;

        let snapshot = page.snapshot().await?;
        Ok(assemble(&snapshot, site, coords))
    }
}
