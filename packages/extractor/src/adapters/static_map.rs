//! Adapter for sites that render a static-map image of the listing.

use std::time::Duration;

use async_trait::async_trait;
use notion_map_location_models::LocationData;

use super::{SiteMatcher, assemble};
use crate::coords::{coordinates_from_static_map, coordinates_from_url};
use crate::host::PageHost;
use crate::lazy_load::{trigger_lazy_load, wait_for_element};
use crate::site::{CoordinateSource, SiteConfig};
use crate::{ExtractError, Extractor};

/// Wakes the map lazy loader, waits for the static-map `<img>`, and reads
/// the `center` or `markers` parameter of its URL.
pub struct StaticMapExtractor {
    matcher: SiteMatcher,
}

impl StaticMapExtractor {
    /// Creates the adapter.
    #[must_use]
    pub const fn new(matcher: SiteMatcher) -> Self {
        Self { matcher }
    }
}

#[async_trait]
impl Extractor for StaticMapExtractor {
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
        let CoordinateSource::StaticMap {
            map_containers,
            image_selector,
            settle_ms,
            wait_timeout_ms,
        } = &site.coordinates
        else {
            return Err(ExtractError::Host(format!(
                "{} is not configured for static maps",
                site.id
            )));
        };

        trigger_lazy_load(page, map_containers, Duration::from_millis(*settle_ms)).await?;

        let image_src = match wait_for_element(
            page,
            image_selector,
            false,
            Duration::from_millis(*wait_timeout_ms),
        )
        .await
        {
            Ok(found) => found.src,
            Err(ExtractError::ElementNotReady { what, waited }) => {
                log::warn!("{}: static map '{what}' not ready after {waited:?}", site.name);
                None
            }
            Err(e) => return Err(e),
        };

        let coords = image_src
            .as_deref()
            .and_then(coordinates_from_static_map)
            .or_else(|| coordinates_from_url(&page.url()))
            .ok_or_else(|| ExtractError::CoordinatesNotFound {
                site: site.name.clone(),
            })?;

        let snapshot = page.snapshot().await?;
        Ok(assemble(&snapshot, site, coords))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StaticPage;
    use crate::registry::site_by_id;

    fn extractor() -> StaticMapExtractor {
        let mut site = site_by_id("yelp");
        if let CoordinateSource::StaticMap {
            settle_ms,
            wait_timeout_ms,
            ..
        } = &mut site.coordinates
        {
            *settle_ms = 1;
            *wait_timeout_ms = 50;
        }
        StaticMapExtractor::new(SiteMatcher::new(site).unwrap())
    }

    const BEFORE_SCROLL: &str = r#"
        <html><body>
          <h1>Blue Bottle Coffee</h1>
          <span data-testid="BizHeaderCategory"><a>Coffee &amp; Tea</a><a>Cafes</a></span>
          <div class="mapContainer__x"></div>
          <address>1 Ferry Building, San Francisco, CA 94111</address>
        </body></html>"#;

    const AFTER_SCROLL: &str = r#"
        <html><body>
          <h1>Blue Bottle Coffee</h1>
          <span data-testid="BizHeaderCategory"><a>Coffee &amp; Tea</a><a>Cafes</a></span>
          <div class="mapContainer__x">
            <img src="https://maps.googleapis.com/maps/api/staticmap?size=315x150&amp;center=37.795500%2C-122.393700&amp;zoom=15">
          </div>
          <address>1 Ferry Building, San Francisco, CA 94111</address>
        </body></html>"#;

    #[tokio::test]
    async fn extracts_after_lazy_load() {
        let page = StaticPage::new("https://www.yelp.com/biz/blue-bottle-coffee-sf", BEFORE_SCROLL)
            .with_lazy_html(AFTER_SCROLL);

        let data = extractor().extract_location_data(&page).await.unwrap();

        assert_eq!(data.title, "Blue Bottle Coffee");
        assert_eq!(data.address, "1 Ferry Building, San Francisco, CA 94111");
        assert_eq!(data.latitude, "37.795500");
        assert_eq!(data.longitude, "-122.393700");
        assert_eq!(data.tags, vec!["Coffee & Tea", "Cafes"]);
    }

    #[tokio::test]
    async fn missing_map_is_coordinates_not_found() {
        let page = StaticPage::new("https://www.yelp.com/biz/blue-bottle-coffee-sf", BEFORE_SCROLL);
        let err = extractor().extract_location_data(&page).await.unwrap_err();
        assert!(matches!(err, ExtractError::CoordinatesNotFound { .. }));
    }
}
