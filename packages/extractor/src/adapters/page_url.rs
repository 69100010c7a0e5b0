//! Adapter for sites that encode the selected place in the page URL.

use async_trait::async_trait;
use notion_map_location_models::LocationData;

use super::{SiteMatcher, assemble};
use crate::coords::coordinates_from_url;
use crate::host::PageHost;
use crate::site::SiteConfig;
use crate::{ExtractError, Extractor};

/// Reads `!3d…!4d…` markers (or `@lat,lng`) from the URL and the text
/// fields from the DOM.
pub struct PageUrlExtractor {
    matcher: SiteMatcher,
}

impl PageUrlExtractor {
    /// Creates the adapter.
    #[must_use]
    pub const fn new(matcher: SiteMatcher) -> Self {
        Self { matcher }
    }
}

#[async_trait]
impl Extractor for PageUrlExtractor {
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
        let coords =
            coordinates_from_url(&page.url()).ok_or_else(|| ExtractError::CoordinatesNotFound {
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

    fn extractor() -> PageUrlExtractor {
        PageUrlExtractor::new(SiteMatcher::new(site_by_id("google_maps")).unwrap())
    }

    const PLACE_HTML: &str = r#"
        <html><head><title>Tartine Bakery - Google Maps</title></head>
        <body>
          <div role="main" aria-label="Tartine Bakery">
            <h1 class="DUwDvf">Tartine Bakery</h1>
            <button jsaction="pane.rating.category">Bakery</button>
            <button data-item-id="address"
                    aria-label="Address: 600 Guerrero St, San Francisco, CA 94110"></button>
          </div>
        </body></html>"#;

    #[tokio::test]
    async fn extracts_place_page() {
        let page = StaticPage::new(
            "https://www.google.com/maps/place/Tartine/@37.76,-122.42,17z/\
             data=!4m6!3m5!1s0x0:0x0!8m2!3d37.7614!4d-122.4241",
            PLACE_HTML,
        );

        let data = extractor().extract_location_data(&page).await.unwrap();

        assert_eq!(data.title, "Tartine Bakery");
        assert_eq!(data.address, "600 Guerrero St, San Francisco, CA 94110");
        assert_eq!(data.latitude, "37.7614");
        assert_eq!(data.longitude, "-122.4241");
        assert_eq!(data.tags, vec!["Bakery"]);
        assert_eq!(data.city.as_deref(), Some("San Francisco"));
    }

    #[tokio::test]
    async fn falls_back_to_document_title() {
        let page = StaticPage::new(
            "https://www.google.com/maps/place/X/@12.34,56.78,15z",
            "<html><head><title>Some Place - Google Maps</title></head><body></body></html>",
        );

        let data = extractor().extract_location_data(&page).await.unwrap();

        assert_eq!(data.title, "Some Place");
        assert_eq!(data.address, "");
        assert_eq!(data.latitude, "12.34");
        assert_eq!(data.longitude, "56.78");
    }

    #[tokio::test]
    async fn missing_coordinates_is_hard_failure() {
        let page = StaticPage::new("https://www.google.com/maps/search/coffee", PLACE_HTML);
        let err = extractor().extract_location_data(&page).await.unwrap_err();
        assert!(matches!(err, ExtractError::CoordinatesNotFound { .. }));
    }
}
