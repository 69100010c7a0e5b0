//! The page an adapter runs against.
//!
//! [`PageHost`] is the seam between extraction logic and the host
//! environment (a browser content script, a headless driver, or a fixed
//! HTML snapshot). Adapters only ever see serialized DOM snapshots plus a
//! handful of side-effecting operations used to wake lazy loaders.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use scraper::Html;

use crate::ExtractError;
use crate::dom::parse_selector;

/// Original positioning of an element moved into the viewport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPosition {
    /// Selector the element was matched by.
    pub selector: String,
    /// Index of the element among the selector's matches.
    pub index: usize,
    /// The element's inline `style` before it was moved.
    pub style: Option<String>,
}

/// Host-environment operations available to adapters.
#[async_trait]
pub trait PageHost: Send + Sync {
    /// Current page URL.
    fn url(&self) -> String;

    /// Serializes the current DOM.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Host`] if the host cannot read the DOM.
    async fn snapshot(&self) -> Result<String, ExtractError>;

    /// Dispatches a synthetic event on the window (e.g., `scroll`).
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Host`] if dispatch fails.
    async fn dispatch_window_event(&self, event: &str) -> Result<(), ExtractError>;

    /// Dispatches a synthetic event on every element matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] if the selector is invalid or dispatch fails.
    async fn dispatch_element_event(&self, selector: &str, event: &str)
    -> Result<(), ExtractError>;

    /// Moves every element matching `selector` into the viewport
    /// (off-screen but intersecting) and returns what is needed to put
    /// them back.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] if the selector is invalid or the host
    /// rejects the style change.
    async fn reposition_into_viewport(
        &self,
        selector: &str,
    ) -> Result<Vec<SavedPosition>, ExtractError>;

    /// Restores elements moved by [`Self::reposition_into_viewport`].
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Host`] if the host rejects the style change.
    async fn restore_positions(&self, saved: Vec<SavedPosition>) -> Result<(), ExtractError>;

    /// Forces a synchronous layout pass.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Host`] if the host cannot reflow.
    async fn force_reflow(&self) -> Result<(), ExtractError>;

    /// Resolves when the DOM may have changed, or after `max`.
    ///
    /// Hosts with mutation notifications should override this; the
    /// default simply sleeps, which turns waits into polling.
    async fn wait_for_change(&self, max: Duration) {
        tokio::time::sleep(max).await;
    }
}

/// A host-side operation recorded by [`StaticPage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Window-level synthetic event.
    Window(String),
    /// Element-level synthetic event.
    Element {
        /// Target selector.
        selector: String,
        /// Event name.
        event: String,
    },
    /// Elements moved into the viewport.
    Reposition {
        /// Target selector.
        selector: String,
        /// Number of matched elements.
        count: usize,
    },
    /// Elements restored to their original position.
    Restore {
        /// Number of restored elements.
        count: usize,
    },
    /// Forced layout pass.
    Reflow,
}

/// A [`PageHost`] backed by a fixed HTML snapshot.
///
/// An optional deferred snapshot models a lazy loader: it replaces the
/// current HTML on the first reflow that happens while at least one
/// element sits repositioned in the viewport.
pub struct StaticPage {
    url: String,
    html: Mutex<String>,
    deferred: Mutex<Option<String>>,
    in_viewport: Mutex<usize>,
    events: Mutex<Vec<HostEvent>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StaticPage {
    /// Creates a page from a URL and its HTML.
    #[must_use]
    pub fn new(url: &str, html: &str) -> Self {
        Self {
            url: url.to_owned(),
            html: Mutex::new(html.to_owned()),
            deferred: Mutex::new(None),
            in_viewport: Mutex::new(0),
            events: Mutex::new(Vec::new()),
        }
    }

    /// HTML that appears once the page's lazy loader fires.
    #[must_use]
    pub fn with_lazy_html(self, html: &str) -> Self {
        *lock(&self.deferred) = Some(html.to_owned());
        self
    }

    /// Downloads a page and wraps its HTML. The final URL after redirects
    /// becomes the page URL.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Http`] if the request fails or the server
    /// returns an error status.
    pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<Self, ExtractError> {
        log::debug!("Fetching page snapshot from {url}");
        let response = client.get(url).send().await?.error_for_status()?;
        let final_url = response.url().to_string();
        let body = response.text().await?;
        Ok(Self::new(&final_url, &body))
    }

    /// Host operations performed so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<HostEvent> {
        lock(&self.events).clone()
    }

    fn record(&self, event: HostEvent) {
        lock(&self.events).push(event);
    }

    fn inline_styles(&self, selector: &str) -> Result<Vec<Option<String>>, ExtractError> {
        let sel = parse_selector(selector)?;
        let html = lock(&self.html).clone();
        let document = Html::parse_document(&html);
        Ok(document
            .select(&sel)
            .map(|el| el.value().attr("style").map(str::to_owned))
            .collect())
    }
}

#[async_trait]
impl PageHost for StaticPage {
    fn url(&self) -> String {
        self.url.clone()
    }

    async fn snapshot(&self) -> Result<String, ExtractError> {
        Ok(lock(&self.html).clone())
    }

    async fn dispatch_window_event(&self, event: &str) -> Result<(), ExtractError> {
        self.record(HostEvent::Window(event.to_owned()));
        Ok(())
    }

    async fn dispatch_element_event(
        &self,
        selector: &str,
        event: &str,
    ) -> Result<(), ExtractError> {
        parse_selector(selector)?;
        self.record(HostEvent::Element {
            selector: selector.to_owned(),
            event: event.to_owned(),
        });
        Ok(())
    }

    async fn reposition_into_viewport(
        &self,
        selector: &str,
    ) -> Result<Vec<SavedPosition>, ExtractError> {
        let saved: Vec<SavedPosition> = self
            .inline_styles(selector)?
            .into_iter()
            .enumerate()
            .map(|(index, style)| SavedPosition {
                selector: selector.to_owned(),
                index,
                style,
            })
            .collect();

        *lock(&self.in_viewport) += saved.len();
        self.record(HostEvent::Reposition {
            selector: selector.to_owned(),
            count: saved.len(),
        });
        Ok(saved)
    }

    async fn restore_positions(&self, saved: Vec<SavedPosition>) -> Result<(), ExtractError> {
        {
            let mut in_viewport = lock(&self.in_viewport);
            *in_viewport = in_viewport.saturating_sub(saved.len());
        }
        self.record(HostEvent::Restore { count: saved.len() });
        Ok(())
    }

    async fn force_reflow(&self) -> Result<(), ExtractError> {
        self.record(HostEvent::Reflow);
        if *lock(&self.in_viewport) > 0
            && let Some(html) = lock(&self.deferred).take()
        {
            log::debug!("Lazy content loaded for {}", self.url);
            *lock(&self.html) = html;
        }
        Ok(())
    }
}
