//! Waking lazy loaders and waiting for the DOM to settle.
//!
//! Listing sites defer map previews until they scroll into view. Before
//! querying for those elements, [`trigger_lazy_load`] makes them look
//! visible to intersection-observer based loaders, then [`wait_for`]
//! polls the page until a predicate holds or a timeout elapses.

use std::time::Duration;

use scraper::Html;

use crate::ExtractError;
use crate::dom::parse_selector;
use crate::host::PageHost;

/// Default interval between DOM snapshots while waiting.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

const WINDOW_EVENTS: &[&str] = &["scroll", "resize"];
const ELEMENT_EVENTS: &[&str] = &["appear", "inview"];

/// Nudges lazy loaders attached to `containers`.
///
/// Dispatches `scroll`/`resize` on the window, moves every matched
/// container into the viewport, dispatches `appear`/`inview` on them,
/// forces a reflow, waits `settle`, and finally restores the original
/// positioning. Restoration runs even when an earlier step fails.
///
/// # Errors
///
/// Returns the first [`ExtractError`] raised by the host.
pub async fn trigger_lazy_load(
    page: &dyn PageHost,
    containers: &[String],
    settle: Duration,
) -> Result<(), ExtractError> {
    for event in WINDOW_EVENTS {
        page.dispatch_window_event(event).await?;
    }

    let mut saved = Vec::new();
    let mut outcome = Ok(());

    for selector in containers {
        match page.reposition_into_viewport(selector).await {
            Ok(positions) => saved.extend(positions),
            Err(e) => {
                outcome = Err(e);
                break;
            }
        }
    }

    if outcome.is_ok() {
        outcome = nudge(page, containers, settle).await;
    }

    let restored = if saved.is_empty() {
        Ok(())
    } else {
        page.restore_positions(saved).await
    };

    outcome.and(restored)
}

async fn nudge(
    page: &dyn PageHost,
    containers: &[String],
    settle: Duration,
) -> Result<(), ExtractError> {
    for selector in containers {
        for event in ELEMENT_EVENTS {
            page.dispatch_element_event(selector, event).await?;
        }
    }
    page.force_reflow().await?;
    tokio::time::sleep(settle).await;
    Ok(())
}

fn probe_snapshot<T>(snapshot: &str, probe: &mut impl FnMut(&Html) -> Option<T>) -> Option<T> {
    let document = Html::parse_document(snapshot);
    probe(&document)
}

/// Waits until `probe` returns `Some` for a DOM snapshot.
///
/// Each round takes a fresh snapshot, runs the probe, and otherwise
/// sleeps until the host reports a change or `poll` elapses.
///
/// # Errors
///
/// Returns [`ExtractError::ElementNotReady`] once `timeout` elapses, or
/// any host error raised while snapshotting.
pub async fn wait_for<T, F>(
    page: &dyn PageHost,
    what: &str,
    timeout: Duration,
    poll: Duration,
    mut probe: F,
) -> Result<T, ExtractError>
where
    T: Send,
    F: FnMut(&Html) -> Option<T> + Send,
{
    let started = tokio::time::Instant::now();

    loop {
        let snapshot = page.snapshot().await?;
        if let Some(found) = probe_snapshot(&snapshot, &mut probe) {
            return Ok(found);
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            log::debug!("Gave up waiting for {what} after {elapsed:?}");
            return Err(ExtractError::ElementNotReady {
                what: what.to_owned(),
                waited: timeout,
            });
        }

        page.wait_for_change(poll.min(timeout - elapsed)).await;
    }
}

/// Attributes of an element found by [`wait_for_element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundElement {
    /// The `src` attribute, if any.
    pub src: Option<String>,
    /// The inline `style` attribute, if any.
    pub style: Option<String>,
}

fn has_background_image(style: &str) -> bool {
    style.contains("background-image") && style.contains("url(")
}

/// Waits for the first element matching `selector`, optionally requiring
/// an inline `background-image: url(...)`.
///
/// # Errors
///
/// Returns [`ExtractError::InvalidSelector`] for a bad selector, or
/// [`ExtractError::ElementNotReady`] on timeout.
pub async fn wait_for_element(
    page: &dyn PageHost,
    selector: &str,
    require_background_image: bool,
    timeout: Duration,
) -> Result<FoundElement, ExtractError> {
    parse_selector(selector)?;

    wait_for(page, selector, timeout, DEFAULT_POLL_INTERVAL, |document| {
        let sel = parse_selector(selector).ok()?;
        document.select(&sel).find_map(|el| {
            let style = el.value().attr("style").map(str::to_owned);
            if require_background_image && !style.as_deref().is_some_and(has_background_image) {
                return None;
            }
            Some(FoundElement {
                src: el.value().attr("src").map(str::to_owned),
                style,
            })
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostEvent, StaticPage};

    #[tokio::test]
    async fn trigger_runs_steps_in_order() {
        let page = StaticPage::new("https://example.com", r#"<div class="map"></div>"#);
        trigger_lazy_load(&page, &[".map".to_owned()], Duration::from_millis(1))
            .await
            .unwrap();

        assert_eq!(
            page.events(),
            vec![
                HostEvent::Window("scroll".into()),
                HostEvent::Window("resize".into()),
                HostEvent::Reposition {
                    selector: ".map".into(),
                    count: 1
                },
                HostEvent::Element {
                    selector: ".map".into(),
                    event: "appear".into()
                },
                HostEvent::Element {
                    selector: ".map".into(),
                    event: "inview".into()
                },
                HostEvent::Reflow,
                HostEvent::Restore { count: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn restores_even_when_a_step_fails() {
        let page = StaticPage::new("https://example.com", r#"<div class="map"></div>"#);
        let err = trigger_lazy_load(
            &page,
            &[".map".to_owned(), "[[".to_owned()],
            Duration::from_millis(1),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ExtractError::InvalidSelector { .. }));
        assert_eq!(page.events().last(), Some(&HostEvent::Restore { count: 1 }));
    }

    #[tokio::test]
    async fn wait_times_out() {
        let page = StaticPage::new("https://example.com", "<p></p>");
        let err = wait_for_element(&page, "img", false, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::ElementNotReady { .. }));
    }

    #[tokio::test]
    async fn wait_requires_background_image() {
        let page = StaticPage::new(
            "https://example.com",
            r#"<div class="pin" style="color: red"></div>
               <div class="pin" style="background-image: url(map.png)"></div>"#,
        );
        let found = wait_for_element(&page, ".pin", true, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(
            found.style.as_deref(),
            Some("background-image: url(map.png)")
        );
    }

    #[tokio::test]
    async fn lazy_content_appears_after_trigger() {
        let page = StaticPage::new("https://example.com", r#"<div class="map"></div>"#)
            .with_lazy_html(r#"<div class="map"><img src="staticmap?center=1,2"></div>"#);

        assert!(
            wait_for_element(&page, "img", false, Duration::from_millis(20))
                .await
                .is_err()
        );

        trigger_lazy_load(&page, &[".map".to_owned()], Duration::from_millis(1))
            .await
            .unwrap();
        let found = wait_for_element(&page, "img", false, Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(found.src.as_deref(), Some("staticmap?center=1,2"));
    }
}
