//! Shared view state.
//!
//! [`ViewStore`] is an explicit context object handed to whatever needs
//! the current filter/group/sort state. Every write replaces the whole
//! [`ViewState`], so subscribers only ever observe complete transitions.

use notion_map_location_models::{FilterState, SortDirection};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::url_state::{UrlState, create_url_from_filters, parse_filters_from_url};

/// Everything that decides what the map currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    /// Active filters.
    #[serde(default)]
    pub filters: Vec<FilterState>,
    /// Group property.
    #[serde(default)]
    pub group_by: Option<String>,
    /// Sort direction for groups and list.
    #[serde(default)]
    pub direction: SortDirection,
    /// Id of the highlighted location.
    #[serde(default)]
    pub selected: Option<String>,
}

impl ViewState {
    /// Restores filter, group, and sort state from a query string.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let UrlState {
            filters,
            group_by,
            direction,
        } = parse_filters_from_url(query);
        Self {
            filters,
            group_by,
            direction,
            selected: None,
        }
    }

    /// Query string for a share URL.
    #[must_use]
    pub fn to_query(&self) -> String {
        create_url_from_filters(&self.filters, self.group_by.as_deref(), self.direction)
    }

    /// Copy with the values for one property replaced. Empty `values`
    /// clears the filter.
    #[must_use]
    pub fn with_filter(&self, property: &str, values: Vec<String>) -> Self {
        let mut next = self.clone();
        next.filters.retain(|f| f.property != property);
        if !values.is_empty() {
            next.filters.push(FilterState {
                property: property.to_owned(),
                values,
            });
        }
        next
    }
}

/// Holder of the current [`ViewState`] with change notification.
#[derive(Debug, Clone)]
pub struct ViewStore {
    sender: watch::Sender<ViewState>,
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new(ViewState::default())
    }
}

impl ViewStore {
    /// Creates a store with an initial state.
    #[must_use]
    pub fn new(initial: ViewState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// A copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ViewState {
        self.sender.borrow().clone()
    }

    /// Receiver that is notified on every replacement.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.sender.subscribe()
    }

    /// Replaces the whole state.
    pub fn replace(&self, state: ViewState) {
        self.sender.send_replace(state);
    }

    /// Derives the next state from the current one and replaces it.
    pub fn update(&self, f: impl FnOnce(&ViewState) -> ViewState) {
        let next = f(&self.sender.borrow());
        self.replace(next);
    }
}
