//! Query-string encoding of the view state.
//!
//! Format: one `filter=<property>:<value>,<value>` pair per active filter,
//! then optional `group=<property>` and `direction=asc|desc`. Property
//! names and values are form-encoded individually so `:`, `,`, and `&`
//! inside names survive the round trip.

use notion_map_location_models::{FilterState, SortDirection};
use url::form_urlencoded;

/// Filter, group, and sort state carried in a share URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlState {
    /// Active filters in URL order.
    pub filters: Vec<FilterState>,
    /// Group property.
    pub group_by: Option<String>,
    /// Sort direction.
    pub direction: SortDirection,
}

fn encode(component: &str) -> String {
    form_urlencoded::byte_serialize(component.as_bytes()).collect()
}

fn decode(component: &str) -> String {
    form_urlencoded::parse(component.as_bytes())
        .next()
        .map(|(decoded, _)| decoded.into_owned())
        .unwrap_or_default()
}

/// Encodes the view state as a query string (without the leading `?`).
///
/// Filters without values are omitted.
#[must_use]
pub fn create_url_from_filters(
    filters: &[FilterState],
    group_by: Option<&str>,
    direction: SortDirection,
) -> String {
    let mut pairs: Vec<String> = filters
        .iter()
        .filter(|f| f.is_active() && !f.property.is_empty())
        .map(|f| {
            let values: Vec<String> = f.values.iter().map(|v| encode(v)).collect();
            format!("filter={}:{}", encode(&f.property), values.join(","))
        })
        .collect();

    if let Some(group) = group_by.filter(|g| !g.is_empty()) {
        pairs.push(format!("group={}", encode(group)));
    }
    pairs.push(format!("direction={direction}"));

    pairs.join("&")
}

/// Decodes a query string produced by [`create_url_from_filters`].
///
/// A leading `?` is accepted. Malformed segments (no `:`, empty property,
/// no values, unknown direction) are dropped. A property repeated in
/// several `filter` pairs keeps its last occurrence.
#[must_use]
pub fn parse_filters_from_url(query: &str) -> UrlState {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut state = UrlState::default();

    for segment in query.split('&').filter(|s| !s.is_empty()) {
        let (key, value) = segment.split_once('=').unwrap_or((segment, ""));

        match decode(key).as_str() {
            "filter" => {
                let Some((property, values)) = value.split_once(':') else {
                    log::debug!("Dropping malformed filter segment '{value}'");
                    continue;
                };
                let property = decode(property);
                let values: Vec<String> = values
                    .split(',')
                    .map(decode)
                    .filter(|v| !v.is_empty())
                    .collect();
                if property.is_empty() || values.is_empty() {
                    log::debug!("Dropping empty filter segment '{value}'");
                    continue;
                }
                state.filters.retain(|f| f.property != property);
                state.filters.push(FilterState { property, values });
            }
            "group" => {
                let group = decode(value);
                state.group_by = (!group.is_empty()).then_some(group);
            }
            "direction" => match decode(value).parse() {
                Ok(direction) => state.direction = direction,
                Err(_) => log::debug!("Ignoring unknown sort direction '{value}'"),
            },
            _ => {}
        }
    }

    state
}
