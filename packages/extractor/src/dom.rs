//! DOM query helpers shared by the adapters.
//!
//! Field strategies are tried in order and the first non-empty value
//! wins. A strategy with a bad selector or pattern is skipped with a
//! warning rather than failing the whole extraction.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::ExtractError;
use crate::site::FieldStrategy;

/// Parses a CSS selector.
///
/// # Errors
///
/// Returns [`ExtractError::InvalidSelector`] if the selector does not parse.
pub fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::InvalidSelector {
        selector: selector.to_owned(),
        message: e.to_string(),
    })
}

/// Concatenated text content of an element with whitespace collapsed.
#[must_use]
pub fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn raw_value(element: &ElementRef<'_>, strategy: &FieldStrategy) -> Option<String> {
    match strategy.attribute.as_deref() {
        Some(attr) => element
            .value()
            .attr(attr)
            .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" ")),
        None => Some(element_text(element)),
    }
}

fn clean_value(value: &str, strategy: &FieldStrategy) -> Option<String> {
    let mut value = value.trim();

    if let Some(prefix) = strategy.strip_prefix.as_deref() {
        value = value.strip_prefix(prefix).unwrap_or(value).trim_start();
    }
    if let Some(suffix) = strategy.strip_suffix.as_deref() {
        value = value.strip_suffix(suffix).unwrap_or(value).trim_end();
    }

    let value = match strategy.pattern.as_deref() {
        Some(pattern) => {
            let re = match Regex::new(pattern) {
                Ok(re) => re,
                Err(e) => {
                    log::warn!("Skipping invalid field pattern '{pattern}': {e}");
                    return None;
                }
            };
            let caps = re.captures(value)?;
            caps.get(1).or_else(|| caps.get(0))?.as_str().trim().to_owned()
        }
        None => value.to_owned(),
    };

    (!value.is_empty()).then_some(value)
}

/// All non-empty values a single strategy yields, in document order.
#[must_use]
pub fn strategy_values(document: &Html, strategy: &FieldStrategy) -> Vec<String> {
    let selector = match parse_selector(&strategy.selector) {
        Ok(sel) => sel,
        Err(e) => {
            log::warn!("Skipping field strategy: {e}");
            return Vec::new();
        }
    };

    document
        .select(&selector)
        .filter_map(|el| raw_value(&el, strategy))
        .filter_map(|v| clean_value(&v, strategy))
        .collect()
}

/// Runs strategies in priority order and returns the first hit, or an
/// empty string when every strategy misses.
#[must_use]
pub fn first_match(document: &Html, strategies: &[FieldStrategy], field: &str) -> String {
    for (i, strategy) in strategies.iter().enumerate() {
        if let Some(value) = strategy_values(document, strategy).into_iter().next() {
            log::trace!("{field} matched strategy {i} ({})", strategy.selector);
            return value;
        }
    }
    log::debug!("No {field} strategy matched; leaving it empty");
    String::new()
}

/// Collects every value of every strategy, deduplicated, in order.
#[must_use]
pub fn all_matches(document: &Html, strategies: &[FieldStrategy]) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for strategy in strategies {
        for value in strategy_values(document, strategy) {
            if !values.contains(&value) {
                values.push(value);
            }
        }
    }
    values
}

/// Derives the city from a comma-separated postal address.
///
/// `"1 Ferry Building, San Francisco, CA 94111"` and
/// `"1 Ferry Building, San Francisco, CA 94111, USA"` both yield
/// `"San Francisco"`.
#[must_use]
pub fn city_from_address(address: &str) -> Option<String> {
    let parts: Vec<&str> = address
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let ends_with_country = parts
        .last()
        .is_some_and(|last| !last.chars().any(|c| c.is_ascii_digit()));

    let idx = match (parts.len(), ends_with_country) {
        (n, true) if n >= 4 => n - 3,
        (n, false) if n >= 3 => n - 2,
        _ => return None,
    };

    let city = parts[idx].trim_start_matches(|c: char| c.is_ascii_digit() || c == ' ');
    (!city.is_empty()).then(|| city.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy(selector: &str) -> FieldStrategy {
        FieldStrategy {
            selector: selector.to_owned(),
            attribute: None,
            strip_prefix: None,
            strip_suffix: None,
            pattern: None,
        }
    }

    #[test]
    fn first_match_respects_priority() {
        let doc = Html::parse_document(
            r#"<div role="main" aria-label="Blue Bottle Coffee"><h1>Blue  Bottle
            </h1></div>"#,
        );
        let strategies = vec![
            FieldStrategy {
                attribute: Some("aria-label".into()),
                ..strategy(r#"div[role="main"]"#)
            },
            strategy("h1"),
        ];
        assert_eq!(first_match(&doc, &strategies, "title"), "Blue Bottle Coffee");
        assert_eq!(first_match(&doc, &strategies[1..], "title"), "Blue Bottle");
    }

    #[test]
    fn missing_field_is_empty_string() {
        let doc = Html::parse_document("<p>nothing</p>");
        assert_eq!(first_match(&doc, &[strategy("h1")], "title"), "");
    }

    #[test]
    fn strips_prefix_and_suffix() {
        let doc = Html::parse_document(
            r#"<title>Tartine - Google Maps</title>
            <button aria-label="Address: 600 Guerrero St, San Francisco, CA 94110"></button>"#,
        );
        let title = FieldStrategy {
            strip_suffix: Some(" - Google Maps".into()),
            ..strategy("title")
        };
        let address = FieldStrategy {
            attribute: Some("aria-label".into()),
            strip_prefix: Some("Address:".into()),
            ..strategy("button")
        };
        assert_eq!(first_match(&doc, &[title], "title"), "Tartine");
        assert_eq!(
            first_match(&doc, &[address], "address"),
            "600 Guerrero St, San Francisco, CA 94110"
        );
    }

    #[test]
    fn pattern_filters_free_text() {
        let doc = Html::parse_document(
            r#"<div class="x">Open 24 hours</div>
               <div class="x">600 Guerrero St, San Francisco, CA 94110</div>"#,
        );
        let s = FieldStrategy {
            pattern: Some(r"^(\d+[^,]*,[^,]+,.+)$".into()),
            ..strategy(".x")
        };
        assert_eq!(
            first_match(&doc, &[s], "address"),
            "600 Guerrero St, San Francisco, CA 94110"
        );
    }

    #[test]
    fn invalid_selector_is_skipped() {
        let doc = Html::parse_document("<h1>Title</h1>");
        assert_eq!(
            first_match(&doc, &[strategy("[["), strategy("h1")], "title"),
            "Title"
        );
    }

    #[test]
    fn all_matches_dedups() {
        let doc = Html::parse_document("<a>Cafe</a><a>Bakery</a><a>Cafe</a>");
        assert_eq!(all_matches(&doc, &[strategy("a")]), vec!["Cafe", "Bakery"]);
    }

    #[test]
    fn derives_city() {
        assert_eq!(
            city_from_address("1 Ferry Building, San Francisco, CA 94111").as_deref(),
            Some("San Francisco")
        );
        assert_eq!(
            city_from_address("1 Ferry Building, San Francisco, CA 94111, USA").as_deref(),
            Some("San Francisco")
        );
        assert_eq!(city_from_address("Somewhere"), None);
    }
}
