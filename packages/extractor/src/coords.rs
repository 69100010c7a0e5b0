//! Coordinate parsing for the encodings the supported sites use.
//!
//! Values are returned as the strings found in the source so that no
//! precision is lost; a pair is only accepted if both halves parse as
//! finite numbers inside the valid latitude/longitude ranges.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// `!3d<lat>!4d<lng>` data markers embedded in map URLs.
static MARKER_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!3d(-?\d+(?:\.\d+)?)!4d(-?\d+(?:\.\d+)?)").expect("valid regex")
});

/// `@<lat>,<lng>` viewport center.
static AT_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(-?\d+(?:\.\d+)?),(-?\d+(?:\.\d+)?)").expect("valid regex"));

/// `url(...)` inside a CSS declaration, optionally quoted.
static CSS_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"url\(\s*['"]?([^'")]+)['"]?\s*\)"#).expect("valid regex"));

/// Base used to resolve relative and protocol-relative image URLs.
const RESOLVE_BASE: &str = "https://localhost/";

/// A latitude/longitude pair as found on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coordinates {
    /// Latitude in decimal degrees.
    pub latitude: String,
    /// Longitude in decimal degrees.
    pub longitude: String,
}

impl Coordinates {
    /// Accepts a pair only if both halves are in range.
    #[must_use]
    pub fn parse(latitude: &str, longitude: &str) -> Option<Self> {
        let latitude = latitude.trim();
        let longitude = longitude.trim();
        let lat: f64 = latitude.parse().ok()?;
        let lng: f64 = longitude.parse().ok()?;
        if !lat.is_finite() || !lng.is_finite() || lat.abs() > 90.0 || lng.abs() > 180.0 {
            return None;
        }
        Some(Self {
            latitude: latitude.to_owned(),
            longitude: longitude.to_owned(),
        })
    }

    /// Parses `"lat,lng"`.
    #[must_use]
    pub fn parse_pair(pair: &str) -> Option<Self> {
        let (lat, lng) = pair.split_once(',')?;
        if lng.contains(',') {
            return None;
        }
        Self::parse(lat, lng)
    }
}

/// Reads coordinates from a map page URL.
///
/// The last `!3d…!4d…` marker pair wins since URLs can carry several and
/// the trailing one is the selected place. Without markers the `@lat,lng`
/// viewport center is used.
#[must_use]
pub fn coordinates_from_url(url: &str) -> Option<Coordinates> {
    let from_markers = MARKER_PAIR_RE
        .captures_iter(url)
        .last()
        .and_then(|caps| Coordinates::parse(&caps[1], &caps[2]));

    from_markers.or_else(|| {
        log::debug!("No !3d!4d markers in URL, falling back to @lat,lng");
        AT_PAIR_RE
            .captures(url)
            .and_then(|caps| Coordinates::parse(&caps[1], &caps[2]))
    })
}

fn resolve(src: &str) -> Option<Url> {
    Url::parse(src)
        .or_else(|_| Url::parse(RESOLVE_BASE).and_then(|base| base.join(src)))
        .ok()
}

/// Reads the last `lat,lng` location from a static-map `markers` value
/// such as `color:red|label:A|40.7,-73.9`.
fn marker_coordinates(markers: &str) -> Option<Coordinates> {
    markers
        .split('|')
        .rev()
        .find_map(|segment| Coordinates::parse_pair(segment))
}

/// Reads coordinates from a static-map image URL.
///
/// Prefers the `center` parameter, then the last `markers` location.
#[must_use]
pub fn coordinates_from_static_map(src: &str) -> Option<Coordinates> {
    let url = resolve(src)?;
    let mut center = None;
    let mut markers = Vec::new();

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "center" => center = Some(value.into_owned()),
            "markers" => markers.push(value.into_owned()),
            _ => {}
        }
    }

    center
        .as_deref()
        .and_then(Coordinates::parse_pair)
        .or_else(|| markers.iter().rev().find_map(|m| marker_coordinates(m)))
}

/// Reads coordinates from the marker parameter of a CSS
/// `background-image: url(...)` declaration.
#[must_use]
pub fn coordinates_from_background_image(style: &str) -> Option<Coordinates> {
    let src = CSS_URL_RE.captures(style)?.get(1)?.as_str();
    let url = resolve(src)?;

    url.query_pairs()
        .filter(|(key, _)| key == "markers")
        .map(|(_, value)| value.into_owned())
        .collect::<Vec<_>>()
        .iter()
        .rev()
        .find_map(|m| marker_coordinates(m))
        .or_else(|| coordinates_from_static_map(src))
}
