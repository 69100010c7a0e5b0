//! Geographic bounds derived from a set of locations.

use geo::{BoundingRect, MultiPoint, Point, Rect};
use notion_map_location_models::Location;
use serde::Serialize;

/// Smallest span, in degrees, a bounds box is given on each axis so a
/// single point still yields a usable viewport.
pub const MIN_SPAN_DEGREES: f64 = 0.001;

/// A latitude/longitude box and its center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapBounds {
    /// Southern latitude.
    pub south: f64,
    /// Western longitude.
    pub west: f64,
    /// Northern latitude.
    pub north: f64,
    /// Eastern longitude.
    pub east: f64,
    /// Center `[lat, lng]`.
    pub center: [f64; 2],
}

impl MapBounds {
    fn from_rect(rect: Rect<f64>) -> Self {
        let center = rect.center();
        Self {
            south: rect.min().y,
            west: rect.min().x,
            north: rect.max().y,
            east: rect.max().x,
            center: [center.y, center.x],
        }
    }

    /// Grows each side by `ratio` of the box's width or height.
    #[must_use]
    pub fn pad(self, ratio: f64) -> Self {
        let dy = (self.north - self.south) * ratio;
        let dx = (self.east - self.west) * ratio;
        Self {
            south: (self.south - dy).max(-90.0),
            west: self.west - dx,
            north: (self.north + dy).min(90.0),
            east: self.east + dx,
            center: self.center,
        }
    }

    /// Returns `true` if the point lies inside the box.
    #[must_use]
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.south..=self.north).contains(&lat) && (self.west..=self.east).contains(&lng)
    }
}

fn widen(rect: Rect<f64>) -> Rect<f64> {
    let (min, max) = (rect.min(), rect.max());
    let half_x = ((MIN_SPAN_DEGREES - rect.width()) / 2.0).max(0.0);
    let half_y = ((MIN_SPAN_DEGREES - rect.height()) / 2.0).max(0.0);
    Rect::new(
        (min.x - half_x, min.y - half_y),
        (max.x + half_x, max.y + half_y),
    )
}

/// Bounding box of coordinate pairs given as `(lat, lng)`.
#[must_use]
pub fn bounds_of(points: impl IntoIterator<Item = (f64, f64)>) -> Option<MapBounds> {
    let points: MultiPoint<f64> = points
        .into_iter()
        .filter(|(lat, lng)| lat.is_finite() && lng.is_finite())
        .map(|(lat, lng)| Point::new(lng, lat))
        .collect::<Vec<_>>()
        .into();

    points.bounding_rect().map(|rect| MapBounds::from_rect(widen(rect)))
}

/// Bounds and center of every location, or `None` for an empty list.
#[must_use]
pub fn compute_bounds(locations: &[Location]) -> Option<MapBounds> {
    bounds_of(locations.iter().map(|l| (l.lat, l.lng)))
}
