//! Pixel-radius marker clustering.
//!
//! Locations are projected to Web-Mercator pixel space at the requested
//! zoom and indexed in an R-tree. Clusters are formed greedily in input
//! order: each unclaimed location absorbs every unclaimed neighbor within
//! [`cluster_radius`] pixels.

use std::f64::consts::PI;

use notion_map_location_models::Location;
use rstar::RTree;
use rstar::primitives::GeomWithData;
use serde::Serialize;

use crate::bounds::{MapBounds, bounds_of};

/// Width of one map tile in pixels at zoom 0.
pub const TILE_SIZE: f64 = 256.0;

/// Web-Mercator latitude limit.
const MAX_LATITUDE: f64 = 85.051_128_78;

/// Padding ratio applied when zooming to a cluster.
pub const CLUSTER_FIT_PADDING: f64 = 0.5;

/// Deepest zoom level clustering is computed for.
pub const MAX_ZOOM: f64 = 22.0;

/// Zoom clamped to `0..=MAX_ZOOM`; non-finite input reads as 0.
#[must_use]
pub fn normalize_zoom(zoom: f64) -> f64 {
    if zoom.is_finite() {
        zoom.clamp(0.0, MAX_ZOOM)
    } else {
        0.0
    }
}

/// Projects a coordinate to Web-Mercator pixels at `zoom`.
#[must_use]
pub fn project(lat: f64, lng: f64, zoom: f64) -> [f64; 2] {
    let scale = TILE_SIZE * zoom.exp2();
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (lng + 180.0) / 360.0 * scale;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * scale;
    [x, y]
}

/// Merge radius in pixels; tighter as the map zooms in.
#[must_use]
pub fn cluster_radius(zoom: f64) -> f64 {
    4.0f64.mul_add(-zoom, 80.0).max(40.0)
}

/// One rendered cluster or lone marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Ids of the member locations in input order.
    pub member_ids: Vec<String>,
    /// Icons of the members, in the same order.
    pub icons: Vec<String>,
    /// Mean latitude of the members.
    pub lat: f64,
    /// Mean longitude of the members.
    pub lng: f64,
    /// Viewport to fit when the cluster is clicked.
    pub fit_bounds: Option<MapBounds>,
}

impl Cluster {
    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.member_ids.len()
    }

    /// Always `false`; clusters have at least one member.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }

    /// Returns `true` for a lone marker.
    #[must_use]
    pub fn is_single(&self) -> bool {
        self.member_ids.len() == 1
    }
}

/// Bounding box of the members padded by 50% on every side.
#[must_use]
pub fn cluster_fit_bounds(members: &[&Location]) -> Option<MapBounds> {
    bounds_of(members.iter().map(|l| (l.lat, l.lng))).map(|b| b.pad(CLUSTER_FIT_PADDING))
}

/// Clustering index over a fixed location list.
pub struct ClusterIndex {
    locations: Vec<Location>,
}

impl ClusterIndex {
    /// Indexes the locations with finite coordinates.
    #[must_use]
    pub fn new(locations: &[Location]) -> Self {
        Self {
            locations: locations
                .iter()
                .filter(|l| l.lat.is_finite() && l.lng.is_finite())
                .cloned()
                .collect(),
        }
    }

    /// Number of indexed locations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Returns `true` if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Clusters the locations for the given zoom level, normalized with
    /// [`normalize_zoom`].
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn clusters(&self, zoom: f64) -> Vec<Cluster> {
        let zoom = normalize_zoom(zoom);
        let radius = cluster_radius(zoom);
        let points: Vec<GeomWithData<[f64; 2], usize>> = self
            .locations
            .iter()
            .enumerate()
            .map(|(i, l)| GeomWithData::new(project(l.lat, l.lng, zoom), i))
            .collect();
        let tree = RTree::bulk_load(points.clone());

        let mut claimed = vec![false; self.locations.len()];
        let mut clusters = Vec::new();

        for point in &points {
            if claimed[point.data] {
                continue;
            }

            let mut members: Vec<usize> = tree
                .locate_within_distance(*point.geom(), radius * radius)
                .map(|p| p.data)
                .filter(|i| !claimed[*i])
                .collect();
            members.sort_unstable();

            for &i in &members {
                claimed[i] = true;
            }

            let member_locations: Vec<&Location> =
                members.iter().map(|&i| &self.locations[i]).collect();
            let n = member_locations.len() as f64;

            clusters.push(Cluster {
                member_ids: member_locations.iter().map(|l| l.id.clone()).collect(),
                icons: member_locations
                    .iter()
                    .map(|l| l.icon.clone().unwrap_or_default())
                    .collect(),
                lat: member_locations.iter().map(|l| l.lat).sum::<f64>() / n,
                lng: member_locations.iter().map(|l| l.lng).sum::<f64>() / n,
                fit_bounds: cluster_fit_bounds(&member_locations),
            });
        }

        log::trace!(
            "Clustered {} locations into {} groups at zoom {zoom}",
            self.locations.len(),
            clusters.len()
        );
        clusters
    }
}
