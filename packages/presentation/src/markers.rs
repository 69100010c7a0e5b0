//! Best-effort marker bookkeeping against a clustering layer.
//!
//! Clustering is a rendering optimization, so add/remove failures from
//! the layer are logged and counted, never propagated. Marker icons live
//! in a side table keyed by marker identity that only holds [`Weak`]
//! handles. An entry is dropped whenever its marker leaves the set, even
//! if the layer failed to release the marker, and entries whose marker
//! was dropped elsewhere are pruned on the next sync.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Weak};

use notion_map_location_models::Location;

use crate::ClusterLayerError;

/// A marker placed on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// Id of the location the marker stands for.
    pub id: String,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
}

/// The clustering layer markers are registered with.
pub trait ClusterLayer {
    /// Adds a marker.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterLayerError`] if the layer rejects the marker.
    fn add_marker(&mut self, marker: Arc<Marker>) -> Result<(), ClusterLayerError>;

    /// Removes a marker.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterLayerError`] if the marker is unknown to the layer.
    fn remove_marker(&mut self, marker: &Arc<Marker>) -> Result<(), ClusterLayerError>;
}

/// Outcome counts of one [`MarkerSet::sync`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Markers added to the layer.
    pub added: usize,
    /// Markers removed from the layer.
    pub removed: usize,
    /// Layer operations that failed and were skipped.
    pub failed: usize,
}

/// Keeps a clustering layer in step with the visible locations.
pub struct MarkerSet<L: ClusterLayer> {
    layer: L,
    markers: BTreeMap<String, Arc<Marker>>,
    icons: HashMap<usize, (Weak<Marker>, String)>,
}

fn identity(marker: &Arc<Marker>) -> usize {
    Arc::as_ptr(marker) as usize
}

impl<L: ClusterLayer> MarkerSet<L> {
    /// Wraps a layer with no markers.
    pub fn new(layer: L) -> Self {
        Self {
            layer,
            markers: BTreeMap::new(),
            icons: HashMap::new(),
        }
    }

    /// The wrapped layer.
    pub const fn layer(&self) -> &L {
        &self.layer
    }

    /// Number of live markers.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Returns `true` if no markers are live.
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Makes the layer show exactly `locations`.
    ///
    /// Markers whose location disappeared are removed, new locations get
    /// a marker. A location whose coordinates changed is re-added.
    pub fn sync(&mut self, locations: &[Location]) -> SyncReport {
        let mut report = SyncReport::default();
        let wanted: BTreeMap<&str, &Location> =
            locations.iter().map(|l| (l.id.as_str(), l)).collect();

        let stale: BTreeSet<String> = self
            .markers
            .iter()
            .filter(|(id, marker)| {
                wanted
                    .get(id.as_str())
                    .is_none_or(|l| {
                        l.lat.to_bits() != marker.lat.to_bits()
                            || l.lng.to_bits() != marker.lng.to_bits()
                    })
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in stale {
            let Some(marker) = self.markers.remove(&id) else {
                continue;
            };
            self.icons.remove(&identity(&marker));
            match self.layer.remove_marker(&marker) {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    log::warn!("Ignoring failed marker removal for {id}: {e}");
                    report.failed += 1;
                }
            }
        }

        for (id, location) in wanted {
            if self.markers.contains_key(id) {
                continue;
            }
            let marker = Arc::new(Marker {
                id: id.to_owned(),
                lat: location.lat,
                lng: location.lng,
            });
            match self.layer.add_marker(Arc::clone(&marker)) {
                Ok(()) => {
                    if let Some(icon) = &location.icon {
                        self.icons
                            .insert(identity(&marker), (Arc::downgrade(&marker), icon.clone()));
                    }
                    self.markers.insert(id.to_owned(), marker);
                    report.added += 1;
                }
                Err(e) => {
                    log::warn!("Ignoring failed marker add for {id}: {e}");
                    report.failed += 1;
                }
            }
        }

        self.prune();
        report
    }

    /// Icon recorded for a marker, if it is still alive.
    pub fn icon_for(&self, marker: &Arc<Marker>) -> Option<&str> {
        let (weak, icon) = self.icons.get(&identity(marker))?;
        weak.upgrade()
            .filter(|live| Arc::ptr_eq(live, marker))
            .map(|_| icon.as_str())
    }

    /// Icons of the given location ids, skipping ids without a marker or
    /// icon. Used to build cluster glyphs.
    pub fn icons_for(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.markers.get(id))
            .filter_map(|marker| self.icon_for(marker))
            .map(str::to_owned)
            .collect()
    }

    /// Number of icon entries still in the side table.
    pub fn icon_entries(&self) -> usize {
        self.icons.len()
    }

    fn prune(&mut self) {
        self.icons.retain(|_, (weak, _)| weak.strong_count() > 0);
    }
}
