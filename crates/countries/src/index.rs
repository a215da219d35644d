use std::sync::Arc;

use foundation::bounds::GeoBounds;
use rstar::{AABB, RTree, RTreeObject};
use tracing::debug;

use crate::feature::{FeatureCollection, PolygonFeature};
use crate::polygon::point_in_polygon;

/// A feature that made it into the index, with its precomputed bounds.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct IndexedFeature {
    /// Position of the feature in the source collection.
    pub position: usize,
    pub bounds: GeoBounds,
}

#[derive(Debug, Copy, Clone)]
struct TreeEntry {
    // Index into `CountryIndex::entries`, which is in input order.
    slot: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for TreeEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Point-in-country membership over a polygon feature collection.
///
/// Ordering contract:
/// - When features overlap, [`CountryIndex::query`] returns the one that comes
///   first in the source collection.
///
/// The R-tree only narrows candidates by bounding box; candidates are put back
/// into input order before the exact polygon test, so the tree never changes
/// which feature wins.
#[derive(Debug)]
pub struct CountryIndex {
    collection: Arc<FeatureCollection>,
    entries: Vec<IndexedFeature>,
    tree: RTree<TreeEntry>,
}

impl CountryIndex {
    /// Computes bounds for every feature. Features without a single finite
    /// vertex are left out.
    pub fn build(collection: Arc<FeatureCollection>) -> Self {
        let mut entries: Vec<IndexedFeature> = Vec::with_capacity(collection.len());

        for (position, feature) in collection.features.iter().enumerate() {
            let mut bounds = GeoBounds::empty();
            for &[lon, lat] in feature.geometry.vertices() {
                bounds.include(lon, lat);
            }
            if !bounds.is_valid() {
                continue;
            }
            entries.push(IndexedFeature { position, bounds });
        }

        let tree_entries: Vec<TreeEntry> = entries
            .iter()
            .enumerate()
            .map(|(slot, e)| TreeEntry {
                slot,
                envelope: AABB::from_corners(
                    [e.bounds.min_lon, e.bounds.min_lat],
                    [e.bounds.max_lon, e.bounds.max_lat],
                ),
            })
            .collect();

        debug!(
            features = collection.len(),
            indexed = entries.len(),
            skipped = collection.len() - entries.len(),
            "built country index"
        );

        Self {
            tree: RTree::bulk_load(tree_entries),
            collection,
            entries,
        }
    }

    pub fn collection(&self) -> &Arc<FeatureCollection> {
        &self.collection
    }

    /// Indexed features in input order.
    pub fn entries(&self) -> &[IndexedFeature] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position in the source collection of the first feature containing the
    /// point.
    pub fn query_position(&self, lat: f64, lon: f64) -> Option<usize> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }

        let probe = AABB::from_point([lon, lat]);
        let mut slots: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&probe)
            .map(|e| e.slot)
            .collect();
        slots.sort_unstable();

        slots.into_iter().find_map(|slot| {
            let entry = &self.entries[slot];
            if !entry.bounds.contains(lat, lon) {
                return None;
            }
            let feature = &self.collection.features[entry.position];
            feature
                .geometry
                .parts()
                .iter()
                .any(|part| point_in_polygon(lon, lat, part))
                .then_some(entry.position)
        })
    }

    /// First feature (in input order) containing the point.
    pub fn query(&self, lat: f64, lon: f64) -> Option<&PolygonFeature> {
        let position = self.query_position(lat, lon)?;
        self.collection.features.get(position)
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.query_position(lat, lon).is_some()
    }

    /// Country code of the containing feature, if it has one.
    pub fn country_code(&self, lat: f64, lon: f64) -> Option<&str> {
        self.query(lat, lon)?.country_code()
    }
}
