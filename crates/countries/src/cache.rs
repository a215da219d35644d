use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::feature::FeatureCollection;
use crate::index::CountryIndex;

/// Build-once memo of [`CountryIndex`]es keyed by collection identity.
///
/// The key is the `Arc` allocation, not the content: passing the same
/// `Arc<FeatureCollection>` again returns the very same `Arc<CountryIndex>`,
/// while an equal-but-distinct collection gets its own index. To pick up a
/// content change, pass a new collection.
///
/// An entry is dropped on the next lookup once nobody outside the cache holds
/// either its collection or its index, so a cache that outlives many
/// collections does not keep them all alive.
#[derive(Debug, Default)]
pub struct IndexCache {
    entries: Mutex<Vec<Arc<CountryIndex>>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(&self, collection: &Arc<FeatureCollection>) -> Arc<CountryIndex> {
        let mut entries = self.entries.lock();

        // Index + cache hold one strong ref each on the collection.
        entries.retain(|index| {
            Arc::strong_count(index) > 1 || Arc::strong_count(index.collection()) > 1
        });

        if let Some(hit) = entries
            .iter()
            .find(|index| Arc::ptr_eq(index.collection(), collection))
        {
            trace!("country index cache hit");
            return Arc::clone(hit);
        }

        let index = Arc::new(CountryIndex::build(Arc::clone(collection)));
        entries.push(Arc::clone(&index));
        index
    }

    /// Forgets the index built for `collection`. Returns whether one existed.
    pub fn evict(&self, collection: &Arc<FeatureCollection>) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|index| !Arc::ptr_eq(index.collection(), collection));
        entries.len() != before
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
