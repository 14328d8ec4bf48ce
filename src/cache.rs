//! In-memory cache for the public gallery listing.
//! Uses moka for TTL-based caching; writes invalidate it explicitly.

use crate::gallery::GalleryItem;
use moka::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const PUBLIC_LISTING_KEY: &str = "gallery:public";

/// Default lifetime of a cached listing when nothing invalidates it.
pub const LISTING_TTL: Duration = Duration::from_secs(60);

/// Cached, serializable view of the public gallery.
///
/// Every invalidation bumps a generation counter. A listing read from the
/// database is only kept if no invalidation happened while it was being read.
pub struct ListingCache {
    cache: Cache<&'static str, Arc<Vec<GalleryItem>>>,
    generation: AtomicU64,
}

impl Default for ListingCache {
    fn default() -> Self {
        Self::new(LISTING_TTL)
    }
}

impl ListingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().time_to_live(ttl).max_capacity(1).build(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn get(&self) -> Option<Arc<Vec<GalleryItem>>> {
        self.cache.get(PUBLIC_LISTING_KEY)
    }

    /// Current generation. Take it before reading the listing from the store.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cache `items` read at `generation`. Returns false, leaving the cache
    /// empty, if an invalidation happened since.
    pub fn insert(&self, items: Arc<Vec<GalleryItem>>, generation: u64) -> bool {
        if self.generation() != generation {
            return false;
        }
        self.cache.insert(PUBLIC_LISTING_KEY, items);

        // An invalidation that raced the insert may have run before it landed.
        if self.generation() != generation {
            self.cache.invalidate(PUBLIC_LISTING_KEY);
            return false;
        }
        true
    }

    /// Drop the cached listing so the next read goes to the database.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate(PUBLIC_LISTING_KEY);
        log::debug!("ListingCache: public listing invalidated");
    }
}
