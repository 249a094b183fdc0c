//! In-memory cache for region geometries.
//!
//! Region polygons are expensive to download and parse, so each MRGID is
//! fetched once and reused until the entry is older than the retention
//! period. A stale entry is discarded and refetched on its next access.
//!
//! "This region has no geometry" is a valid, cacheable answer. Transport
//! failures are never stored.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::geometry::RegionGeometry;
use crate::types::RegionId;

/// What the cache holds per region: the geometry, or the fact there is none
pub type CachedGeometry = Option<Arc<RegionGeometry>>;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct GeometryCacheConfig {
    /// Entries at least this old are stale
    pub retention: Duration,

    /// Maximum number of cached regions
    pub max_entries: usize,

    /// How often the background sweep drops stale entries
    pub sweep_interval: Duration,
}

impl Default for GeometryCacheConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(7 * 24 * 3600), // 1 week
            max_entries: 5_000,
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

// =============================================================================
// Entries and statistics
// =============================================================================

struct CacheEntry {
    geometry: CachedGeometry,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_stale(&self, retention: Duration) -> bool {
        self.is_stale_at(Instant::now(), retention)
    }

    /// Stale once strictly older than `retention`; an entry exactly
    /// `retention` old is still served.
    fn is_stale_at(&self, now: Instant, retention: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) > retention
    }
}

#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    refetches: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
}

/// Snapshot of cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct GeometryCacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub retention_secs: u64,
    pub hits: u64,
    pub misses: u64,
    /// Lookups that found a stale entry and had to fetch again
    pub refetches: u64,
    pub inserts: u64,
    /// Entries dropped for capacity or staleness
    pub evictions: u64,
}

enum Lookup {
    Fresh(CachedGeometry),
    Stale,
    Missing,
}

// =============================================================================
// Geometry Cache
// =============================================================================

pub struct GeometryCache {
    entries: DashMap<RegionId, CacheEntry>,
    config: GeometryCacheConfig,
    stats: CacheStats,
}

impl GeometryCache {
    pub fn new(config: GeometryCacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            stats: CacheStats::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(GeometryCacheConfig::default())
    }

    pub fn config(&self) -> &GeometryCacheConfig {
        &self.config
    }

    /// Fresh cached value for a region.
    ///
    /// The outer `None` means "not cached"; `Some(None)` means the region is
    /// known to have no geometry.
    pub fn get(&self, region: RegionId) -> Option<CachedGeometry> {
        match self.lookup(region) {
            Lookup::Fresh(geometry) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(geometry)
            }
            Lookup::Stale | Lookup::Missing => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a region's geometry, evicting the oldest entry at capacity
    pub fn insert(&self, region: RegionId, geometry: CachedGeometry) {
        if !self.entries.contains_key(&region) && self.entries.len() >= self.config.max_entries {
            self.evict_oldest();
        }

        self.entries.insert(
            region,
            CacheEntry {
                geometry,
                inserted_at: Instant::now(),
            },
        );
        self.stats.inserts.fetch_add(1, Ordering::Relaxed);
    }

    /// Return the cached geometry, or run `fetch` when the region is missing
    /// or stale and cache what it produces.
    ///
    /// A fetch error is returned unchanged and leaves the cache untouched.
    pub async fn get_or_fetch_with_expiry<F, Fut, E>(
        &self,
        region: RegionId,
        fetch: F,
    ) -> Result<CachedGeometry, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<RegionGeometry>, E>>,
    {
        match self.lookup(region) {
            Lookup::Fresh(geometry) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                debug!(mrgid = %region, "Geometry cache hit");
                return Ok(geometry);
            }
            Lookup::Stale => {
                self.stats.refetches.fetch_add(1, Ordering::Relaxed);
                debug!(mrgid = %region, "Geometry cache entry stale, refetching");
            }
            Lookup::Missing => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
            }
        }

        let geometry = fetch().await?.map(Arc::new);
        self.insert(region, geometry.clone());
        Ok(geometry)
    }

    /// Drop every entry, returning how many were removed
    pub fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Remove all stale entries, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let retention = self.config.retention;
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            if entry.is_stale(retention) {
                removed += 1;
                false
            } else {
                true
            }
        });
        self.stats
            .evictions
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> GeometryCacheStats {
        GeometryCacheStats {
            entries: self.entries.len(),
            max_entries: self.config.max_entries,
            retention_secs: self.config.retention.as_secs(),
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            refetches: self.stats.refetches.load(Ordering::Relaxed),
            inserts: self.stats.inserts.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
        }
    }

    /// Classify the entry for a region, removing it if stale
    fn lookup(&self, region: RegionId) -> Lookup {
        let stale = match self.entries.get(&region) {
            Some(entry) if !entry.is_stale(self.config.retention) => {
                return Lookup::Fresh(entry.geometry.clone());
            }
            Some(_) => true,
            None => false,
        };

        if stale {
            self.entries.remove(&region);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            Lookup::Stale
        } else {
            Lookup::Missing
        }
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().inserted_at)
            .map(|e| *e.key());

        if let Some(region) = oldest {
            self.entries.remove(&region);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for GeometryCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Spawn the periodic stale-entry sweep
pub fn spawn_cleanup_task(cache: Arc<GeometryCache>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = cache.cleanup_expired();
            debug!(
                removed = removed,
                remaining = cache.len(),
                "Geometry cache sweep completed"
            );
        }
    });

    info!(
        interval_secs = interval.as_secs(),
        "Geometry cache sweep task started"
    );
}
