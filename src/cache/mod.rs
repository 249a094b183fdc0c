//! Caching layers
//!
//! - **geometry**: per-region geometry cache with time-based expiry
//!
//! URL-level memoization of registry lookups lives in the remote client
//! (`services::remote`); this module only holds the expiring layer.

pub mod geometry;

pub use geometry::{
    spawn_cleanup_task, CachedGeometry, GeometryCache, GeometryCacheConfig, GeometryCacheStats,
};
