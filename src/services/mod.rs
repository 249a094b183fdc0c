//! Services layer
//!
//! Each service wraps one upstream concern and shares a single
//! [`RemoteClient`](remote::RemoteClient).
//!
//! ## Services
//!
//! - **Remote**: memoized HTTP GET with outcome classification and 429 backoff
//! - **Taxon**: name, lineage and foreign accession resolution against WoRMS
//! - **Distribution**: WRiMS distribution records for a taxon
//! - **Geometry**: Marine Regions polygons behind the geometry cache

pub mod distribution;
pub mod geometry;
pub mod remote;
pub mod taxon;

pub use distribution::{
    parse_region_id, DistributionError, DistributionFetcher, DistributionLookup,
    DistributionRecord,
};
pub use geometry::GeometryResolver;
pub use remote::{FetchOutcome, RemoteClient, RemoteClientConfig, RemoteClientStats, TransportError};
pub use taxon::{ForeignScheme, IdSource, TaxonMatch, TaxonResolver, UnknownSource};
