//! Invasive Checker - native / introduced status of marine taxa
//!
//! Crosses a taxon's WRiMS distribution (WoRMS) with Marine Regions
//! polygon geometries to decide whether an organism observed at a sample
//! point is native, introduced or unrecorded there.
//!
//! ## Architecture
//!
//! ```text
//! identifier ──► TaxonResolver ──► DistributionFetcher ──► GeometryResolver ──► derive_status
//!                     │                   │                       │
//!                     └──── RemoteClient (memoized GET) ──────────┘
//!                                                                 │
//!                                                           GeometryCache
//! ```
//!
//! ## Surfaces
//!
//! - [`checker::InvasiveChecker`]: the engine
//! - [`ingest::annotate_row`]: one OTU table row at a time
//! - [`server`]: HTTP shell (`/check`, `/check/name`, admin and health routes)
//! - `invasive-check`: one-shot command line check

pub mod cache;
pub mod checker;
pub mod config;
pub mod geometry;
pub mod ingest;
pub mod routes;
pub mod server;
pub mod services;
pub mod status;
pub mod types;

pub use checker::{CheckOptions, CheckOutcome, CheckerConfig, InvasiveChecker};
pub use config::Args;
pub use types::{AphiaId, CheckerError, RegionId, Result, SamplePoint};
