//! Distribution Fetcher
//!
//! Retrieves the WRiMS distribution of a taxon: one record per
//! (AphiaID, MRGID) pair with an establishment status. Exact duplicate rows
//! are dropped, only `recordStatus == "valid"` rows are kept, and the MRGID
//! is taken from the tail of each record's `locationID` URI.
//!
//! A `locationID` whose tail is not an integer is a data-integrity failure
//! and is returned as an error rather than skipped.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::services::remote::{RemoteClient, TransportError};
use crate::types::{AphiaId, RegionId};

pub const VALID_RECORD_STATUS: &str = "valid";

/// Raw distribution row as served by `AphiaDistributionsByAphiaID`
#[derive(Debug, Clone, Deserialize)]
struct RawDistribution {
    #[serde(default)]
    locality: Option<String>,
    #[serde(rename = "locationID", default)]
    location_id: Option<String>,
    #[serde(rename = "higherGeography", default)]
    higher_geography: Option<String>,
    #[serde(rename = "higherGeographyID", default)]
    higher_geography_id: Option<String>,
    #[serde(rename = "recordStatus", default)]
    record_status: Option<String>,
    #[serde(rename = "typeStatus", default)]
    type_status: Option<String>,
    #[serde(rename = "establishmentMeans", default)]
    establishment_means: Option<String>,
    #[serde(default)]
    invasiveness: Option<String>,
    #[serde(default)]
    occurrence: Option<String>,
    #[serde(rename = "decimalLatitude", default)]
    decimal_latitude: Option<f64>,
    #[serde(rename = "decimalLongitude", default)]
    decimal_longitude: Option<f64>,
    #[serde(default)]
    qualitystatus: Option<String>,
}

/// A valid, de-duplicated distribution record with its parsed region
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionRecord {
    pub locality: Option<String>,
    pub location_id: String,
    pub region_id: RegionId,
    pub establishment_means: Option<String>,
    pub record_status: Option<String>,
    pub type_status: Option<String>,
    pub invasiveness: Option<String>,
    pub occurrence: Option<String>,
    pub quality_status: Option<String>,
    pub higher_geography: Option<String>,
    pub higher_geography_id: Option<String>,
    pub decimal_latitude: Option<f64>,
    pub decimal_longitude: Option<f64>,
}

/// Result of a distribution lookup
#[derive(Debug, Clone)]
pub enum DistributionLookup {
    Found {
        records: Vec<DistributionRecord>,
        source_url: String,
    },
    /// The registry has no usable distribution for this taxon
    NotFound { source_url: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DistributionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Unparseable locationID {location_id:?}: {reason}")]
    DataIntegrity { location_id: String, reason: String },
}

pub struct DistributionFetcher {
    client: Arc<RemoteClient>,
    base_url: String,
}

impl DistributionFetcher {
    pub fn new(client: Arc<RemoteClient>, worms_base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: worms_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn distribution_url(&self, taxon: AphiaId) -> String {
        format!("{}/AphiaDistributionsByAphiaID/{}", self.base_url, taxon)
    }

    pub async fn get_distribution(
        &self,
        taxon: AphiaId,
    ) -> Result<DistributionLookup, DistributionError> {
        let source_url = self.distribution_url(taxon);
        let raw: Option<Vec<serde_json::Value>> = self.client.fetch_json(&source_url).await?;

        let raw = match raw {
            Some(rows) if !rows.is_empty() => rows,
            _ => {
                warn!(aphia_id = %taxon, "No distribution for taxon");
                return Ok(DistributionLookup::NotFound { source_url });
            }
        };

        let records = filter_records(raw, &source_url)?;
        if records.is_empty() {
            warn!(aphia_id = %taxon, "No valid distribution records for taxon");
            return Ok(DistributionLookup::NotFound { source_url });
        }

        debug!(aphia_id = %taxon, records = records.len(), "Distribution fetched");
        Ok(DistributionLookup::Found {
            records,
            source_url,
        })
    }
}

/// De-duplicate, keep valid rows, and parse region identifiers
fn filter_records(
    raw: Vec<serde_json::Value>,
    source_url: &str,
) -> Result<Vec<DistributionRecord>, DistributionError> {
    let mut unique: Vec<serde_json::Value> = Vec::with_capacity(raw.len());
    for row in raw {
        if !unique.contains(&row) {
            unique.push(row);
        }
    }

    let mut records = Vec::with_capacity(unique.len());
    for row in unique {
        let row: RawDistribution =
            serde_json::from_value(row).map_err(|e| TransportError::Malformed {
                url: source_url.to_string(),
                reason: e.to_string(),
            })?;

        if row.record_status.as_deref() != Some(VALID_RECORD_STATUS) {
            continue;
        }

        let location_id = row.location_id.unwrap_or_default();
        let region_id = parse_region_id(&location_id)?;

        records.push(DistributionRecord {
            locality: row.locality,
            location_id,
            region_id,
            establishment_means: row.establishment_means,
            record_status: row.record_status,
            type_status: row.type_status,
            invasiveness: row.invasiveness,
            occurrence: row.occurrence,
            quality_status: row.qualitystatus,
            higher_geography: row.higher_geography,
            higher_geography_id: row.higher_geography_id,
            decimal_latitude: row.decimal_latitude,
            decimal_longitude: row.decimal_longitude,
        });
    }

    Ok(records)
}

/// Extract the MRGID from the last path segment of a location URI
pub fn parse_region_id(location_id: &str) -> Result<RegionId, DistributionError> {
    let (_, tail) = location_id
        .rsplit_once('/')
        .ok_or_else(|| DistributionError::DataIntegrity {
            location_id: location_id.to_string(),
            reason: "no '/' separated identifier".to_string(),
        })?;

    tail.parse().map_err(|e: std::num::ParseIntError| DistributionError::DataIntegrity {
        location_id: location_id.to_string(),
        reason: e.to_string(),
    })
}
