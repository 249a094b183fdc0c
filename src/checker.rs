//! Invasiveness Orchestrator
//!
//! Resolves an identifier to an AphiaID, fetches its distribution, tests the
//! sample point against every distribution region and derives the verdict.
//!
//! Expected failures (unresolvable identifier, no distribution, upstream
//! outage) come back as [`CheckOutcome::Failed`]. Only data-integrity
//! violations are returned as `Err`.

use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{GeometryCache, GeometryCacheConfig};
use crate::geometry::{RegionGeometry, DEFAULT_FRAGMENT_LIMIT};
use crate::services::{
    DistributionError, DistributionFetcher, DistributionLookup, DistributionRecord,
    GeometryResolver, IdSource, RemoteClient, RemoteClientConfig, TaxonMatch, TaxonResolver,
    TransportError,
};
use crate::status::{derive_status, normalize_establishment, StatusEntry, INTRODUCED};
use crate::types::{AphiaId, CheckerError, RegionId, SamplePoint};

pub const DEFAULT_WORMS_BASE_URL: &str = "https://www.marinespecies.org/rest";
pub const DEFAULT_MARINE_REGIONS_BASE_URL: &str = "https://marineregions.org/rest";
pub const DEFAULT_BUFFER_DEG: f64 = 5.0;

pub const NO_DISTRIBUTION_MESSAGE: &str = "No distribution found for this AphiaID";

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct CheckerConfig {
    pub worms_base_url: String,
    pub marine_regions_base_url: String,
    pub remote: RemoteClientConfig,
    pub cache: GeometryCacheConfig,
    /// Maximum WKT fragments combined per region
    pub fragment_limit: usize,
    /// Radius in degrees for the `within_buffer` flag
    pub buffer_deg: f64,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            worms_base_url: DEFAULT_WORMS_BASE_URL.to_string(),
            marine_regions_base_url: DEFAULT_MARINE_REGIONS_BASE_URL.to_string(),
            remote: RemoteClientConfig::default(),
            cache: GeometryCacheConfig::default(),
            fragment_limit: DEFAULT_FRAGMENT_LIMIT,
            buffer_deg: DEFAULT_BUFFER_DEG,
        }
    }
}

/// Per-call options
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckOptions {
    /// Compute the nearest introduced region and per-record distances
    pub nearest: bool,
}

// =============================================================================
// Results
// =============================================================================

/// One distribution record annotated for the sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    pub locality: Option<String>,
    #[serde(rename = "locationID")]
    pub location_id: String,
    #[serde(rename = "MRGID")]
    pub region_id: RegionId,
    #[serde(rename = "establishmentMeans")]
    pub establishment_means: String,
    #[serde(rename = "typeStatus")]
    pub type_status: Option<String>,
    pub invasiveness: Option<String>,
    pub occurrence: Option<String>,
    #[serde(rename = "qualitystatus")]
    pub quality_status: Option<String>,
    pub contains_sample_point: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_deg: Option<f64>,
}

/// Nearest introduced region(s), computed on request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearestIntroduced {
    pub buffer_deg: f64,
    /// Any distribution region lies within `buffer_deg` of the sample
    pub within_buffer: bool,
    pub localities: Vec<String>,
    pub mrgids: Vec<RegionId>,
    /// Great-circle distance to the closest boundary point, nearest 10 km
    pub distance_km: Option<f64>,
    pub distance_deg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSummary {
    #[serde(rename = "AphiaID")]
    pub aphia_id: AphiaId,
    pub identifier: String,
    pub source: String,
    #[serde(rename = "scientificname", skip_serializing_if = "Option::is_none")]
    pub scientific_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
    pub sample_location: String,
    #[serde(rename = "Status")]
    pub status: Vec<StatusEntry>,
    /// At least one distribution region contains the sample
    pub within_distribution: bool,
    pub introduced_at_sample_location: bool,
    pub distribution_url: String,
    #[serde(rename = "nearest_introduced", skip_serializing_if = "Option::is_none")]
    pub nearest: Option<NearestIntroduced>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorSummary {
    pub identifier: String,
    pub source: String,
    #[serde(rename = "AphiaID", skip_serializing_if = "Option::is_none")]
    pub aphia_id: Option<AphiaId>,
    pub sample_location: String,
    #[serde(rename = "Error")]
    pub error: String,
}

/// Result of a check: a verdict with its detail table, or an error summary
/// with none.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Checked {
        summary: StatusSummary,
        details: Vec<DetailRow>,
    },
    Failed(ErrorSummary),
}

impl CheckOutcome {
    pub fn is_checked(&self) -> bool {
        matches!(self, CheckOutcome::Checked { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            CheckOutcome::Failed(summary) => Some(&summary.error),
            CheckOutcome::Checked { .. } => None,
        }
    }

    pub fn status(&self) -> Option<&[StatusEntry]> {
        match self {
            CheckOutcome::Checked { summary, .. } => Some(&summary.status),
            CheckOutcome::Failed(_) => None,
        }
    }

    pub fn details(&self) -> Option<&[DetailRow]> {
        match self {
            CheckOutcome::Checked { details, .. } => Some(details),
            CheckOutcome::Failed(_) => None,
        }
    }

    pub fn aphia_id(&self) -> Option<AphiaId> {
        match self {
            CheckOutcome::Checked { summary, .. } => Some(summary.aphia_id),
            CheckOutcome::Failed(summary) => summary.aphia_id,
        }
    }
}

/// Serialized as `{"summary": ..., "details": [...] | null}`
impl Serialize for CheckOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CheckOutcome", 2)?;
        match self {
            CheckOutcome::Checked { summary, details } => {
                state.serialize_field("summary", summary)?;
                state.serialize_field("details", details)?;
            }
            CheckOutcome::Failed(summary) => {
                state.serialize_field("summary", summary)?;
                state.serialize_field("details", &Option::<Vec<DetailRow>>::None)?;
            }
        }
        state.end()
    }
}

// =============================================================================
// Checker
// =============================================================================

pub struct InvasiveChecker {
    config: CheckerConfig,
    remote: Arc<RemoteClient>,
    taxa: TaxonResolver,
    distributions: DistributionFetcher,
    geometries: GeometryResolver,
}

/// A distribution record with its resolved geometry
struct Annotated {
    record: DistributionRecord,
    geometry: Option<Arc<RegionGeometry>>,
    contains: bool,
}

impl InvasiveChecker {
    pub fn new(config: CheckerConfig) -> Self {
        let remote = Arc::new(RemoteClient::new(config.remote.clone()));
        let cache = Arc::new(GeometryCache::new(config.cache.clone()));

        Self {
            taxa: TaxonResolver::new(remote.clone(), config.worms_base_url.clone()),
            distributions: DistributionFetcher::new(remote.clone(), config.worms_base_url.clone()),
            geometries: GeometryResolver::new(
                remote.clone(),
                config.marine_regions_base_url.clone(),
                cache,
                config.fragment_limit,
            ),
            remote,
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CheckerConfig::default())
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    pub fn geometry_cache(&self) -> &Arc<GeometryCache> {
        self.geometries.cache()
    }

    pub fn remote(&self) -> &Arc<RemoteClient> {
        &self.remote
    }

    pub fn taxa(&self) -> &TaxonResolver {
        &self.taxa
    }

    /// Check an organism at a sample point with default options
    pub async fn check_organism(
        &self,
        sample: SamplePoint,
        identifier: &str,
        source: IdSource,
    ) -> Result<CheckOutcome, CheckerError> {
        self.check_organism_with(sample, identifier, source, CheckOptions::default())
            .await
    }

    /// Check by scientific name
    pub async fn check_by_name(
        &self,
        sample: SamplePoint,
        name: &str,
        options: CheckOptions,
    ) -> Result<CheckOutcome, CheckerError> {
        self.check_organism_with(sample, name, IdSource::ScientificName, options)
            .await
    }

    pub async fn check_organism_with(
        &self,
        sample: SamplePoint,
        identifier: &str,
        source: IdSource,
        options: CheckOptions,
    ) -> Result<CheckOutcome, CheckerError> {
        if sample.is_null_island() {
            warn!(identifier = %identifier, "Sample from Null Island");
        }

        let failed = |aphia_id: Option<AphiaId>, error: String| {
            CheckOutcome::Failed(ErrorSummary {
                identifier: identifier.to_string(),
                source: source.to_string(),
                aphia_id,
                sample_location: sample.to_wkt(),
                error,
            })
        };

        let taxon = match self.resolve_taxon(identifier, source).await {
            Ok(Some(taxon)) => taxon,
            Ok(None) => {
                info!(identifier = %identifier, source = %source, "Identifier not resolved");
                return Ok(failed(
                    None,
                    format!("Could not resolve '{}' ({}) to an AphiaID", identifier, source),
                ));
            }
            Err(e) => {
                warn!(identifier = %identifier, error = %e, "Taxon lookup failed");
                return Ok(failed(None, format!("Taxon lookup failed: {}", e)));
            }
        };
        let aphia_id = taxon.aphia_id;

        let (records, distribution_url) = match self.distributions.get_distribution(aphia_id).await {
            Ok(DistributionLookup::Found {
                records,
                source_url,
            }) => (records, source_url),
            Ok(DistributionLookup::NotFound { .. }) => {
                return Ok(failed(Some(aphia_id), NO_DISTRIBUTION_MESSAGE.to_string()));
            }
            Err(DistributionError::Transport(e)) => {
                return Ok(failed(
                    Some(aphia_id),
                    format!("Distribution lookup failed: {}", e),
                ));
            }
            Err(e @ DistributionError::DataIntegrity { .. }) => {
                return Err(CheckerError::DataIntegrity(format!(
                    "AphiaID {}: {}",
                    aphia_id, e
                )));
            }
        };

        let annotated = self.annotate(records, &sample).await;
        let point = sample.as_point();

        let status = derive_status(annotated.iter().map(|a| {
            (
                a.record.establishment_means.as_deref(),
                a.record.region_id,
                a.contains,
            )
        }));

        let introduced_at_sample_location = status.iter().any(StatusEntry::is_introduced);
        let within_distribution = annotated.iter().any(|a| a.contains);

        let nearest = match (options.nearest, point) {
            (true, Some(point)) => Some(self.nearest_introduced(&annotated, &point)),
            (true, None) => Some(NearestIntroduced {
                buffer_deg: self.config.buffer_deg,
                within_buffer: false,
                localities: Vec::new(),
                mrgids: Vec::new(),
                distance_km: None,
                distance_deg: None,
            }),
            (false, _) => None,
        };

        let details = annotated
            .into_iter()
            .map(|a| {
                let distance_deg = match (options.nearest, point, &a.geometry) {
                    (true, Some(point), Some(geometry)) => Some(geometry.distance_deg(&point)),
                    _ => None,
                };
                DetailRow {
                    locality: a.record.locality,
                    location_id: a.record.location_id,
                    region_id: a.record.region_id,
                    establishment_means: normalize_establishment(
                        a.record.establishment_means.as_deref(),
                    ),
                    type_status: a.record.type_status,
                    invasiveness: a.record.invasiveness,
                    occurrence: a.record.occurrence,
                    quality_status: a.record.quality_status,
                    contains_sample_point: a.contains,
                    distance_deg,
                }
            })
            .collect::<Vec<_>>();

        info!(
            aphia_id = %aphia_id,
            records = details.len(),
            introduced = introduced_at_sample_location,
            "Check complete"
        );

        Ok(CheckOutcome::Checked {
            summary: StatusSummary {
                aphia_id,
                identifier: identifier.to_string(),
                source: source.to_string(),
                scientific_name: taxon.scientific_name,
                rank: taxon.rank,
                sample_location: sample.to_wkt(),
                status,
                within_distribution,
                introduced_at_sample_location,
                distribution_url,
                nearest,
            },
            details,
        })
    }

    /// Map an identifier onto a taxon.
    ///
    /// For canonical identifiers no lookup happens; a non-integer identifier
    /// is simply unresolved.
    pub async fn resolve_taxon(
        &self,
        identifier: &str,
        source: IdSource,
    ) -> Result<Option<TaxonMatch>, TransportError> {
        match source {
            IdSource::Worms => Ok(identifier.parse::<AphiaId>().ok().map(|aphia_id| TaxonMatch {
                aphia_id,
                scientific_name: None,
                rank: None,
                matched_on: identifier.trim().to_string(),
            })),
            IdSource::ScientificName => self.taxa.by_name(identifier).await,
            IdSource::Lineage => self.taxa.by_lineage(identifier).await,
            IdSource::Foreign(scheme) => self.taxa.by_foreign_id(identifier, scheme).await,
        }
    }

    async fn annotate(&self, records: Vec<DistributionRecord>, sample: &SamplePoint) -> Vec<Annotated> {
        let point = sample.as_point();
        let mut annotated = Vec::with_capacity(records.len());

        for record in records {
            let (geometry, contains) = match point {
                Some(point) => {
                    let geometry = self.geometries.resolve_region(record.region_id).await;
                    let contains = geometry.as_ref().is_some_and(|g| g.contains(&point));
                    (geometry, contains)
                }
                None => (None, false),
            };
            debug!(mrgid = %record.region_id, contains = contains, "Region tested");
            annotated.push(Annotated {
                record,
                geometry,
                contains,
            });
        }

        annotated
    }

    fn nearest_introduced(&self, annotated: &[Annotated], point: &geo::Point<f64>) -> NearestIntroduced {
        let buffer_deg = self.config.buffer_deg;

        let within_buffer = annotated
            .iter()
            .filter_map(|a| a.geometry.as_ref())
            .any(|g| g.distance_deg(point) < buffer_deg);

        let introduced: Vec<(&Annotated, &Arc<RegionGeometry>, f64)> = annotated
            .iter()
            .filter(|a| {
                normalize_establishment(a.record.establishment_means.as_deref()) == INTRODUCED
            })
            .filter_map(|a| a.geometry.as_ref().map(|g| (a, g, g.distance_deg(point))))
            .collect();

        let min_deg = introduced
            .iter()
            .map(|(_, _, d)| *d)
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |m| m.min(d))));

        let closest: Vec<&(&Annotated, &Arc<RegionGeometry>, f64)> = match min_deg {
            Some(min) => introduced.iter().filter(|(_, _, d)| *d == min).collect(),
            None => Vec::new(),
        };

        let mut localities = Vec::new();
        let mut mrgids = Vec::new();
        for (a, _, _) in &closest {
            if let Some(locality) = &a.record.locality {
                if !localities.contains(locality) {
                    localities.push(locality.clone());
                }
            }
            if !mrgids.contains(&a.record.region_id) {
                mrgids.push(a.record.region_id);
            }
        }

        let distance_km = closest
            .first()
            .and_then(|(_, geometry, _)| geometry.nearest_distance_km(point));

        NearestIntroduced {
            buffer_deg,
            within_buffer,
            localities,
            mrgids,
            distance_km,
            distance_deg: min_deg,
        }
    }
}

impl Default for InvasiveChecker {
    fn default() -> Self {
        Self::with_defaults()
    }
}
