//! Taxon Resolver
//!
//! Maps organism identifiers onto canonical WoRMS AphiaIDs. Three entry
//! paths are supported:
//!
//! - scientific name via `AphiaRecordsByMatchNames`
//! - ranked lineage string, walking from the most specific rank upwards
//! - foreign accession (NCBI, BOLD, FishBase, ...) via `AphiaRecordByExternalID`
//!
//! Not finding a match is an ordinary outcome and is reported as `Ok(None)`.
//! Only transport failures are errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::services::remote::{RemoteClient, TransportError};
use crate::types::AphiaId;

/// Foreign identifier schemes accepted by the WoRMS cross-reference service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForeignScheme {
    Algaebase,
    Bold,
    Dyntaxa,
    Fishbase,
    Iucn,
    Lsid,
    Ncbi,
    Tsn,
    Gisd,
}

impl ForeignScheme {
    pub const ALL: [ForeignScheme; 9] = [
        ForeignScheme::Algaebase,
        ForeignScheme::Bold,
        ForeignScheme::Dyntaxa,
        ForeignScheme::Fishbase,
        ForeignScheme::Iucn,
        ForeignScheme::Lsid,
        ForeignScheme::Ncbi,
        ForeignScheme::Tsn,
        ForeignScheme::Gisd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ForeignScheme::Algaebase => "algaebase",
            ForeignScheme::Bold => "bold",
            ForeignScheme::Dyntaxa => "dyntaxa",
            ForeignScheme::Fishbase => "fishbase",
            ForeignScheme::Iucn => "iucn",
            ForeignScheme::Lsid => "lsid",
            ForeignScheme::Ncbi => "ncbi",
            ForeignScheme::Tsn => "tsn",
            ForeignScheme::Gisd => "gisd",
        }
    }
}

impl fmt::Display for ForeignScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForeignScheme {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|scheme| scheme.as_str() == wanted)
            .ok_or_else(|| UnknownSource(s.to_string()))
    }
}

/// How an incoming identifier should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    /// The identifier already is an AphiaID
    Worms,
    ScientificName,
    Lineage,
    Foreign(ForeignScheme),
}

impl IdSource {
    pub fn is_canonical(&self) -> bool {
        matches!(self, IdSource::Worms)
    }
}

impl fmt::Display for IdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdSource::Worms => f.write_str("worms"),
            IdSource::ScientificName => f.write_str("sciname"),
            IdSource::Lineage => f.write_str("lineage"),
            IdSource::Foreign(scheme) => scheme.fmt(f),
        }
    }
}

impl FromStr for IdSource {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "worms" | "aphia" | "aphiaid" => Ok(IdSource::Worms),
            "sciname" | "name" | "scientificname" => Ok(IdSource::ScientificName),
            "lineage" | "classification" => Ok(IdSource::Lineage),
            _ => s.parse().map(IdSource::Foreign),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown identifier source: {0}")]
pub struct UnknownSource(pub String);

/// AphiaRecord subset returned by the WoRMS REST API
#[derive(Debug, Clone, Deserialize)]
pub struct AphiaRecord {
    #[serde(rename = "AphiaID")]
    pub aphia_id: i64,
    #[serde(rename = "scientificname", default)]
    pub scientific_name: Option<String>,
    #[serde(default)]
    pub rank: Option<String>,
}

/// A successful resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxonMatch {
    pub aphia_id: AphiaId,
    pub scientific_name: Option<String>,
    pub rank: Option<String>,
    /// The name or accession that produced the match
    pub matched_on: String,
}

impl TaxonMatch {
    fn from_record(record: AphiaRecord, matched_on: &str) -> Self {
        Self {
            aphia_id: AphiaId(record.aphia_id),
            scientific_name: record.scientific_name,
            rank: record.rank,
            matched_on: matched_on.to_string(),
        }
    }
}

pub struct TaxonResolver {
    client: Arc<RemoteClient>,
    base_url: String,
}

impl TaxonResolver {
    pub fn new(client: Arc<RemoteClient>, worms_base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: worms_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a single scientific name. The first candidate of the first
    /// match group is taken as canonical.
    pub async fn by_name(&self, name: &str) -> Result<Option<TaxonMatch>, TransportError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let url = format!(
            "{}/AphiaRecordsByMatchNames?scientificnames[]={}",
            self.base_url,
            urlencoding::encode(name)
        );

        let groups: Option<Vec<Option<Vec<AphiaRecord>>>> = self.client.fetch_json(&url).await?;
        let first = groups
            .and_then(|groups| groups.into_iter().next().flatten())
            .and_then(|candidates| candidates.into_iter().next());

        match first {
            Some(record) => {
                debug!(name = %name, aphia_id = record.aphia_id, "Name matched");
                Ok(Some(TaxonMatch::from_record(record, name)))
            }
            None => {
                debug!(name = %name, "No name match");
                Ok(None)
            }
        }
    }

    /// Resolve a semicolon-delimited lineage, most general rank first.
    ///
    /// The most specific rank is tried first; on a miss the last segment is
    /// dropped and the next rank up is tried, until the lineage is exhausted.
    pub async fn by_lineage(&self, lineage: &str) -> Result<Option<TaxonMatch>, TransportError> {
        let mut ranks = lineage_segments(lineage);

        while let Some(name) = ranks.pop() {
            if let Some(found) = self.by_name(&name).await? {
                info!(
                    lineage = %lineage,
                    matched = %name,
                    depth = ranks.len() + 1,
                    aphia_id = %found.aphia_id,
                    "Lineage resolved"
                );
                return Ok(Some(found));
            }
        }

        debug!(lineage = %lineage, "Lineage exhausted without a match");
        Ok(None)
    }

    /// Resolve an accession from one of the supported foreign schemes
    pub async fn by_foreign_id(
        &self,
        id: &str,
        scheme: ForeignScheme,
    ) -> Result<Option<TaxonMatch>, TransportError> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(None);
        }

        let url = format!(
            "{}/AphiaRecordByExternalID/{}?type={}",
            self.base_url,
            urlencoding::encode(id),
            scheme
        );

        let record: Option<AphiaRecord> = self.client.fetch_json(&url).await?;
        Ok(record.map(|r| TaxonMatch::from_record(r, id)))
    }

    /// Resolve a foreign scheme given by name. Unknown schemes resolve to nothing.
    pub async fn by_foreign_scheme_name(
        &self,
        id: &str,
        scheme: &str,
    ) -> Result<Option<TaxonMatch>, TransportError> {
        match scheme.parse::<ForeignScheme>() {
            Ok(scheme) => self.by_foreign_id(id, scheme).await,
            Err(e) => {
                debug!(error = %e, "Foreign scheme not supported");
                Ok(None)
            }
        }
    }
}

/// Split a lineage into normalised rank names, most general first.
///
/// Handles the rank prefixes emitted by common eDNA classifiers
/// (`g__Gadus`, `D_5__Gadus`) and underscore word separators.
pub fn lineage_segments(lineage: &str) -> Vec<String> {
    lineage
        .split(';')
        .map(normalise_rank_name)
        .filter(|name| !name.is_empty())
        .collect()
}

fn normalise_rank_name(segment: &str) -> String {
    let segment = segment.trim();
    let name = match segment.split_once("__") {
        Some((prefix, rest))
            if prefix.len() <= 4
                && prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
        {
            rest
        }
        _ => segment,
    };
    name.replace('_', " ").split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_source_parsing() {
        assert_eq!("worms".parse::<IdSource>().unwrap(), IdSource::Worms);
        assert_eq!("SciName".parse::<IdSource>().unwrap(), IdSource::ScientificName);
        assert_eq!("lineage".parse::<IdSource>().unwrap(), IdSource::Lineage);
        assert_eq!(
            "NCBI".parse::<IdSource>().unwrap(),
            IdSource::Foreign(ForeignScheme::Ncbi)
        );
        assert!("genbank".parse::<IdSource>().is_err());
    }

    #[test]
    fn test_every_scheme_round_trips_through_its_name() {
        for scheme in ForeignScheme::ALL {
            assert_eq!(scheme.as_str().parse::<ForeignScheme>().unwrap(), scheme);
        }
    }

    #[test]
    fn test_lineage_segments() {
        assert_eq!(
            lineage_segments("Animalia; Chordata;;Actinopteri;Gadus morhua"),
            vec!["Animalia", "Chordata", "Actinopteri", "Gadus morhua"]
        );
        assert_eq!(
            lineage_segments("k__Animalia;g__Gadus;s__Gadus_morhua"),
            vec!["Animalia", "Gadus", "Gadus morhua"]
        );
        assert_eq!(lineage_segments("D_0__Eukaryota;D_5__Gadus"), vec!["Eukaryota", "Gadus"]);
        assert!(lineage_segments(" ; ;").is_empty());
    }

    fn record(aphia_id: i64, name: &str, rank: &str) -> serde_json::Value {
        serde_json::json!({ "AphiaID": aphia_id, "scientificname": name, "rank": rank })
    }

    #[tokio::test]
    async fn test_by_name_takes_first_candidate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/AphiaRecordsByMatchNames"))
            .and(query_param("scientificnames[]", "Gadus morhua"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([[
                record(126436, "Gadus morhua", "Species"),
                record(999, "Gadus morhua morhua", "Subspecies")
            ]])))
            .mount(&server)
            .await;

        let resolver = TaxonResolver::new(Arc::new(RemoteClient::with_defaults()), server.uri());
        let found = resolver.by_name("Gadus morhua").await.unwrap().unwrap();
        assert_eq!(found.aphia_id, AphiaId(126436));
        assert_eq!(found.rank.as_deref(), Some("Species"));
    }

    #[tokio::test]
    async fn test_by_name_no_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/AphiaRecordsByMatchNames"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([null])))
            .mount(&server)
            .await;

        let resolver = TaxonResolver::new(Arc::new(RemoteClient::with_defaults()), server.uri());
        assert!(resolver.by_name("Nonexistus fictus").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_by_lineage_walks_up_ranks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/AphiaRecordsByMatchNames"))
            .and(query_param("scientificnames[]", "Gadus sp. XYZ"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/AphiaRecordsByMatchNames"))
            .and(query_param("scientificnames[]", "Gadus"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([[record(125732, "Gadus", "Genus")]])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let resolver = TaxonResolver::new(Arc::new(RemoteClient::with_defaults()), server.uri());
        let found = resolver
            .by_lineage("Animalia;Chordata;Gadiformes;Gadidae;Gadus;Gadus sp. XYZ")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.aphia_id, AphiaId(125732));
        assert_eq!(found.matched_on, "Gadus");
    }

    #[tokio::test]
    async fn test_by_lineage_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;

        let resolver = TaxonResolver::new(Arc::new(RemoteClient::with_defaults()), server.uri());
        assert!(resolver.by_lineage("Foo;Bar").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_by_foreign_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/AphiaRecordByExternalID/860360"))
            .and(query_param("type", "ncbi"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(record(132762, "Tubastraea coccinea", "Species")),
            )
            .mount(&server)
            .await;

        let resolver = TaxonResolver::new(Arc::new(RemoteClient::with_defaults()), server.uri());
        let found = resolver
            .by_foreign_id("860360", ForeignScheme::Ncbi)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.aphia_id, AphiaId(132762));

        assert!(resolver
            .by_foreign_scheme_name("860360", "genbank")
            .await
            .unwrap()
            .is_none());
    }
}
