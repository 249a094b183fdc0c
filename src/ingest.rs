//! Tabular sample rows
//!
//! One row of an OTU table carries a lineage string in `classification`
//! and the sample coordinates under one of several column names. The
//! annotation adds the WRiMS verdict columns; the input columns are
//! carried through untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::checker::{CheckOutcome, InvasiveChecker};
use crate::services::IdSource;
use crate::types::{CheckerError, SamplePoint};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SampleRow {
    #[serde(default)]
    pub classification: Option<String>,

    #[serde(
        default,
        alias = "longitude",
        alias = "decimalLongitude",
        alias = "sampleLongitude",
        deserialize_with = "lenient_coordinate"
    )]
    pub lon: Option<f64>,

    #[serde(
        default,
        alias = "latitude",
        alias = "decimalLatitude",
        alias = "sampleLatitude",
        deserialize_with = "lenient_coordinate"
    )]
    pub lat: Option<f64>,

    /// Every other column, passed through
    #[serde(flatten)]
    pub columns: Map<String, Value>,
}

impl SampleRow {
    pub fn sample_point(&self) -> SamplePoint {
        SamplePoint::from_parts(self.lon, self.lat)
    }
}

/// Verdict columns appended to a row
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowAnnotation {
    #[serde(rename = "WRIMS Status")]
    pub status: Option<String>,
    #[serde(rename = "Sample within MRGID")]
    pub within: Option<String>,
    #[serde(rename = "AphiaID")]
    pub aphia_id: Option<i64>,
    #[serde(rename = "scientificname")]
    pub scientific_name: Option<String>,
    pub rank: Option<String>,
    /// Detail table as pretty-printed JSON, `{}` when there is none
    #[serde(rename = "Details")]
    pub details: String,
    #[serde(rename = "Error", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RowAnnotation {
    pub fn from_outcome(outcome: &CheckOutcome) -> Result<Self, CheckerError> {
        match outcome {
            CheckOutcome::Checked { summary, details } => {
                let status = summary
                    .status
                    .iter()
                    .map(|e| e.status.as_str())
                    .collect::<Vec<_>>()
                    .join(";");
                let within = summary
                    .status
                    .iter()
                    .map(|e| e.within.as_str())
                    .collect::<Vec<_>>()
                    .join(";");
                let details = serde_json::to_string_pretty(details)
                    .map_err(|e| CheckerError::DataIntegrity(e.to_string()))?;

                Ok(Self {
                    status: Some(status),
                    within: Some(within),
                    aphia_id: Some(summary.aphia_id.0),
                    scientific_name: summary.scientific_name.clone(),
                    rank: summary.rank.clone(),
                    details,
                    error: None,
                })
            }
            CheckOutcome::Failed(summary) => Ok(Self {
                aphia_id: summary.aphia_id.map(|id| id.0),
                details: "{}".to_string(),
                error: Some(summary.error.clone()),
                ..Default::default()
            }),
        }
    }
}

/// Run the lineage in `classification` through the checker
pub async fn annotate_row(
    checker: &InvasiveChecker,
    row: &SampleRow,
) -> Result<RowAnnotation, CheckerError> {
    let lineage = row.classification.as_deref().unwrap_or_default();
    let outcome = checker
        .check_organism(row.sample_point(), lineage, IdSource::Lineage)
        .await?;
    RowAnnotation::from_outcome(&outcome)
}

/// Accept a number, a numeric string, or an empty cell
fn lenient_coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Cell {
        Number(f64),
        Text(String),
    }

    match Option::<Cell>::deserialize(deserializer)? {
        Some(Cell::Number(n)) => Ok(Some(n)),
        Some(Cell::Text(s)) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("na") {
                Ok(None)
            } else {
                s.parse().map(Some).map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{ErrorSummary, StatusSummary};
    use crate::status::StatusEntry;
    use crate::types::{AphiaId, RegionId};
    use serde_json::json;

    #[test]
    fn test_coordinate_aliases() {
        let row: SampleRow = serde_json::from_value(json!({
            "classification": "Animalia;Chordata;Gadus morhua",
            "decimalLongitude": 2.5,
            "sampleLatitude": "51.5",
            "otu": "OTU_17"
        }))
        .unwrap();

        assert_eq!(row.sample_point(), SamplePoint::new(2.5, 51.5));
        assert_eq!(row.columns.get("otu"), Some(&json!("OTU_17")));
    }

    #[test]
    fn test_missing_and_blank_coordinates() {
        let row: SampleRow =
            serde_json::from_value(json!({ "classification": "x", "lat": "" })).unwrap();
        assert_eq!(row.lon, None);
        assert_eq!(row.lat, None);
        assert!(row.sample_point().as_point().is_none());
    }

    #[test]
    fn test_annotation_of_checked_outcome() {
        let outcome = CheckOutcome::Checked {
            summary: StatusSummary {
                aphia_id: AphiaId(132762),
                identifier: "Hemigrapsus sanguineus".to_string(),
                source: "lineage".to_string(),
                scientific_name: Some("Hemigrapsus sanguineus".to_string()),
                rank: Some("Species".to_string()),
                sample_location: "POINT (2.5 51.5)".to_string(),
                status: vec![
                    StatusEntry::new("Introduced", RegionId(21912)),
                    StatusEntry::new("Native", RegionId(4)),
                ],
                within_distribution: true,
                introduced_at_sample_location: true,
                distribution_url: String::new(),
                nearest: None,
            },
            details: Vec::new(),
        };

        let annotation = RowAnnotation::from_outcome(&outcome).unwrap();
        assert_eq!(annotation.status.as_deref(), Some("Introduced;Native"));
        assert_eq!(annotation.within.as_deref(), Some("21912;4"));
        assert_eq!(annotation.aphia_id, Some(132762));

        let value = serde_json::to_value(&annotation).unwrap();
        assert_eq!(value["WRIMS Status"], json!("Introduced;Native"));
        assert!(value.get("Error").is_none());
    }

    #[test]
    fn test_annotation_of_failed_outcome() {
        let outcome = CheckOutcome::Failed(ErrorSummary {
            identifier: "Unknownia".to_string(),
            source: "lineage".to_string(),
            aphia_id: None,
            sample_location: "POINT EMPTY".to_string(),
            error: "Could not resolve".to_string(),
        });
        let annotation = RowAnnotation::from_outcome(&outcome).unwrap();
        assert_eq!(annotation.status, None);
        assert_eq!(annotation.details, "{}");
        assert_eq!(annotation.error.as_deref(), Some("Could not resolve"));
    }
}
