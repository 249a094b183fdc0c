//! Shared identifiers and the crate-level error type

use geo::Point;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical WoRMS taxon identifier (AphiaID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AphiaId(pub i64);

impl fmt::Display for AphiaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AphiaId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(AphiaId)
    }
}

/// Marine Regions gazetteer identifier (MRGID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub i64);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RegionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(RegionId)
    }
}

/// Sample coordinate in WGS84 degrees.
///
/// Either coordinate may be missing (negative controls, incomplete metadata).
/// A point with a missing coordinate is untestable: it never fetches geometry
/// and never contains anything.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SamplePoint {
    pub lon: Option<f64>,
    pub lat: Option<f64>,
}

impl SamplePoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self {
            lon: Some(lon),
            lat: Some(lat),
        }
    }

    pub fn from_parts(lon: Option<f64>, lat: Option<f64>) -> Self {
        Self { lon, lat }
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    /// The point as a geo Point, if both coordinates are present and finite
    pub fn as_point(&self) -> Option<Point<f64>> {
        match (self.lon, self.lat) {
            (Some(lon), Some(lat)) if lon.is_finite() && lat.is_finite() => {
                Some(Point::new(lon, lat))
            }
            _ => None,
        }
    }

    pub fn is_null_island(&self) -> bool {
        self.lon == Some(0.0) && self.lat == Some(0.0)
    }

    pub fn to_wkt(&self) -> String {
        match self.as_point() {
            Some(p) => format!("POINT ({} {})", p.x(), p.y()),
            None => "POINT EMPTY".to_string(),
        }
    }
}

/// Errors the checker refuses to paper over.
///
/// Expected outcomes (unresolvable names, taxa without distributions,
/// upstream HTTP failures) are reported as `CheckOutcome::Failed` instead.
#[derive(Debug, thiserror::Error)]
pub enum CheckerError {
    /// Upstream data violated an assumption the verdict depends on
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CheckerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_point_requires_both_coordinates() {
        assert!(SamplePoint::new(2.5, 51.5).as_point().is_some());
        assert!(SamplePoint::from_parts(Some(2.5), None).as_point().is_none());
        assert!(SamplePoint::from_parts(None, Some(51.5)).as_point().is_none());
        assert!(SamplePoint::from_parts(Some(f64::NAN), Some(1.0)).as_point().is_none());
    }

    #[test]
    fn test_null_island() {
        assert!(SamplePoint::new(0.0, 0.0).is_null_island());
        assert!(!SamplePoint::new(-0.01, -0.01).is_null_island());
        assert!(!SamplePoint::unknown().is_null_island());
    }

    #[test]
    fn test_wkt_rendering() {
        assert_eq!(SamplePoint::new(2.5, 51.5).to_wkt(), "POINT (2.5 51.5)");
        assert_eq!(SamplePoint::unknown().to_wkt(), "POINT EMPTY");
    }

    #[test]
    fn test_id_parsing() {
        assert_eq!(" 132762 ".parse::<AphiaId>().unwrap(), AphiaId(132762));
        assert!("abc".parse::<RegionId>().is_err());
    }
}
