//! Region geometry parsing and spatial predicates
//!
//! Marine Regions serves region geometries as JSON-LD documents in which each
//! fragment is a GeoSPARQL `asWKT` literal, usually prefixed with a CRS IRI:
//!
//! ```text
//! "<http://www.opengis.net/def/crs/OGC/1.3/CRS84> MULTIPOLYGON (((...)))"
//! ```
//!
//! Fragments are parsed independently (a malformed one is skipped), capped to
//! a fixed count, and the polygonal parts unioned into a single MultiPolygon,
//! so edges shared by adjacent fragments lie inside the region.
//! Only point-in-polygon and nearest-point distance are supported.

use geo::{
    BooleanOps, Closest, ClosestPoint, Contains, EuclideanDistance, Geometry,
    HaversineDistance, MultiPolygon, Point, Polygon,
};
use serde_json::Value;
use tracing::{debug, warn};
use wkt::TryFromWkt;

/// Default cap on fragments combined per region
pub const DEFAULT_FRAGMENT_LIMIT: usize = 20;

/// Combined geometry for one gazetteer region
#[derive(Debug, Clone, PartialEq)]
pub struct RegionGeometry {
    shape: MultiPolygon<f64>,
    /// Number of fragments that went into `shape`
    pub fragments_used: usize,
    /// Number of parsed fragments dropped by the cap
    pub fragments_dropped: usize,
}

impl RegionGeometry {
    pub fn shape(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    /// Strict containment; points on the boundary are not contained
    pub fn contains(&self, point: &Point<f64>) -> bool {
        self.shape.contains(point)
    }

    /// Planar distance in degrees, zero when the point is inside
    pub fn distance_deg(&self, point: &Point<f64>) -> f64 {
        point.euclidean_distance(&self.shape)
    }

    /// Great-circle distance in km from the point to the nearest boundary
    /// point of the region, rounded to the nearest 10 km.
    pub fn nearest_distance_km(&self, point: &Point<f64>) -> Option<f64> {
        if self.contains(point) {
            return Some(0.0);
        }
        let nearest = match self.shape.closest_point(point) {
            Closest::Intersection(p) | Closest::SinglePoint(p) => p,
            Closest::Indeterminate => return None,
        };
        let km = nearest.haversine_distance(point) / 1000.0;
        Some((km / 10.0).round() * 10.0)
    }
}

/// Collect every `asWKT` literal in a JSON-LD document, in document order.
///
/// Accepts full IRIs (`http://www.opengis.net/ont/geosparql#asWKT`) as well as
/// compacted keys (`gsp:asWKT`, `asWKT`). Values may be plain strings,
/// `{"@value": ...}` objects, or arrays of either.
pub fn extract_wkt_literals(document: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_literals(document, &mut out);
    out
}

fn collect_literals(node: &Value, out: &mut Vec<String>) {
    match node {
        Value::Array(items) => items.iter().for_each(|item| collect_literals(item, out)),
        Value::Object(map) => {
            for (key, value) in map {
                if key.ends_with("asWKT") {
                    literal_values(value, out);
                } else {
                    collect_literals(value, out);
                }
            }
        }
        _ => {}
    }
}

fn literal_values(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|item| literal_values(item, out)),
        Value::Object(map) => {
            if let Some(Value::String(s)) = map.get("@value") {
                out.push(s.clone());
            }
        }
        _ => {}
    }
}

/// Remove a leading `<crs-iri>` from a GeoSPARQL WKT literal
pub fn strip_crs(literal: &str) -> &str {
    let trimmed = literal.trim();
    if trimmed.starts_with('<') {
        if let Some(end) = trimmed.find('>') {
            return trimmed[end + 1..].trim_start();
        }
    }
    trimmed
}

/// Parse one literal into a geometry; `None` if it is not valid WKT
pub fn parse_fragment(literal: &str) -> Option<Geometry<f64>> {
    match Geometry::<f64>::try_from_wkt_str(strip_crs(literal)) {
        Ok(geometry) => Some(geometry),
        Err(e) => {
            debug!(error = %e, "Skipping malformed WKT fragment");
            None
        }
    }
}

/// Parse a full gazetteer geometry document into a combined region geometry.
///
/// Returns `None` when no usable polygonal fragment remains.
pub fn region_geometry_from_document(document: &Value, fragment_limit: usize) -> Option<RegionGeometry> {
    let fragments: Vec<Geometry<f64>> = extract_wkt_literals(document)
        .iter()
        .filter_map(|literal| parse_fragment(literal))
        .collect();
    combine_fragments(fragments, fragment_limit)
}

/// Union at most `limit` fragments into one MultiPolygon.
///
/// Points and lines cannot contain a sample and are ignored.
pub fn combine_fragments(fragments: Vec<Geometry<f64>>, limit: usize) -> Option<RegionGeometry> {
    let total = fragments.len();
    if total > limit {
        warn!(
            fragments = total,
            limit = limit,
            "Region has too many geometry fragments, combining only the first ones"
        );
    }

    let kept = total.min(limit);
    let mut polygons = Vec::new();
    for fragment in fragments.into_iter().take(limit) {
        push_polygons(fragment, &mut polygons);
    }

    if polygons.is_empty() {
        return None;
    }

    Some(RegionGeometry {
        shape: union_all(polygons),
        fragments_used: kept,
        fragments_dropped: total - kept,
    })
}

fn union_all(polygons: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    let mut parts = polygons.into_iter().map(|p| MultiPolygon::new(vec![p]));
    let first = parts.next().unwrap_or_else(|| MultiPolygon::new(Vec::new()));
    parts.fold(first, |acc, part| acc.union(&part))
}

fn push_polygons(geometry: Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p),
        Geometry::MultiPolygon(mp) => out.extend(mp.0),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for g in gc.0 {
                push_polygons(g, out);
            }
        }
        Geometry::Point(_)
        | Geometry::MultiPoint(_)
        | Geometry::Line(_)
        | Geometry::LineString(_)
        | Geometry::MultiLineString(_) => {}
    }
}
