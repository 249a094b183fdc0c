//! Geometry Resolver
//!
//! Turns an MRGID into a cached, combined region geometry and answers
//! point-in-region questions. Geometry documents are fetched without the
//! remote client's URL memo so the geometry cache's retention governs
//! how long a downloaded polygon is trusted.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{CachedGeometry, GeometryCache};
use crate::geometry::{region_geometry_from_document, RegionGeometry};
use crate::services::remote::{RemoteClient, TransportError};
use crate::types::{RegionId, SamplePoint};

pub struct GeometryResolver {
    client: Arc<RemoteClient>,
    base_url: String,
    cache: Arc<GeometryCache>,
    fragment_limit: usize,
}

impl GeometryResolver {
    pub fn new(
        client: Arc<RemoteClient>,
        marine_regions_base_url: impl Into<String>,
        cache: Arc<GeometryCache>,
        fragment_limit: usize,
    ) -> Self {
        Self {
            client,
            base_url: marine_regions_base_url
                .into()
                .trim_end_matches('/')
                .to_string(),
            cache,
            fragment_limit,
        }
    }

    pub fn cache(&self) -> &Arc<GeometryCache> {
        &self.cache
    }

    pub fn geometry_url(&self, region: RegionId) -> String {
        format!("{}/getGazetteerGeometries.jsonld/{}/", self.base_url, region)
    }

    /// Combined geometry for a region, through the cache
    pub async fn geometry(&self, region: RegionId) -> Result<CachedGeometry, TransportError> {
        self.cache
            .get_or_fetch_with_expiry(region, || self.fetch_geometry(region))
            .await
    }

    /// Like [`geometry`](Self::geometry) but a transport failure is logged
    /// and reported as "no geometry".
    pub async fn resolve_region(&self, region: RegionId) -> CachedGeometry {
        match self.geometry(region).await {
            Ok(geometry) => geometry,
            Err(e) => {
                warn!(mrgid = %region, error = %e, "Region geometry unavailable");
                None
            }
        }
    }

    /// Whether the sample lies strictly inside the region.
    ///
    /// An untestable point never triggers a geometry fetch.
    pub async fn region_contains(&self, region: RegionId, sample: &SamplePoint) -> bool {
        let Some(point) = sample.as_point() else {
            return false;
        };

        match self.resolve_region(region).await {
            Some(geometry) => geometry.contains(&point),
            None => false,
        }
    }

    async fn fetch_geometry(&self, region: RegionId) -> Result<Option<RegionGeometry>, TransportError> {
        let url = self.geometry_url(region);
        let document: Option<serde_json::Value> = self.client.fetch_json_fresh(&url).await?;

        let Some(document) = document else {
            debug!(mrgid = %region, "Gazetteer has no geometry for region");
            return Ok(None);
        };

        let geometry = region_geometry_from_document(&document, self.fragment_limit);
        match &geometry {
            Some(g) => debug!(
                mrgid = %region,
                fragments = g.fragments_used,
                polygons = g.shape().0.len(),
                "Region geometry loaded"
            ),
            None => debug!(mrgid = %region, "Region geometry has no usable fragments"),
        }
        Ok(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::GeometryCacheConfig;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn square(x: f64, y: f64) -> serde_json::Value {
        json!({
            "@id": "http://marineregions.org/mrgid/1/geometries?source=1",
            "http://www.opengis.net/ont/geosparql#asWKT": {
                "@value": format!(
                    "<http://www.opengis.net/def/crs/OGC/1.3/CRS84> POLYGON (({x} {y}, {} {y}, {} {}, {x} {}, {x} {y}))",
                    x + 1.0, x + 1.0, y + 1.0, y + 1.0
                )
            }
        })
    }

    fn resolver(server: &MockServer, cache: GeometryCacheConfig) -> GeometryResolver {
        GeometryResolver::new(
            Arc::new(RemoteClient::with_defaults()),
            server.uri(),
            Arc::new(GeometryCache::new(cache)),
            20,
        )
    }

    #[tokio::test]
    async fn test_cache_hit_makes_no_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getGazetteerGeometries.jsonld/21912/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([square(2.0, 51.0)])))
            .expect(1)
            .mount(&server)
            .await;

        let resolver = resolver(&server, GeometryCacheConfig::default());
        let sample = SamplePoint::new(2.5, 51.5);

        assert!(resolver.region_contains(RegionId(21912), &sample).await);
        assert!(resolver.region_contains(RegionId(21912), &sample).await);
        assert_eq!(resolver.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn test_stale_entry_triggers_one_refetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getGazetteerGeometries.jsonld/5/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([square(0.0, 0.0)])))
            .expect(2)
            .mount(&server)
            .await;

        let resolver = resolver(
            &server,
            GeometryCacheConfig {
                retention: Duration::from_millis(30),
                ..Default::default()
            },
        );

        resolver.geometry(RegionId(5)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        resolver.geometry(RegionId(5)).await.unwrap();
        resolver.geometry(RegionId(5)).await.unwrap();
    }

    #[tokio::test]
    async fn test_fragment_cap() {
        let fragments: Vec<_> = (0..25).map(|i| square(i as f64 * 2.0, 0.0)).collect();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::Value::Array(fragments)))
            .mount(&server)
            .await;

        let resolver = resolver(&server, GeometryCacheConfig::default());
        let geometry = resolver.geometry(RegionId(1)).await.unwrap().unwrap();
        assert_eq!(geometry.fragments_used, 20);
        assert!(resolver.region_contains(RegionId(1), &SamplePoint::new(38.5, 0.5)).await);
        assert!(!resolver.region_contains(RegionId(1), &SamplePoint::new(48.5, 0.5)).await);
    }

    #[tokio::test]
    async fn test_no_fragments_is_not_contained() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getGazetteerGeometries.jsonld/1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "@id": "x" }])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/getGazetteerGeometries.jsonld/2/"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let resolver = resolver(&server, GeometryCacheConfig::default());
        let sample = SamplePoint::new(0.5, 0.5);
        assert!(!resolver.region_contains(RegionId(1), &sample).await);
        assert!(!resolver.region_contains(RegionId(2), &sample).await);
    }

    #[tokio::test]
    async fn test_untestable_point_skips_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([square(0.0, 0.0)])))
            .expect(0)
            .mount(&server)
            .await;

        let resolver = resolver(&server, GeometryCacheConfig::default());
        let sample = SamplePoint::from_parts(Some(0.5), None);
        assert!(!resolver.region_contains(RegionId(1), &sample).await);
    }

    #[tokio::test]
    async fn test_transport_error_degrades_and_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let resolver = resolver(&server, GeometryCacheConfig::default());
        let sample = SamplePoint::new(0.5, 0.5);
        assert!(!resolver.region_contains(RegionId(1), &sample).await);
        assert!(!resolver.region_contains(RegionId(1), &sample).await);
        assert!(resolver.cache().is_empty());
    }
}
