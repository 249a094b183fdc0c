//! Mock WoRMS and Marine Regions services shared by the integration tests
#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tracing_subscriber::fmt::MakeWriter;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use invasive_checker::cache::GeometryCacheConfig;
use invasive_checker::services::RemoteClientConfig;
use invasive_checker::CheckerConfig;

pub const WORMS: &str = "/worms";
pub const MR: &str = "/mr";

/// Southern North Sea box that contains (2.5, 51.5)
pub const NORTH_SEA_WKT: &str =
    "<http://www.opengis.net/def/crs/OGC/1.3/CRS84> POLYGON ((2 51, 3.5 51, 3.5 52, 2 52, 2 51))";
/// Box around Japan, far from the sample
pub const JAPAN_WKT: &str =
    "<http://www.opengis.net/def/crs/OGC/1.3/CRS84> POLYGON ((130 30, 140 30, 140 40, 130 40, 130 30))";

pub fn checker_config(server: &MockServer) -> CheckerConfig {
    CheckerConfig {
        worms_base_url: format!("{}{}", server.uri(), WORMS),
        marine_regions_base_url: format!("{}{}", server.uri(), MR),
        remote: RemoteClientConfig {
            rate_limit_backoff: std::time::Duration::from_millis(10),
            ..Default::default()
        },
        cache: GeometryCacheConfig::default(),
        ..Default::default()
    }
}

pub fn distribution_row(mrgid: &str, locality: &str, means: Option<&str>, status: &str) -> Value {
    json!({
        "locality": locality,
        "locationID": format!("http://marineregions.org/mrgid/{mrgid}"),
        "higherGeography": null,
        "higherGeographyID": null,
        "recordStatus": status,
        "typeStatus": null,
        "establishmentMeans": means,
        "invasiveness": null,
        "occurrence": null,
        "decimalLatitude": null,
        "decimalLongitude": null,
        "qualitystatus": "checked"
    })
}

pub fn geometry_document(mrgid: i64, wkt: &str) -> Value {
    json!([{
        "@id": format!("http://marineregions.org/mrgid/{mrgid}/geometries?source=1"),
        "http://www.opengis.net/ont/geosparql#asWKT": [{
            "@type": "http://www.opengis.net/ont/geosparql#wktLiteral",
            "@value": wkt
        }]
    }])
}

pub fn aphia_record(id: i64, name: &str) -> Value {
    json!({
        "AphiaID": id,
        "scientificname": name,
        "rank": "Species",
        "status": "accepted"
    })
}

pub async fn mount_distribution(server: &MockServer, aphia_id: i64, rows: Value) {
    Mock::given(method("GET"))
        .and(path(format!("{WORMS}/AphiaDistributionsByAphiaID/{aphia_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

pub async fn mount_geometry(server: &MockServer, mrgid: i64, wkt: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{MR}/getGazetteerGeometries.jsonld/{mrgid}/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(geometry_document(mrgid, wkt)))
        .mount(server)
        .await;
}

pub async fn mount_name(server: &MockServer, name: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("{WORMS}/AphiaRecordsByMatchNames")))
        .and(query_param("scientificnames[]", name))
        .respond_with(response)
        .mount(server)
        .await;
}

/// The full fixture:
///
/// - 132762 (Hemigrapsus sanguineus): Alien in 21912 (listed twice), Native
///   in 4, plus an invalid 21912 row
/// - 126436 (Gadus morhua): Native in 21912, no establishment means in 5
/// - NCBI 860360 maps to 132762
/// - 999 has no distribution, 666 has a malformed locationID
/// - region 5 has no geometry
pub async fn mount_fixture(server: &MockServer) {
    mount_distribution(
        server,
        132762,
        json!([
            distribution_row("21912", "Belgian part of the North Sea", Some("Alien"), "valid"),
            distribution_row("21912", "Belgian part of the North Sea", Some("Alien"), "valid"),
            distribution_row("4", "Japan", Some("Native"), "valid"),
            distribution_row("21912", "Belgian part of the North Sea", Some("Native"), "inaccurate"),
        ]),
    )
    .await;

    mount_distribution(
        server,
        126436,
        json!([
            distribution_row("21912", "Belgian part of the North Sea", Some("Native"), "valid"),
            distribution_row("5", "Somewhere", None, "valid"),
        ]),
    )
    .await;

    mount_distribution(
        server,
        666,
        json!([distribution_row("abc", "Nowhere", Some("Alien"), "valid")]),
    )
    .await;

    Mock::given(method("GET"))
        .and(path(format!("{WORMS}/AphiaDistributionsByAphiaID/999")))
        .respond_with(ResponseTemplate::new(204))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{WORMS}/AphiaRecordByExternalID/860360")))
        .and(query_param("type", "ncbi"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(aphia_record(132762, "Hemigrapsus sanguineus")),
        )
        .mount(server)
        .await;

    mount_name(
        server,
        "Gadus morhua",
        ResponseTemplate::new(200).set_body_json(json!([[aphia_record(126436, "Gadus morhua")]])),
    )
    .await;
    mount_name(server, "Nonexistus fictus", ResponseTemplate::new(204)).await;

    mount_geometry(server, 21912, NORTH_SEA_WKT).await;
    mount_geometry(server, 4, JAPAN_WKT).await;
    Mock::given(method("GET"))
        .and(path(format!("{MR}/getGazetteerGeometries.jsonld/5/")))
        .respond_with(ResponseTemplate::new(204))
        .mount(server)
        .await;
}

/// Collects JSON log lines written by a scoped subscriber
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Install a JSON subscriber for the current thread until the guard drops
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(self.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn events(&self) -> Vec<Value> {
        let buffer = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buffer)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Events at `level` whose message is exactly `message`
    pub fn matching(&self, level: &str, message: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|e| e["level"] == level && e["fields"]["message"] == message)
            .collect()
    }
}

pub struct LogCaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogCaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}
