//! VRS stop map search (JSON).
//!
//! The stop map on vrsinfo.de queries a TYPO3 eID endpoint that returns a
//! JSON array of matches. Results carry municipality and suburb as separate
//! fields but no `assnr`. Ids and coordinates arrive as strings or numbers
//! depending on the record, so both are accepted.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use serde::Deserialize;
use serde_json::Value;

use crate::coords::{CoordinateError, CoordinateSystem, Coordinates};
use crate::domain::{StationRecord, StopId};

use super::{SearchHit, StopSearch, records_from_hits};
use super::error::SearchError;

/// Default stop search endpoint.
const DEFAULT_URL: &str = "http://www.vrsinfo.de/index.php";

const DEFAULT_REFERER: &str = "http://www.vrsinfo.de/fahrplan/haltestellenkarte.html";

/// Bounding box sent with every query, verbatim, in the map's own units
/// (Gauss-Krüger easting/northing). It is never reprojected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl BoundingBox {
    /// The VRS network area as used by the stop map.
    pub const VRS: Self = Self {
        xmin: 2_511_000.0,
        xmax: 2_639_000.0,
        ymin: 5_566_000.0,
        ymax: 5_694_000.0,
    };
}

/// Configuration for the stop map search client.
#[derive(Debug, Clone)]
pub struct StopSearchConfig {
    pub url: String,
    pub referer: String,
    pub bbox: BoundingBox,
    /// System the returned `coord.x`/`coord.y` are expressed in.
    pub coordinate_system: CoordinateSystem,
    /// Client-specific pause after every query. None by default; the
    /// pipeline's own interval still applies.
    pub delay: Duration,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl StopSearchConfig {
    pub fn new() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            bbox: BoundingBox::VRS,
            coordinate_system: CoordinateSystem::Wgs84,
            delay: Duration::ZERO,
            timeout_secs: 30,
        }
    }

    /// Set a custom endpoint URL (for testing).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_coordinate_system(mut self, system: CoordinateSystem) -> Self {
        self.coordinate_system = system;
        self
    }
}

impl Default for StopSearchConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct CoordDto {
    x: Value,
    y: Value,
}

/// One element of the response array, as loosely typed as the service is.
#[derive(Debug, Deserialize)]
struct StopDto {
    #[serde(rename = "type")]
    kind: String,
    id: Value,
    name: Option<String>,
    gemeinde: Option<String>,
    ort: Option<String>,
    coord: Option<CoordDto>,
}

/// A stop as reported by the stop map search.
#[derive(Debug, Clone, PartialEq)]
pub struct StopHit {
    pub id: StopId,
    pub name: String,
    pub city: Option<String>,
    pub suburb: Option<String>,
    pub coords: Coordinates,
}

impl SearchHit for StopHit {
    fn id(&self) -> StopId {
        self.id
    }

    /// Normalise into a record, reprojecting if the service was configured
    /// with a projected system.
    fn into_record(self) -> Result<StationRecord, CoordinateError> {
        let position = self.coords.to_wgs84_point()?;
        Ok(StationRecord::new(self.id, self.name, position).with_locality(self.city, self.suburb))
    }
}

/// Client for the stop map search.
#[derive(Debug, Clone)]
pub struct StopSearchClient {
    http: reqwest::Client,
    url: String,
    bbox: BoundingBox,
    coordinate_system: CoordinateSystem,
    delay: Duration,
}

impl StopSearchClient {
    pub fn new(config: StopSearchConfig) -> Result<Self, SearchError> {
        let mut headers = HeaderMap::new();
        if let Ok(referer) = HeaderValue::from_str(&config.referer) {
            headers.insert(REFERER, referer);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            url: config.url,
            bbox: config.bbox,
            coordinate_system: config.coordinate_system,
            delay: config.delay,
        })
    }

    /// Send the query and return the parsed hits.
    pub async fn search_hits(&self, term: &str) -> Result<Vec<StopHit>, SearchError> {
        let response = self
            .http
            .get(&self.url)
            .query(&query_params(term, &self.bbox))
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SearchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        parse_response(&body, self.coordinate_system)
    }
}

impl StopSearch for StopSearchClient {
    async fn search(&self, term: &str) -> Result<Vec<StationRecord>, SearchError> {
        let hits = self.search_hits(term).await?;
        Ok(records_from_hits(hits))
    }

    fn delay(&self) -> Duration {
        self.delay
    }
}

fn query_params(term: &str, bbox: &BoundingBox) -> Vec<(&'static str, String)> {
    vec![
        ("eID", "tx_sbsgeoutil_getStops".to_string()),
        ("cmd", "stops".to_string()),
        ("search_string", term.to_string()),
        ("export_type", "json".to_string()),
        ("xmin", bbox.xmin.to_string()),
        ("xmax", bbox.xmax.to_string()),
        ("ymin", bbox.ymin.to_string()),
        ("ymax", bbox.ymax.to_string()),
    ]
}

/// Accept `123`, `123.5` and `"123"`.
fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_stop_id(value: &Value) -> Option<StopId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse a stop map response.
///
/// Elements that are not stops are ignored; stops missing an id, name or
/// usable coordinates are logged and skipped. An empty body or `null` is an
/// empty result.
pub fn parse_response(body: &str, system: CoordinateSystem) -> Result<Vec<StopHit>, SearchError> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }

    let items: Vec<Value> = serde_json::from_str(trimmed).map_err(|e| SearchError::Json {
        message: e.to_string(),
        body: Some(trimmed.chars().take(500).collect()),
    })?;

    let hits = items
        .into_iter()
        .filter_map(|item| {
            let dto: StopDto = match serde_json::from_value(item) {
                Ok(dto) => dto,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable search result");
                    return None;
                }
            };
            if dto.kind != "stop" {
                return None;
            }
            match stop_hit(dto, system) {
                Ok(hit) => Some(hit),
                Err(reason) => {
                    tracing::warn!(%reason, "Skipping malformed stop");
                    None
                }
            }
        })
        .collect();
    Ok(hits)
}

fn stop_hit(dto: StopDto, system: CoordinateSystem) -> Result<StopHit, String> {
    let id = as_stop_id(&dto.id).ok_or_else(|| format!("invalid id {}", dto.id))?;
    let name = dto.name.ok_or_else(|| format!("stop {id} has no name"))?;
    let coord = dto
        .coord
        .ok_or_else(|| format!("stop {id} has no coordinates"))?;
    let (x, y) = match (as_f64(&coord.x), as_f64(&coord.y)) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(format!("stop {id} has non-numeric coordinates")),
    };

    Ok(StopHit {
        id,
        name,
        city: dto.gemeinde,
        suburb: dto.ort,
        coords: Coordinates::new(system, x, y),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"[
        {"type": "stop", "id": "900000318", "name": "Ebertplatz", "gemeinde": "Köln",
         "ort": "Neustadt-Nord", "coord": {"x": "6.9573", "y": "50.9494"}},
        {"type": "poi", "id": "17", "name": "Museum"},
        {"type": "stop", "id": 900000001, "name": "Dom/Hbf", "gemeinde": "Köln",
         "ort": null, "coord": {"x": 6.958, "y": 50.941}},
        {"type": "stop", "id": "x1", "name": "Bad id", "coord": {"x": 1, "y": 2}},
        {"type": "stop", "id": "900000002", "name": "No coord"}
    ]"#;

    #[test]
    fn parses_stops() {
        let hits = parse_response(RESPONSE, CoordinateSystem::Wgs84).unwrap();
        assert_eq!(hits.len(), 2);

        assert_eq!(hits[0].id, 900_000_318);
        assert_eq!(hits[0].name, "Ebertplatz");
        assert_eq!(hits[0].city.as_deref(), Some("Köln"));
        assert_eq!(hits[0].suburb.as_deref(), Some("Neustadt-Nord"));
        assert_eq!(
            hits[0].coords,
            Coordinates::new(CoordinateSystem::Wgs84, 6.9573, 50.9494)
        );

        assert_eq!(hits[1].id, 900_000_001);
        assert_eq!(hits[1].suburb, None);
    }

    #[test]
    fn empty_and_null_bodies() {
        assert!(parse_response("", CoordinateSystem::Wgs84).unwrap().is_empty());
        assert!(parse_response(" null ", CoordinateSystem::Wgs84).unwrap().is_empty());
        assert!(parse_response("[]", CoordinateSystem::Wgs84).unwrap().is_empty());
    }

    #[test]
    fn non_json_is_an_error() {
        let err = parse_response("<html>busy</html>", CoordinateSystem::Wgs84).unwrap_err();
        match err {
            SearchError::Json { body, .. } => assert_eq!(body.as_deref(), Some("<html>busy</html>")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn hit_keeps_locality_without_reprojection() {
        let hits = parse_response(RESPONSE, CoordinateSystem::Wgs84).unwrap();
        let record = hits[0].clone().into_record().unwrap();

        assert_eq!(record.longitude(), 6.9573);
        assert_eq!(record.latitude(), 50.9494);
        assert_eq!(record.assnr, None);
        assert_eq!(record.city.as_deref(), Some("Köln"));
    }

    #[test]
    fn query_carries_bbox() {
        let params = query_params("Ebertplatz, köln", &BoundingBox::VRS);
        assert!(params.contains(&("search_string", "Ebertplatz, köln".to_string())));
        assert!(params.contains(&("export_type", "json".to_string())));
        assert!(params.contains(&("xmin", "2511000".to_string())));
        assert!(params.contains(&("ymax", "5694000".to_string())));
    }

    #[test]
    fn config_defaults() {
        let config = StopSearchConfig::default();
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.delay, Duration::ZERO);
        assert_eq!(config.coordinate_system, CoordinateSystem::Wgs84);

        let client = StopSearchClient::new(config.with_delay(Duration::from_secs(1))).unwrap();
        assert_eq!(client.delay(), Duration::from_secs(1));
    }
}
