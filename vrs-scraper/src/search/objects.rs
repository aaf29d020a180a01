//! VRS object search (XML).
//!
//! The timetable information service accepts an XML `ObjectInfo` request and
//! answers with matching objects. Stops carry their position as a
//! comma-separated pair in the SRS named in the request, which is reprojected
//! to WGS84 before a record leaves this module.
//!
//! The service expects the request body in ISO-8859-1.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, REFERER};
use roxmltree::{Document, Node};

use crate::coords::{CoordinateError, CoordinateSystem, Coordinates, parse_pair};
use crate::domain::{StationRecord, StopId};

use super::{SearchHit, StopSearch, records_from_hits};
use super::error::SearchError;

/// Default object search endpoint.
const DEFAULT_URL: &str = "http://auskunft.vrsinfo.de/vrs/cgi/service/objects";

/// The endpoint checks that requests come from its own route form.
const DEFAULT_REFERER: &str = "http://auskunft.vrsinfo.de/vrs/cgi/process/eingabeRoute";

/// Municipality key restricting the search (5 = Köln).
const DEFAULT_GKZ: u32 = 5;

/// Pause after each query.
const DEFAULT_DELAY: Duration = Duration::from_secs(2);

/// Configuration for the object search client.
#[derive(Debug, Clone)]
pub struct ObjectSearchConfig {
    pub url: String,
    pub referer: String,
    /// Municipality key sent in the `<GKZ>` filter.
    pub gkz: u32,
    /// System the service should report coordinates in.
    pub output_system: CoordinateSystem,
    /// Fixed pause after every query.
    pub delay: Duration,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ObjectSearchConfig {
    pub fn new() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            gkz: DEFAULT_GKZ,
            output_system: CoordinateSystem::UTM32,
            delay: DEFAULT_DELAY,
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

    pub fn with_gkz(mut self, gkz: u32) -> Self {
        self.gkz = gkz;
        self
    }
}

impl Default for ObjectSearchConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A stop as reported by the object search, before reprojection.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectHit {
    pub id: StopId,
    pub assnr: Option<i64>,
    pub name: String,
    pub coords: Coordinates,
}

impl SearchHit for ObjectHit {
    fn id(&self) -> StopId {
        self.id
    }

    /// Reproject into WGS84 and normalise.
    fn into_record(self) -> Result<StationRecord, CoordinateError> {
        let position = self.coords.to_wgs84_point()?;
        let mut record = StationRecord::new(self.id, self.name, position);
        record.assnr = self.assnr;
        Ok(record)
    }
}

/// Client for the VRS object search.
#[derive(Debug, Clone)]
pub struct ObjectSearchClient {
    http: reqwest::Client,
    url: String,
    gkz: u32,
    output_system: CoordinateSystem,
    delay: Duration,
}

impl ObjectSearchClient {
    pub fn new(config: ObjectSearchConfig) -> Result<Self, SearchError> {
        let mut headers = HeaderMap::new();
        if let Ok(referer) = HeaderValue::from_str(&config.referer) {
            headers.insert(REFERER, referer);
        }
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/xml; charset=ISO-8859-1"),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            url: config.url,
            gkz: config.gkz,
            output_system: config.output_system,
            delay: config.delay,
        })
    }

    /// Send the raw request and return the parsed hits.
    pub async fn search_hits(&self, term: &str) -> Result<Vec<ObjectHit>, SearchError> {
        let body = encode_latin1(&request_body(term, self.gkz, self.output_system));

        let response = self.http.post(&self.url).body(body).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SearchError::Status {
                status: status.as_u16(),
            });
        }

        let text = response.text_with_charset("ISO-8859-1").await?;
        parse_response(&text, self.output_system)
    }
}

impl StopSearch for ObjectSearchClient {
    async fn search(&self, term: &str) -> Result<Vec<StationRecord>, SearchError> {
        let hits = self.search_hits(term).await?;
        Ok(records_from_hits(hits))
    }

    fn delay(&self) -> Duration {
        self.delay
    }
}

/// Build the `ObjectInfo` request for a search string.
pub fn request_body(term: &str, gkz: u32, output_system: CoordinateSystem) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="ISO-8859-1"?><Request>"#,
            "<ObjectInfo><ObjectSearch><String>{term}</String><Classes>",
            "<Stop><GKZ>{gkz}</GKZ></Stop></Classes></ObjectSearch>",
            "<Options><Output><SRSName>{srs}</SRSName></Output></Options>",
            "</ObjectInfo></Request>"
        ),
        term = escape_xml(term),
        gkz = gkz,
        srs = output_system.srs_name(),
    )
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Encode as ISO-8859-1.
///
/// Code points up to U+00FF map to the byte of the same value. Everything
/// else becomes a numeric character reference, which the XML parser on the
/// other end resolves.
fn encode_latin1(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match u8::try_from(u32::from(c)) {
            Ok(byte) => out.push(byte),
            Err(_) => out.extend_from_slice(format!("&#{};", u32::from(c)).as_bytes()),
        }
    }
    out
}

/// Element names are compared case-insensitively: the service has answered
/// both `<Object>` and `<object>` over time.
fn is_named(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name().eq_ignore_ascii_case(name)
}

/// Text of the first descendant element called `name`.
fn find_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.descendants()
        .skip(1)
        .find(|n| is_named(n, name))
        .and_then(|n| n.text())
        .map(str::trim)
}

/// Parse an object search response into stop hits.
///
/// Non-stop objects are ignored. Stops with a missing id or name, or a
/// coordinate string that is not exactly two numbers, are logged and skipped.
pub fn parse_response(
    xml: &str,
    system: CoordinateSystem,
) -> Result<Vec<ObjectHit>, SearchError> {
    let doc = Document::parse(xml)?;

    let hits = doc
        .descendants()
        .filter(|n| is_named(n, "object"))
        .filter(|obj| find_text(*obj, "type") == Some("Stop"))
        .filter_map(|obj| match parse_stop(obj, system) {
            Ok(hit) => Some(hit),
            Err(reason) => {
                tracing::warn!(%reason, "Skipping malformed stop object");
                None
            }
        })
        .collect();
    Ok(hits)
}

fn parse_stop(obj: Node<'_, '_>, system: CoordinateSystem) -> Result<ObjectHit, String> {
    let id = find_text(obj, "id")
        .ok_or("missing id")?
        .parse::<StopId>()
        .map_err(|e| format!("invalid id: {e}"))?;

    let name = find_text(obj, "value")
        .ok_or_else(|| format!("stop {id} has no name"))?
        .to_string();

    let assnr = obj
        .descendants()
        .find(|n| is_named(n, "stop"))
        .and_then(|stop| find_text(stop, "assnr"))
        .and_then(|raw| raw.parse::<i64>().ok());

    let raw = find_text(obj, "coords").ok_or_else(|| format!("stop {id} has no coordinates"))?;
    let (x, y) = parse_pair(raw).map_err(|e| format!("stop {id}: {e}"))?;

    Ok(ObjectHit {
        id,
        assnr,
        name,
        coords: Coordinates::new(system, x, y),
    })
}
