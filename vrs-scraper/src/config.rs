//! Run configuration.
//!
//! Everything has a default matching the usual Cologne run; each value can
//! be overridden through a `VRS_*` environment variable.

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_PATH;
use crate::coords::CoordinateSystem;
use crate::pipeline::DEFAULT_TERM_INTERVAL;
use crate::qrcodes::DEFAULT_QR_CODES_PATH;
use crate::terms::{DEFAULT_STREETS_URL, TermSource};

/// Default boundary polygon file.
pub const DEFAULT_BOUNDARY_PATH: &str = "koeln_polygon.geojson";

/// Default export file.
pub const DEFAULT_OUTPUT_PATH: &str = "stations.csv";

/// Default plain-text station list.
pub const DEFAULT_STATION_NAMES_PATH: &str = "stationsnamen.txt";

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has a value we do not understand
    #[error("invalid value {value:?} for {key}: expected {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Which VRS service answers the station searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchBackend {
    /// XML object search of the journey planner.
    #[default]
    Objects,
    /// JSON stop map search.
    Stops,
}

impl SearchBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "objects" | "xml" => Some(Self::Objects),
            "stops" | "json" => Some(Self::Stops),
            _ => None,
        }
    }
}

/// Configuration for a scrape run.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub cache_path: PathBuf,
    pub boundary_path: PathBuf,
    pub output_path: PathBuf,
    pub term_source: TermSource,
    pub backend: SearchBackend,
    /// Overrides the backend's own pause between queries.
    pub search_delay: Option<Duration>,
    /// Overrides the backend's endpoint.
    pub search_url: Option<String>,
    /// Minimum pause between two terms, for every backend.
    pub term_interval: Duration,
    /// System the stop map reports its coordinates in.
    pub stops_system: CoordinateSystem,
    /// Where the `qrcodes` mode writes its list.
    pub qr_codes_path: PathBuf,
}

impl ScraperConfig {
    pub fn new() -> Self {
        Self {
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            boundary_path: PathBuf::from(DEFAULT_BOUNDARY_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            term_source: TermSource::QrCodes(PathBuf::from(DEFAULT_QR_CODES_PATH)),
            backend: SearchBackend::default(),
            search_delay: None,
            search_url: None,
            term_interval: DEFAULT_TERM_INTERVAL,
            stops_system: CoordinateSystem::Wgs84,
            qr_codes_path: PathBuf::from(DEFAULT_QR_CODES_PATH),
        }
    }

    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    pub fn with_boundary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.boundary_path = path.into();
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_term_source(mut self, source: TermSource) -> Self {
        self.term_source = source;
        self
    }

    pub fn with_backend(mut self, backend: SearchBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = Some(delay);
        self
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = Some(url.into());
        self
    }

    pub fn with_term_interval(mut self, interval: Duration) -> Self {
        self.term_interval = interval;
        self
    }

    pub fn with_stops_system(mut self, system: CoordinateSystem) -> Self {
        self.stops_system = system;
        self
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys keep their default.
    ///
    /// Recognised keys: `VRS_CACHE_PATH`, `VRS_BOUNDARY_PATH`,
    /// `VRS_OUTPUT_PATH`, `VRS_QR_CODES_PATH`, `VRS_TERM_SOURCE`
    /// (`qrcodes`, `textfile`, `streets`, `letters`), `VRS_TERM_FILE`,
    /// `VRS_STREETS_URL`, `VRS_BACKEND` (`objects`, `stops`),
    /// `VRS_SEARCH_DELAY_MS`, `VRS_SEARCH_URL`, `VRS_TERM_INTERVAL_MS`,
    /// `VRS_STOPS_SRS` (EPSG code or SRS name, e.g. `4326` or `EPSG:25832`).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(path) = lookup("VRS_CACHE_PATH") {
            config.cache_path = path.into();
        }
        if let Some(path) = lookup("VRS_BOUNDARY_PATH") {
            config.boundary_path = path.into();
        }
        if let Some(path) = lookup("VRS_OUTPUT_PATH") {
            config.output_path = path.into();
        }
        if let Some(path) = lookup("VRS_QR_CODES_PATH") {
            config.qr_codes_path = path.into();
        }

        let term_file = lookup("VRS_TERM_FILE").map(PathBuf::from);
        let kind = lookup("VRS_TERM_SOURCE").unwrap_or_else(|| "qrcodes".to_string());
        config.term_source = match kind.trim().to_ascii_lowercase().as_str() {
            "qrcodes" => {
                TermSource::QrCodes(term_file.unwrap_or_else(|| config.qr_codes_path.clone()))
            }
            "textfile" => TermSource::StationNames(
                term_file.unwrap_or_else(|| PathBuf::from(DEFAULT_STATION_NAMES_PATH)),
            ),
            "streets" => TermSource::Streets(
                lookup("VRS_STREETS_URL").unwrap_or_else(|| DEFAULT_STREETS_URL.to_string()),
            ),
            "letters" => TermSource::LetterPairs,
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "VRS_TERM_SOURCE",
                    value: kind,
                    expected: "qrcodes, textfile, streets or letters",
                });
            }
        };

        if let Some(value) = lookup("VRS_BACKEND") {
            config.backend =
                SearchBackend::parse(&value).ok_or_else(|| ConfigError::InvalidValue {
                    key: "VRS_BACKEND",
                    value: value.clone(),
                    expected: "objects or stops",
                })?;
        }

        if let Some(value) = lookup("VRS_SEARCH_DELAY_MS") {
            config.search_delay = Some(parse_millis("VRS_SEARCH_DELAY_MS", value)?);
        }
        if let Some(value) = lookup("VRS_TERM_INTERVAL_MS") {
            config.term_interval = parse_millis("VRS_TERM_INTERVAL_MS", value)?;
        }

        if let Some(value) = lookup("VRS_STOPS_SRS") {
            config.stops_system =
                parse_system(&value).ok_or_else(|| ConfigError::InvalidValue {
                    key: "VRS_STOPS_SRS",
                    value: value.clone(),
                    expected: "an EPSG code or SRS name of WGS84 or ETRS89/UTM",
                })?;
        }

        config.search_url = lookup("VRS_SEARCH_URL");
        Ok(config)
    }
}

fn parse_millis(key: &'static str, value: String) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(millis) => Ok(Duration::from_millis(millis)),
        Err(_) => Err(ConfigError::InvalidValue {
            key,
            value,
            expected: "a whole number of milliseconds",
        }),
    }
}

/// `4326`, `EPSG:25832` or `urn:adv:crs:ETRS89_UTM32`.
fn parse_system(value: &str) -> Option<CoordinateSystem> {
    let value = value.trim();
    match value.parse::<u32>() {
        Ok(code) => CoordinateSystem::from_epsg(code).ok(),
        Err(_) => CoordinateSystem::from_srs_name(value).ok(),
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ScraperConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.cache_path, PathBuf::from("scrape_cache.db"));
        assert_eq!(config.boundary_path, PathBuf::from("koeln_polygon.geojson"));
        assert_eq!(config.output_path, PathBuf::from("stations.csv"));
        assert_eq!(
            config.term_source,
            TermSource::QrCodes(PathBuf::from("kvb-qr-codes.csv"))
        );
        assert_eq!(config.backend, SearchBackend::Objects);
        assert_eq!(config.search_delay, None);
        assert_eq!(config.search_url, None);
        assert_eq!(config.term_interval, Duration::from_secs(2));
        assert_eq!(config.stops_system, CoordinateSystem::Wgs84);
    }

    #[test]
    fn term_interval_and_stops_system() {
        let config = ScraperConfig::from_lookup(lookup_from(&[
            ("VRS_TERM_INTERVAL_MS", "500"),
            ("VRS_STOPS_SRS", "EPSG:25832"),
        ]))
        .unwrap();
        assert_eq!(config.term_interval, Duration::from_millis(500));
        assert_eq!(config.stops_system, CoordinateSystem::UTM32);

        let config =
            ScraperConfig::from_lookup(lookup_from(&[("VRS_STOPS_SRS", "4326")])).unwrap();
        assert_eq!(config.stops_system, CoordinateSystem::Wgs84);

        // Gauss-Krüger is not supported.
        let err =
            ScraperConfig::from_lookup(lookup_from(&[("VRS_STOPS_SRS", "EPSG:31466")])).unwrap_err();
        assert!(err.to_string().contains("VRS_STOPS_SRS"));
    }

    #[test]
    fn env_overrides() {
        let config = ScraperConfig::from_lookup(lookup_from(&[
            ("VRS_CACHE_PATH", "/tmp/cache.db"),
            ("VRS_TERM_SOURCE", "TextFile"),
            ("VRS_TERM_FILE", "names.txt"),
            ("VRS_BACKEND", "stops"),
            ("VRS_SEARCH_DELAY_MS", "250"),
            ("VRS_SEARCH_URL", "http://localhost:9000/"),
        ]))
        .unwrap();

        assert_eq!(config.cache_path, PathBuf::from("/tmp/cache.db"));
        assert_eq!(
            config.term_source,
            TermSource::StationNames(PathBuf::from("names.txt"))
        );
        assert_eq!(config.backend, SearchBackend::Stops);
        assert_eq!(config.search_delay, Some(Duration::from_millis(250)));
        assert_eq!(config.search_url.as_deref(), Some("http://localhost:9000/"));
    }

    #[test]
    fn qr_code_source_follows_qr_codes_path() {
        let config =
            ScraperConfig::from_lookup(lookup_from(&[("VRS_QR_CODES_PATH", "out/qr.csv")]))
                .unwrap();
        assert_eq!(
            config.term_source,
            TermSource::QrCodes(PathBuf::from("out/qr.csv"))
        );
    }

    #[test]
    fn street_source_uses_default_url() {
        let config =
            ScraperConfig::from_lookup(lookup_from(&[("VRS_TERM_SOURCE", "streets")])).unwrap();
        assert_eq!(
            config.term_source,
            TermSource::Streets(DEFAULT_STREETS_URL.to_string())
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = ScraperConfig::from_lookup(lookup_from(&[("VRS_BACKEND", "soap")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value \"soap\" for VRS_BACKEND: expected objects or stops"
        );

        assert!(ScraperConfig::from_lookup(lookup_from(&[("VRS_TERM_SOURCE", "x")])).is_err());
        assert!(
            ScraperConfig::from_lookup(lookup_from(&[("VRS_SEARCH_DELAY_MS", "-1")])).is_err()
        );
    }

    #[test]
    fn builder() {
        let config = ScraperConfig::new()
            .with_backend(SearchBackend::Stops)
            .with_term_source(TermSource::LetterPairs)
            .with_search_delay(Duration::ZERO)
            .with_output_path("out.csv");
        assert_eq!(config.backend, SearchBackend::Stops);
        assert_eq!(config.term_source, TermSource::LetterPairs);
        assert_eq!(config.search_delay, Some(Duration::ZERO));
        assert_eq!(config.output_path, PathBuf::from("out.csv"));
    }
}
