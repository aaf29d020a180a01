//! KVB QR-code stop list.
//!
//! The KVB publishes an index of stops per initial letter, each linking to
//! `/qr/<id>/`. The id is the number printed on the stop's QR code. The
//! scraped list is written as an `id,name` CSV, which in turn feeds the
//! station search as a term source.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

/// Default base URL of the per-letter index pages.
const DEFAULT_BASE_URL: &str = "http://www.kvb-koeln.de/qr/haltestellen";

/// The site rejects requests without a browser user agent.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_8_5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/33.0.1750.117 Safari/537.3";

/// Index pages: one per letter, plus the umlaut pages.
pub const INDEX_TOKENS: [&str; 28] = [
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R",
    "S", "T", "U", "V", "W", "X", "Y", "Z", "Ae", "Ue",
];

/// Default output of the QR-code scrape.
pub const DEFAULT_QR_CODES_PATH: &str = "kvb-qr-codes.csv";

/// One stop from the QR-code index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrCode {
    pub id: u32,
    pub name: String,
}

/// Errors from the QR-code scraper.
#[derive(Debug, thiserror::Error)]
pub enum QrCodeError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An index page answered with an error status
    #[error("index page {token} returned status {status}")]
    Status { token: String, status: u16 },

    /// A CSS selector failed to compile
    #[error("invalid selector {selector:?}: {message}")]
    Selector { selector: String, message: String },

    /// Writing the CSV failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The output file could not be created
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Configuration for the QR-code scraper.
#[derive(Debug, Clone)]
pub struct QrCodeConfig {
    pub base_url: String,
    /// Pause after each index page.
    pub delay: Duration,
    pub timeout_secs: u64,
}

impl QrCodeConfig {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            delay: Duration::from_secs(1),
            timeout_secs: 30,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for QrCodeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Client for the KVB QR-code index.
#[derive(Debug, Clone)]
pub struct QrCodeClient {
    http: reqwest::Client,
    base_url: String,
    delay: Duration,
}

impl QrCodeClient {
    pub fn new(config: QrCodeConfig) -> Result<Self, QrCodeError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(REFERER, HeaderValue::from_static(DEFAULT_BASE_URL));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            delay: config.delay,
        })
    }

    /// Fetch and parse one index page.
    pub async fn fetch_page(&self, token: &str) -> Result<Vec<QrCode>, QrCodeError> {
        let url = format!("{}/{}/", self.base_url, token);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(QrCodeError::Status {
                token: token.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        parse_index_page(&body)
    }

    /// Scrape every index page.
    ///
    /// Pages that fail are logged and skipped.
    pub async fn fetch_all(&self) -> Vec<QrCode> {
        let mut codes = Vec::new();
        for token in INDEX_TOKENS {
            match self.fetch_page(token).await {
                Ok(page) => {
                    tracing::info!(token, stops = page.len(), "Scraped QR-code index page");
                    codes.extend(page);
                }
                Err(e) => tracing::warn!(token, error = %e, "Skipping QR-code index page"),
            }
            tokio::time::sleep(self.delay).await;
        }
        codes
    }
}

/// Extract `(id, name)` from every `/qr/<id>/` link inside `<center>`.
pub fn parse_index_page(html: &str) -> Result<Vec<QrCode>, QrCodeError> {
    const LINKS: &str = "center a";
    let selector = Selector::parse(LINKS).map_err(|e| QrCodeError::Selector {
        selector: LINKS.to_string(),
        message: e.to_string(),
    })?;

    let document = Html::parse_document(html);
    let codes = document
        .select(&selector)
        .filter_map(|link| {
            let id = qr_id_from_href(link.value().attr("href")?)?;
            let name = link.text().collect::<String>().trim().to_string();
            Some(QrCode { id, name })
        })
        .collect();
    Ok(codes)
}

/// `/qr/123/…` → `123`.
fn qr_id_from_href(href: &str) -> Option<u32> {
    let rest = href.strip_prefix("/qr/")?;
    let (digits, _) = rest.split_once('/')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Write the scraped list as `id,name` CSV with a header row.
pub fn write_csv(path: impl AsRef<Path>, codes: &[QrCode]) -> Result<(), QrCodeError> {
    let path = path.as_ref();
    let file = std::fs::File::create(path).map_err(|source| QrCodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut writer = csv::Writer::from_writer(std::io::BufWriter::new(file));
    if codes.is_empty() {
        // serde only emits the header together with the first record.
        writer.write_record(["id", "name"])?;
    }
    for code in codes {
        writer.serialize(code)?;
    }
    writer.flush().map_err(csv::Error::from)?;

    tracing::info!(path = %path.display(), rows = codes.len(), "Wrote QR-code list");
    Ok(())
}
