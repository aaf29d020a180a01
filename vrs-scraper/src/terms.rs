//! Search-term generation.
//!
//! Each source yields bare names; [`build_search_terms`] appends the locality
//! qualifier once and collapses duplicates.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::qrcodes::QrCode;

/// Appended to every term so the VRS search stays within Cologne.
pub const LOCALITY_SUFFIX: &str = ", köln";

/// Open data set of Cologne street names (semicolon separated, name in the
/// second column).
pub const DEFAULT_STREETS_URL: &str = "http://www.offenedaten-koeln.de/node/569/download";

/// Errors while producing search terms. All of them abort the run.
#[derive(Debug, thiserror::Error)]
pub enum TermError {
    /// A local term file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A CSV term source is malformed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Downloading the street list failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The street list endpoint answered with an error status
    #[error("street list request failed with status {0}")]
    Status(u16),
}

/// Where search terms come from. Exactly one source is used per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermSource {
    /// Names from a previous QR-code scrape (`id,name` CSV with header).
    QrCodes(PathBuf),
    /// One station name per line.
    StationNames(PathBuf),
    /// Street names from a remote semicolon-separated data set.
    Streets(String),
    /// Every two-letter lowercase combination.
    LetterPairs,
}

impl TermSource {
    /// Produce the bare names for this source.
    pub async fn names(&self, http: &reqwest::Client) -> Result<Vec<String>, TermError> {
        match self {
            TermSource::QrCodes(path) => qr_code_names(open(path)?),
            TermSource::StationNames(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| TermError::Io {
                    path: path.clone(),
                    source,
                })?;
                Ok(station_names(&text))
            }
            TermSource::Streets(url) => fetch_street_names(http, url).await,
            TermSource::LetterPairs => Ok(letter_pairs()),
        }
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            TermSource::QrCodes(_) => "qrcodes",
            TermSource::StationNames(_) => "textfile",
            TermSource::Streets(_) => "streets",
            TermSource::LetterPairs => "letters",
        }
    }
}

fn open(path: &Path) -> Result<std::fs::File, TermError> {
    std::fs::File::open(path).map_err(|source| TermError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Station names from an `id,name` CSV. The header row is required.
pub fn qr_code_names<R: Read>(reader: R) -> Result<Vec<String>, TermError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut names = Vec::new();
    for row in rdr.deserialize::<QrCode>() {
        names.push(row?.name);
    }
    Ok(names)
}

/// Non-blank, trimmed lines of a plain text list.
pub fn station_names(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Second column of each data row of the street list, header skipped.
pub fn street_names(text: &str) -> Result<Vec<String>, TermError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut names = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        match record.get(1).map(str::trim) {
            Some(name) if !name.is_empty() => names.push(name.to_string()),
            _ => tracing::warn!(row = ?record, "Street row without a name column"),
        }
    }
    Ok(names)
}

/// Download and parse the street list.
pub async fn fetch_street_names(
    http: &reqwest::Client,
    url: &str,
) -> Result<Vec<String>, TermError> {
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(TermError::Status(status.as_u16()));
    }
    let body = response.text().await?;
    street_names(&body)
}

/// `aa`, `ab`, … `zz`.
pub fn letter_pairs() -> Vec<String> {
    ('a'..='z')
        .flat_map(|first| ('a'..='z').map(move |second| format!("{first}{second}")))
        .collect()
}

/// Append the locality suffix to every name and collect into a set.
///
/// Blank names are dropped; surrounding whitespace is trimmed first.
pub fn build_search_terms<I, S>(names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|name| {
            let name = name.as_ref().trim();
            (!name.is_empty()).then(|| format!("{name}{LOCALITY_SUFFIX}"))
        })
        .collect()
}
