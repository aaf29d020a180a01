//! Stop search error types.

/// Errors from a single stop search.
///
/// None of these are fatal to a scrape: the term is logged and skipped.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status
    #[error("API error {status}")]
    Status { status: u16 },

    /// The response is not well-formed XML
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The response is not the JSON we expect
    #[error("JSON parse error: {message}")]
    Json {
        message: String,
        body: Option<String>,
    },
}
