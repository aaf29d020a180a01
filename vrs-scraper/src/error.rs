//! Fatal errors of a scrape run.

use crate::boundary::BoundaryError;
use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::qrcodes::QrCodeError;
use crate::search::SearchError;
use crate::terms::TermError;

/// Anything that stops a run. Per-term search failures are not in here:
/// the pipeline logs and skips them.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The boundary polygon could not be loaded
    #[error("boundary error: {0}")]
    Boundary(#[from] BoundaryError),

    /// The station cache failed
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// No search terms could be produced
    #[error("term source error: {0}")]
    Terms(#[from] TermError),

    /// The search client could not be built
    #[error("search client error: {0}")]
    Search(#[from] SearchError),

    /// The QR-code scrape failed
    #[error("QR-code scrape error: {0}")]
    QrCodes(#[from] QrCodeError),

    /// Unknown command-line mode
    #[error("unknown mode {0:?}: expected \"stations\" or \"qrcodes\"")]
    UnknownMode(String),
}
