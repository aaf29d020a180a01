//! The scrape loop.
//!
//! For each search term: query the backend, keep the stops that fall inside
//! the city boundary, and write them to the cache. A failed query skips the
//! term; a failed cache write aborts the run.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::boundary::Boundary;
use crate::cache::{CacheError, StationCache};
use crate::search::StopSearch;

/// Minimum pause between two search terms, whatever the backend.
pub const DEFAULT_TERM_INTERVAL: Duration = Duration::from_secs(2);

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeSummary {
    /// Terms queried, including failed ones.
    pub terms_searched: usize,
    pub terms_failed: usize,
    /// Records returned by the backend.
    pub records_seen: usize,
    /// Records inside the boundary.
    pub records_inside: usize,
    /// Records that were new to the cache.
    pub rows_inserted: usize,
}

/// Runs search terms against a backend and fills the cache.
pub struct Pipeline<'a, S> {
    client: &'a S,
    boundary: &'a Boundary,
    cache: &'a StationCache,
    interval: Duration,
}

impl<'a, S: StopSearch> Pipeline<'a, S> {
    pub fn new(client: &'a S, boundary: &'a Boundary, cache: &'a StationCache) -> Self {
        Self {
            client,
            boundary,
            cache,
            interval: DEFAULT_TERM_INTERVAL,
        }
    }

    /// Set the minimum pause between terms.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// The pause after each term: the fixed interval, or the client's own
    /// delay if that is longer.
    pub fn pause(&self) -> Duration {
        self.interval.max(self.client.delay())
    }

    /// Process every term in order.
    ///
    /// [`Pipeline::pause`] is observed after each term, failed or not.
    pub async fn run(&self, terms: &BTreeSet<String>) -> Result<ScrapeSummary, CacheError> {
        let total = terms.len();
        let mut summary = ScrapeSummary::default();

        for (index, term) in terms.iter().enumerate() {
            let done = index + 1;
            let percent = done as f64 * 100.0 / total as f64;
            info!("{done} of {total} ({percent:.1}%): {term}");

            summary.terms_searched += 1;
            match self.client.search(term).await {
                Ok(records) => {
                    summary.records_seen += records.len();
                    for record in records {
                        if !self.boundary.contains(&record.position) {
                            debug!(%record, "Outside boundary");
                            continue;
                        }
                        summary.records_inside += 1;
                        if self.cache.insert(&record).await? {
                            summary.rows_inserted += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!(term = %term, error = %e, "Search failed, skipping term");
                    summary.terms_failed += 1;
                }
            }

            tokio::time::sleep(self.pause()).await;
        }

        Ok(summary)
    }
}
