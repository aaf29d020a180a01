//! VRS station search clients.
//!
//! Two backends answer the same question ("which stops match this term?")
//! in different formats: the journey planner's XML object service and the
//! stop map's JSON endpoint. Both are normalised to [`StationRecord`]s with
//! WGS84 positions behind the [`StopSearch`] trait.

mod error;
mod objects;
mod stops;

use std::time::Duration;

use crate::coords::CoordinateError;
use crate::domain::{StationRecord, StopId};

pub use error::SearchError;
pub use objects::{ObjectHit, ObjectSearchClient, ObjectSearchConfig};
pub use stops::{BoundingBox, StopHit, StopSearchClient, StopSearchConfig};

/// A station search backend.
///
/// Mock this in tests instead of hitting the real service.
#[allow(async_fn_in_trait)]
pub trait StopSearch {
    /// Look up stops matching `term`.
    ///
    /// Any error is transient from the caller's point of view: the term is
    /// skipped and the run continues.
    async fn search(&self, term: &str) -> Result<Vec<StationRecord>, SearchError>;

    /// Pause the caller should observe between two queries.
    fn delay(&self) -> Duration;
}

/// A raw search result that still has to be normalised.
pub trait SearchHit {
    fn id(&self) -> StopId;

    /// Convert into a record with a WGS84 position.
    fn into_record(self) -> Result<StationRecord, CoordinateError>;
}

/// Normalise hits, logging and dropping those whose coordinates cannot be
/// converted.
pub fn records_from_hits<H: SearchHit>(hits: Vec<H>) -> Vec<StationRecord> {
    hits.into_iter()
        .filter_map(|hit| {
            let id = hit.id();
            match hit.into_record() {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(id, error = %e, "Dropping stop with unusable coordinates");
                    None
                }
            }
        })
        .collect()
}
