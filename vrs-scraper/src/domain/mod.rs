//! Domain types for the stop scraper.
//!
//! Every search backend normalises its hits into a [`StationRecord`] before
//! they reach the pipeline, so the pipeline never sees source-specific shapes.

mod station;

pub use station::{StationRecord, StopId};
