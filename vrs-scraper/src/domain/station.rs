//! Normalised stop records.

use std::fmt;

use geo::Point;

/// Identifier assigned to a stop by the source that reported it.
///
/// Unique within one source only; no cross-source matching is attempted.
pub type StopId = i64;

/// A stop as it reaches the pipeline.
///
/// The position is always WGS84 `(longitude, latitude)`; backends that report
/// projected coordinates reproject before building a record.
#[derive(Debug, Clone, PartialEq)]
pub struct StationRecord {
    pub id: StopId,
    /// Secondary stop number used internally by the VRS object search.
    pub assnr: Option<i64>,
    pub name: String,
    pub position: Point<f64>,
    /// Municipality (`gemeinde`), when the source reports one.
    pub city: Option<String>,
    /// Sub-locality (`ort`), when the source reports one.
    pub suburb: Option<String>,
}

impl StationRecord {
    /// Create a record with no optional metadata.
    pub fn new(id: StopId, name: impl Into<String>, position: Point<f64>) -> Self {
        Self {
            id,
            assnr: None,
            name: name.into(),
            position,
            city: None,
            suburb: None,
        }
    }

    /// Set the secondary stop number.
    pub fn with_assnr(mut self, assnr: i64) -> Self {
        self.assnr = Some(assnr);
        self
    }

    /// Set municipality and sub-locality.
    pub fn with_locality(mut self, city: Option<String>, suburb: Option<String>) -> Self {
        self.city = city;
        self.suburb = suburb;
        self
    }

    pub fn longitude(&self) -> f64 {
        self.position.x()
    }

    pub fn latitude(&self) -> f64 {
        self.position.y()
    }
}

impl fmt::Display for StationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} ({:.7}, {:.7})",
            self.id,
            self.name,
            self.longitude(),
            self.latitude()
        )
    }
}
