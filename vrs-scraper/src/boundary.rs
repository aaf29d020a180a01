//! Municipal boundary used to keep only stops inside the city.
//!
//! The boundary is read once from a GeoJSON polygon whose ring is a list of
//! `[longitude, latitude]` positions, the same axis order the rest of the
//! crate uses for geographic points.

use std::path::{Path, PathBuf};

use geo::{Contains, Coord, LineString, Point, Polygon};
use serde::Deserialize;

/// Errors loading a boundary polygon.
#[derive(Debug, thiserror::Error)]
pub enum BoundaryError {
    /// The file could not be read
    #[error("failed to read boundary {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not valid GeoJSON
    #[error("boundary is not valid GeoJSON: {0}")]
    Json(#[from] serde_json::Error),

    /// No polygon geometry was found
    #[error("boundary contains no polygon")]
    NoPolygon,

    /// The outer ring has too few positions to enclose an area
    #[error("boundary ring has {0} positions, need at least 4")]
    DegenerateRing(usize),

    /// A position has fewer than two components or non-finite values
    #[error("invalid position at index {0}")]
    InvalidPosition(usize),
}

/// The subset of GeoJSON we accept: a polygon, possibly wrapped in a feature
/// or the first feature of a collection.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeoJson {
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    Feature {
        geometry: Box<GeoJson>,
    },
    FeatureCollection {
        features: Vec<GeoJson>,
    },
}

impl GeoJson {
    /// Outer ring of the first polygon found.
    fn into_outer_ring(self) -> Option<Vec<Vec<f64>>> {
        match self {
            GeoJson::Polygon { coordinates } => coordinates.into_iter().next(),
            GeoJson::Feature { geometry } => geometry.into_outer_ring(),
            GeoJson::FeatureCollection { features } => {
                features.into_iter().find_map(GeoJson::into_outer_ring)
            }
        }
    }
}

/// An immutable city boundary.
#[derive(Debug, Clone)]
pub struct Boundary {
    polygon: Polygon<f64>,
}

impl Boundary {
    /// Build a boundary from `(longitude, latitude)` positions.
    ///
    /// The ring is closed automatically if the last position differs from
    /// the first.
    pub fn from_ring(ring: Vec<(f64, f64)>) -> Result<Self, BoundaryError> {
        for (idx, (x, y)) in ring.iter().enumerate() {
            if !x.is_finite() || !y.is_finite() {
                return Err(BoundaryError::InvalidPosition(idx));
            }
        }

        let exterior = LineString::from(
            ring.into_iter()
                .map(|(x, y)| Coord { x, y })
                .collect::<Vec<_>>(),
        );
        // Polygon::new closes the ring, so count after construction.
        let polygon = Polygon::new(exterior, vec![]);
        let positions = polygon.exterior().0.len();
        if positions < 4 {
            return Err(BoundaryError::DegenerateRing(positions));
        }

        Ok(Self { polygon })
    }

    /// Parse a boundary from GeoJSON text.
    pub fn from_geojson(json: &str) -> Result<Self, BoundaryError> {
        let doc: GeoJson = serde_json::from_str(json)?;
        let ring = doc.into_outer_ring().ok_or(BoundaryError::NoPolygon)?;

        let ring = ring
            .into_iter()
            .enumerate()
            .map(|(idx, position)| match position.as_slice() {
                [x, y, ..] => Ok((*x, *y)),
                _ => Err(BoundaryError::InvalidPosition(idx)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_ring(ring)
    }

    /// Load a boundary from a GeoJSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BoundaryError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| BoundaryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let boundary = Self::from_geojson(&json)?;
        tracing::info!(
            path = %path.display(),
            positions = boundary.polygon.exterior().0.len(),
            "Loaded boundary"
        );
        Ok(boundary)
    }

    /// Whether a `(longitude, latitude)` point lies strictly inside.
    pub fn contains(&self, point: &Point<f64>) -> bool {
        self.polygon.contains(point)
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }
}
