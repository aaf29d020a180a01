//! Coordinate systems and reprojection.
//!
//! The VRS object search reports stop positions in ETRS89 / UTM zone 32N,
//! while the boundary polygon and the exported CSV use WGS84 longitude and
//! latitude. Geographic pairs are always `(longitude, latitude)`.

mod error;
mod utm;

use std::fmt;

pub use error::CoordinateError;

/// Lowest EPSG code of the ETRS89 / UTM north series (zone 28).
const ETRS_UTM_EPSG_BASE: u32 = 25800;

/// ETRS89 / UTM zones covered by the EPSG 258zz series.
const ETRS_UTM_ZONES: std::ops::RangeInclusive<u8> = 28..=38;

/// Northing of 84°N, the northern limit of UTM.
const MAX_NORTHING: f64 = 9_400_000.0;

/// Eastings outside this range are more than a zone-width off the meridian.
const MAX_EASTING: f64 = 1_000_000.0;

/// A spatial reference system we can project between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateSystem {
    /// WGS84 geographic, degrees (EPSG:4326).
    Wgs84,
    /// ETRS89 / UTM northern zone, metres (EPSG:258zz).
    EtrsUtm { zone: u8 },
}

impl CoordinateSystem {
    /// ETRS89 / UTM zone 32N, the system used by the VRS.
    pub const UTM32: Self = Self::EtrsUtm { zone: 32 };

    /// Look up a system by EPSG code.
    pub fn from_epsg(code: u32) -> Result<Self, CoordinateError> {
        if code == 4326 {
            return Ok(Self::Wgs84);
        }
        code.checked_sub(ETRS_UTM_EPSG_BASE)
            .and_then(|zone| u8::try_from(zone).ok())
            .filter(|zone| ETRS_UTM_ZONES.contains(zone))
            .map(|zone| Self::EtrsUtm { zone })
            .ok_or_else(|| CoordinateError::Unsupported(format!("EPSG:{code}")))
    }

    /// Parse an SRS name as it appears in requests and responses.
    ///
    /// Accepts `EPSG:<code>` and the AdV URN form `urn:adv:crs:ETRS89_UTM<zone>`.
    pub fn from_srs_name(name: &str) -> Result<Self, CoordinateError> {
        let trimmed = name.trim();
        let unsupported = || CoordinateError::Unsupported(trimmed.to_string());

        let upper = trimmed.to_ascii_uppercase();
        if let Some(code) = upper.strip_prefix("EPSG:") {
            let code: u32 = code.parse().map_err(|_| unsupported())?;
            return Self::from_epsg(code);
        }
        if let Some(zone) = upper.strip_prefix("URN:ADV:CRS:ETRS89_UTM") {
            let zone: u8 = zone.parse().map_err(|_| unsupported())?;
            if ETRS_UTM_ZONES.contains(&zone) {
                return Ok(Self::EtrsUtm { zone });
            }
        }
        Err(unsupported())
    }

    /// The EPSG code of this system.
    pub fn epsg(&self) -> u32 {
        match self {
            Self::Wgs84 => 4326,
            Self::EtrsUtm { zone } => ETRS_UTM_EPSG_BASE + u32::from(*zone),
        }
    }

    /// Name used in the `SRSName` element of a VRS request.
    pub fn srs_name(&self) -> String {
        match self {
            Self::Wgs84 => "EPSG:4326".to_string(),
            Self::EtrsUtm { zone } => format!("urn:adv:crs:ETRS89_UTM{zone}"),
        }
    }

    fn validate(&self, x: f64, y: f64) -> Result<(), CoordinateError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(CoordinateError::NotFinite { x, y });
        }
        let inside = match self {
            Self::Wgs84 => (-180.0..=180.0).contains(&x) && (-90.0..=90.0).contains(&y),
            Self::EtrsUtm { .. } => {
                (0.0..=MAX_EASTING).contains(&x) && (0.0..=MAX_NORTHING).contains(&y)
            }
        };
        if inside {
            Ok(())
        } else {
            Err(CoordinateError::OutOfDomain { system: *self, x, y })
        }
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// A coordinate pair tagged with the system it is expressed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub system: CoordinateSystem,
    pub x: f64,
    pub y: f64,
}

impl Coordinates {
    pub fn new(system: CoordinateSystem, x: f64, y: f64) -> Self {
        Self { system, x, y }
    }

    /// Reproject into `target`.
    pub fn to_system(&self, target: CoordinateSystem) -> Result<Self, CoordinateError> {
        let (x, y) = transform(self.system, target, self.x, self.y)?;
        Ok(Self::new(target, x, y))
    }

    /// Reproject into WGS84 and return a `(longitude, latitude)` point.
    pub fn to_wgs84_point(&self) -> Result<geo::Point<f64>, CoordinateError> {
        let (lon, lat) = transform(self.system, CoordinateSystem::Wgs84, self.x, self.y)?;
        Ok(geo::Point::new(lon, lat))
    }
}

/// Reproject `(x, y)` from `source` into `target`.
///
/// Geographic pairs are `(longitude, latitude)` in degrees; projected pairs
/// are `(easting, northing)` in metres. Fails if the input is not finite or
/// lies outside the source system, or if the result falls outside the target.
pub fn transform(
    source: CoordinateSystem,
    target: CoordinateSystem,
    x: f64,
    y: f64,
) -> Result<(f64, f64), CoordinateError> {
    source.validate(x, y)?;
    if source == target {
        return Ok((x, y));
    }

    let (lon, lat) = match source {
        CoordinateSystem::Wgs84 => (x, y),
        CoordinateSystem::EtrsUtm { zone } => utm::inverse(zone, x, y),
    };

    let (x2, y2) = match target {
        CoordinateSystem::Wgs84 => (lon, lat),
        CoordinateSystem::EtrsUtm { zone } => {
            // The series is only meaningful within a few zones of the meridian.
            if (lon - utm::central_meridian(zone)).abs() >= 45.0 || !(0.0..=84.0).contains(&lat) {
                return Err(CoordinateError::OutOfDomain {
                    system: target,
                    x: lon,
                    y: lat,
                });
            }
            utm::forward(zone, lon, lat)
        }
    };

    target.validate(x2, y2)?;
    Ok((x2, y2))
}

/// Parse a comma-separated `x,y` pair such as `356538.26,5645249.36`.
pub fn parse_pair(raw: &str) -> Result<(f64, f64), CoordinateError> {
    let malformed = |reason| CoordinateError::Malformed {
        raw: raw.to_string(),
        reason,
    };

    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let [x, y] = parts.as_slice() else {
        return Err(malformed("expected exactly two components"));
    };

    let x: f64 = x.parse().map_err(|_| malformed("x is not a number"))?;
    let y: f64 = y.parse().map_err(|_| malformed("y is not a number"))?;
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS_DEG: f64 = 1e-6;

    #[test]
    fn epsg_lookup() {
        assert_eq!(CoordinateSystem::from_epsg(4326), Ok(CoordinateSystem::Wgs84));
        assert_eq!(CoordinateSystem::from_epsg(25832), Ok(CoordinateSystem::UTM32));
        assert_eq!(CoordinateSystem::UTM32.epsg(), 25832);
        assert!(CoordinateSystem::from_epsg(31466).is_err());
        assert!(CoordinateSystem::from_epsg(25899).is_err());
        assert!(CoordinateSystem::from_epsg(12).is_err());
    }

    #[test]
    fn srs_names() {
        assert_eq!(
            CoordinateSystem::from_srs_name("urn:adv:crs:ETRS89_UTM32"),
            Ok(CoordinateSystem::UTM32)
        );
        assert_eq!(
            CoordinateSystem::from_srs_name("epsg:4326"),
            Ok(CoordinateSystem::Wgs84)
        );
        assert_eq!(
            CoordinateSystem::UTM32.srs_name(),
            "urn:adv:crs:ETRS89_UTM32"
        );
        assert!(CoordinateSystem::from_srs_name("urn:adv:crs:DE_DHDN_3GK2").is_err());
    }

    #[test]
    fn display_uses_epsg() {
        assert_eq!(CoordinateSystem::UTM32.to_string(), "EPSG:25832");
        assert_eq!(CoordinateSystem::Wgs84.to_string(), "EPSG:4326");
    }

    #[test]
    fn utm32_to_wgs84_lands_in_cologne() {
        let (lon, lat) = transform(
            CoordinateSystem::UTM32,
            CoordinateSystem::Wgs84,
            356_538.26,
            5_645_249.36,
        )
        .unwrap();
        assert!((lon - 6.958).abs() < 1e-4, "lon {lon}");
        assert!((lat - 50.941).abs() < 1e-4, "lat {lat}");
    }

    #[test]
    fn round_trip_both_directions() {
        let (e, n) = transform(
            CoordinateSystem::Wgs84,
            CoordinateSystem::UTM32,
            6.9603,
            50.9375,
        )
        .unwrap();
        let (lon, lat) =
            transform(CoordinateSystem::UTM32, CoordinateSystem::Wgs84, e, n).unwrap();
        assert!((lon - 6.9603).abs() < EPS_DEG);
        assert!((lat - 50.9375).abs() < EPS_DEG);

        let (lon, lat) = transform(
            CoordinateSystem::UTM32,
            CoordinateSystem::Wgs84,
            360_000.0,
            5_650_000.0,
        )
        .unwrap();
        let (e, n) = transform(CoordinateSystem::Wgs84, CoordinateSystem::UTM32, lon, lat)
            .unwrap();
        assert!((e - 360_000.0).abs() < 1e-3);
        assert!((n - 5_650_000.0).abs() < 1e-3);
    }

    #[test]
    fn identity_when_systems_match() {
        let out = transform(
            CoordinateSystem::Wgs84,
            CoordinateSystem::Wgs84,
            6.9,
            50.9,
        )
        .unwrap();
        assert_eq!(out, (6.9, 50.9));
    }

    #[test]
    fn rejects_non_finite() {
        let err = transform(
            CoordinateSystem::UTM32,
            CoordinateSystem::Wgs84,
            f64::NAN,
            5_645_000.0,
        )
        .unwrap_err();
        assert!(matches!(err, CoordinateError::NotFinite { .. }));

        let err = transform(
            CoordinateSystem::Wgs84,
            CoordinateSystem::UTM32,
            f64::INFINITY,
            50.0,
        )
        .unwrap_err();
        assert!(matches!(err, CoordinateError::NotFinite { .. }));
    }

    #[test]
    fn rejects_out_of_domain() {
        let err = transform(
            CoordinateSystem::UTM32,
            CoordinateSystem::Wgs84,
            -10.0,
            5_645_000.0,
        )
        .unwrap_err();
        assert!(matches!(err, CoordinateError::OutOfDomain { .. }));

        let err = transform(
            CoordinateSystem::Wgs84,
            CoordinateSystem::Wgs84,
            200.0,
            50.0,
        )
        .unwrap_err();
        assert!(matches!(err, CoordinateError::OutOfDomain { .. }));

        // Far too many zones away from the central meridian.
        let err = transform(
            CoordinateSystem::Wgs84,
            CoordinateSystem::UTM32,
            120.0,
            50.0,
        )
        .unwrap_err();
        assert!(matches!(err, CoordinateError::OutOfDomain { .. }));
    }

    #[test]
    fn parse_pair_accepts_two_numbers() {
        assert_eq!(
            parse_pair("356538.26,5645249.36"),
            Ok((356_538.26, 5_645_249.36))
        );
        assert_eq!(parse_pair(" 1 , 2 "), Ok((1.0, 2.0)));
    }

    #[test]
    fn parse_pair_rejects_wrong_arity() {
        assert!(matches!(
            parse_pair("1"),
            Err(CoordinateError::Malformed { .. })
        ));
        assert!(matches!(
            parse_pair("1,2,3"),
            Err(CoordinateError::Malformed { .. })
        ));
        assert!(matches!(
            parse_pair("1,north"),
            Err(CoordinateError::Malformed { .. })
        ));
    }

    #[test]
    fn coordinates_to_point() {
        let c = Coordinates::new(CoordinateSystem::UTM32, 356_538.26, 5_645_249.36);
        let p = c.to_wgs84_point().unwrap();
        assert!((p.x() - 6.958).abs() < 1e-4);
        assert!((p.y() - 50.941).abs() < 1e-4);

        let back = Coordinates::new(CoordinateSystem::Wgs84, p.x(), p.y())
            .to_system(CoordinateSystem::UTM32)
            .unwrap();
        assert!((back.x - c.x).abs() < 1e-3);
    }
}
