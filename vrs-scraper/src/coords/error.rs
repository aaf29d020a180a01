//! Coordinate error types.

use super::CoordinateSystem;

/// Errors raised while parsing or reprojecting a coordinate pair.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    /// One of the components is NaN or infinite
    #[error("coordinate is not finite: ({x}, {y})")]
    NotFinite { x: f64, y: f64 },

    /// The pair lies outside the area the system is defined for
    #[error("({x}, {y}) is outside the valid domain of {system}")]
    OutOfDomain {
        system: CoordinateSystem,
        x: f64,
        y: f64,
    },

    /// The system name or EPSG code is not one we can project
    #[error("unsupported coordinate system: {0}")]
    Unsupported(String),

    /// Text could not be read as an `x,y` pair
    #[error("malformed coordinate pair {raw:?}: {reason}")]
    Malformed { raw: String, reason: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CoordinateError::OutOfDomain {
            system: CoordinateSystem::UTM32,
            x: -5.0,
            y: 1.0,
        };
        assert_eq!(
            err.to_string(),
            "(-5, 1) is outside the valid domain of EPSG:25832"
        );

        let err = CoordinateError::Malformed {
            raw: "1,2,3".into(),
            reason: "expected exactly two components",
        };
        assert_eq!(
            err.to_string(),
            "malformed coordinate pair \"1,2,3\": expected exactly two components"
        );
    }
}
