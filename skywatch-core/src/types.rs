//! Shared types and error enum for skywatch-core.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// All errors produced by skywatch-core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("geofence error: {0}")]
    Geofence(String),
    #[error("snapshot error: {0}")]
    Snapshot(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

// ---------------------------------------------------------------------------
// Altitude
// ---------------------------------------------------------------------------

/// Barometric altitude as reported by the upstream feed.
///
/// The feed reports either a number in feet or the literal string `"ground"`.
/// Ground reports are discarded before reconciliation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Altitude {
    Ground,
    Feet(f64),
}

impl Altitude {
    pub fn is_ground(&self) -> bool {
        matches!(self, Altitude::Ground)
    }

    /// Altitude in feet, or `None` for ground reports.
    pub fn feet(&self) -> Option<f64> {
        match self {
            Altitude::Ground => None,
            Altitude::Feet(ft) => Some(*ft),
        }
    }
}

impl Serialize for Altitude {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Altitude::Ground => serializer.serialize_str("ground"),
            Altitude::Feet(ft) => serializer.serialize_f64(*ft),
        }
    }
}

impl<'de> Deserialize<'de> for Altitude {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct AltitudeVisitor;

        impl<'de> Visitor<'de> for AltitudeVisitor {
            type Value = Altitude;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a number in feet or the string \"ground\"")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Altitude, E> {
                Ok(Altitude::Feet(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Altitude, E> {
                Ok(Altitude::Feet(v as f64))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Altitude, E> {
                Ok(Altitude::Feet(v as f64))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Altitude, E> {
                if v == "ground" {
                    Ok(Altitude::Ground)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(v), &self))
                }
            }
        }

        deserializer.deserialize_any(AltitudeVisitor)
    }
}

// ---------------------------------------------------------------------------
// Position reports (input)
// ---------------------------------------------------------------------------

/// One raw aircraft sighting from the upstream feed.
///
/// `id` is a stable aircraft identifier (transponder hex code), unique within
/// one batch but repeating across batches. Timestamps are Unix seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub altitude: Altitude,
    pub heading: f64,
    /// Display name (flight number); trimmed, may be empty.
    pub label: String,
    pub observed_at: f64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_altitude_deserialize_number() {
        let alt: Altitude = serde_json::from_str("38000").unwrap();
        assert_eq!(alt, Altitude::Feet(38000.0));
        let alt: Altitude = serde_json::from_str("1250.5").unwrap();
        assert_eq!(alt, Altitude::Feet(1250.5));
    }

    #[test]
    fn test_altitude_deserialize_ground() {
        let alt: Altitude = serde_json::from_str("\"ground\"").unwrap();
        assert_eq!(alt, Altitude::Ground);
        assert!(alt.is_ground());
        assert_eq!(alt.feet(), None);
    }

    #[test]
    fn test_altitude_rejects_other_strings() {
        assert!(serde_json::from_str::<Altitude>("\"airborne\"").is_err());
    }

    #[test]
    fn test_altitude_roundtrip() {
        let json = serde_json::to_string(&Altitude::Ground).unwrap();
        assert_eq!(json, "\"ground\"");
        let json = serde_json::to_string(&Altitude::Feet(300.0)).unwrap();
        let back: Altitude = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Altitude::Feet(300.0));
    }

    #[test]
    fn test_report_roundtrip() {
        let report = PositionReport {
            id: "4840d6".into(),
            lat: 55.05,
            lon: -1.96,
            altitude: Altitude::Feet(12000.0),
            heading: 270.0,
            label: "KLM1023".into(),
            observed_at: 1700000000.0,
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: PositionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
