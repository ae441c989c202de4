//! Restricted-airspace model — 3-D volumes loaded from GeoJSON.
//!
//! A geofence is a non-empty set of volumes, each a 2-D polygon plus an
//! optional closed altitude band `[min, max]` in feet. Containment is a
//! planar ray-cast over lon/lat treated as flat coordinates, which is fine
//! at airport-local scales (tens of km) and an explicit non-goal beyond that.

use geojson::{Feature, GeoJson};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::types::{CoreError, Result};

/// One restricted volume: an exterior ring, optional holes, optional band.
///
/// Rings are `(lon, lat)` vertex lists; closing vertex optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceVolume {
    pub name: Option<String>,
    pub exterior: Vec<(f64, f64)>,
    pub holes: Vec<Vec<(f64, f64)>>,
    /// `[min, max]` altitude in feet. `None` covers all altitudes.
    pub altitude_band: Option<(f64, f64)>,
}

impl GeofenceVolume {
    /// 2-D polygon containment: inside the exterior ring and outside every hole.
    fn contains_planar(&self, lon: f64, lat: f64) -> bool {
        if !point_in_ring(&self.exterior, lon, lat) {
            return false;
        }
        !self.holes.iter().any(|h| point_in_ring(h, lon, lat))
    }

    fn band_contains(&self, altitude: Option<f64>) -> bool {
        match (self.altitude_band, altitude) {
            (None, _) => true,
            // Altitude omitted from the query: band treated as satisfied.
            // Used for pre-load validation only, never live incursion checks.
            (Some(_), None) => true,
            (Some((min, max)), Some(alt)) => alt >= min && alt <= max,
        }
    }
}

/// Non-fatal findings from geofence loading.
#[derive(Debug, Clone, PartialEq)]
pub enum GeofenceWarning {
    /// Volume has no altitude band and will match at every altitude.
    NoAltitudeBand { volume: String },
}

impl std::fmt::Display for GeofenceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeofenceWarning::NoAltitudeBand { volume } => {
                write!(f, "volume '{volume}' has no altitude band, treating as all altitudes")
            }
        }
    }
}

/// A set of restricted volumes. A point satisfies the geofence if it is
/// inside any volume's polygon and that volume's altitude band.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub volumes: Vec<GeofenceVolume>,
}

impl Geofence {
    /// Parse a GeoJSON `Feature` or `FeatureCollection` of polygons.
    ///
    /// Each feature may carry a `height: {min, max}` property (feet) and a
    /// `name` property. Volumes without a band produce a warning, not an
    /// error; a document with no polygonal features is a configuration error.
    pub fn load_geojson(text: &str) -> Result<(Geofence, Vec<GeofenceWarning>)> {
        let gj: GeoJson = text
            .parse()
            .map_err(|e| CoreError::Geofence(format!("invalid GeoJSON: {e}")))?;

        let mut volumes = Vec::new();
        match gj {
            GeoJson::FeatureCollection(fc) => {
                for feature in &fc.features {
                    volumes_from_feature(feature, &mut volumes);
                }
            }
            GeoJson::Feature(feature) => volumes_from_feature(&feature, &mut volumes),
            GeoJson::Geometry(geometry) => {
                volumes_from_geometry(&geometry.value, None, None, &mut volumes)
            }
        }

        if volumes.is_empty() {
            return Err(CoreError::Geofence(
                "no polygonal features in geofence source".into(),
            ));
        }

        let warnings = volumes
            .iter()
            .enumerate()
            .filter(|(_, v)| v.altitude_band.is_none())
            .map(|(i, v)| GeofenceWarning::NoAltitudeBand {
                volume: v.name.clone().unwrap_or_else(|| format!("#{i}")),
            })
            .collect();

        Ok((Geofence { volumes }, warnings))
    }

    /// 3-D containment query. `altitude` in feet; `None` ignores bands
    /// (pre-load validation only — live incursion checks always supply it).
    pub fn contains(&self, lon: f64, lat: f64, altitude: Option<f64>) -> bool {
        self.volumes
            .iter()
            .any(|v| v.contains_planar(lon, lat) && v.band_contains(altitude))
    }
}

fn volumes_from_feature(feature: &Feature, out: &mut Vec<GeofenceVolume>) {
    let geometry = match &feature.geometry {
        Some(g) => g,
        None => return,
    };
    let name = feature
        .properties
        .as_ref()
        .and_then(|p| p.get("name"))
        .and_then(Json::as_str)
        .map(str::to_string);
    let band = feature
        .properties
        .as_ref()
        .and_then(|p| p.get("height"))
        .and_then(parse_band);
    volumes_from_geometry(&geometry.value, name, band, out);
}

fn volumes_from_geometry(
    value: &geojson::Value,
    name: Option<String>,
    band: Option<(f64, f64)>,
    out: &mut Vec<GeofenceVolume>,
) {
    match value {
        geojson::Value::Polygon(rings) => {
            if let Some(v) = volume_from_rings(rings, name, band) {
                out.push(v);
            }
        }
        geojson::Value::MultiPolygon(polys) => {
            for rings in polys {
                if let Some(v) = volume_from_rings(rings, name.clone(), band) {
                    out.push(v);
                }
            }
        }
        // Points, lines etc. carry no area and are ignored.
        _ => {}
    }
}

fn volume_from_rings(
    rings: &[Vec<Vec<f64>>],
    name: Option<String>,
    band: Option<(f64, f64)>,
) -> Option<GeofenceVolume> {
    let mut iter = rings.iter().map(|ring| {
        ring.iter()
            .filter(|pos| pos.len() >= 2)
            .map(|pos| (pos[0], pos[1]))
            .collect::<Vec<_>>()
    });
    let exterior = iter.next()?;
    if exterior.len() < 3 {
        return None;
    }
    Some(GeofenceVolume {
        name,
        exterior,
        holes: iter.collect(),
        altitude_band: band,
    })
}

/// Parse a `{min, max}` object into an altitude band.
fn parse_band(value: &Json) -> Option<(f64, f64)> {
    let min = value.get("min")?.as_f64()?;
    let max = value.get("max")?.as_f64()?;
    Some((min, max))
}

/// Standard ray-cast point-in-polygon test over planar coordinates.
fn point_in_ring(ring: &[(f64, f64)], x: f64, y: f64) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let n = ring.len();
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
