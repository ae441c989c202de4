//! GeoJSON export — the engine's entire state as one FeatureCollection.
//!
//! Track features are tagged with a `trackType` property (`active`,
//! `incursion`, `logged`); current aircraft positions and the search-area
//! centre are standalone Point features; geofence volumes are exported as
//! the polygons they were loaded from.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;

use crate::geofence::Geofence;
use crate::repository::TrackRepository;
use crate::track::{IncursionSegment, Track};

/// Project the full engine state into a GeoJSON FeatureCollection.
pub fn to_feature_collection(
    repo: &TrackRepository,
    geofence: &Geofence,
    centre_lat: f64,
    centre_lon: f64,
    radius_m: f64,
) -> FeatureCollection {
    let mut features = Vec::new();

    for volume in &geofence.volumes {
        let mut rings = vec![ring_coords(&volume.exterior)];
        rings.extend(volume.holes.iter().map(|h| ring_coords(h)));

        let mut props = JsonObject::new();
        if let Some(name) = &volume.name {
            props.insert("name".into(), json!(name));
        }
        if let Some((min, max)) = volume.altitude_band {
            props.insert("height".into(), json!({"min": min, "max": max}));
        }
        features.push(feature(Value::Polygon(rings), props));
    }

    for track in &repo.active {
        features.push(track_feature(track, "active"));
        if let Some((lon, lat, alt)) = track.position() {
            let mut props = JsonObject::new();
            props.insert("marker".into(), json!("aircraft"));
            props.insert("aircraftId".into(), json!(track.aircraft_id));
            props.insert("label".into(), json!(track.label));
            props.insert("heading".into(), json!(track.heading));
            props.insert("altitude".into(), json!(alt));
            features.push(feature(Value::Point(vec![lon, lat]), props));
        }
        if let Some(seg) = &track.open_incursion {
            features.push(segment_feature(seg));
        }
    }

    for seg in &repo.incursions {
        features.push(segment_feature(seg));
    }

    for track in &repo.archived {
        features.push(track_feature(track, "logged"));
    }

    let mut props = JsonObject::new();
    props.insert("marker".into(), json!("search-area"));
    props.insert("radius".into(), json!(radius_m));
    features.push(feature(Value::Point(vec![centre_lon, centre_lat]), props));

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn track_feature(track: &Track, track_type: &str) -> Feature {
    let coords = track.points.iter().map(|p| vec![p.0, p.1]).collect();
    let mut props = JsonObject::new();
    props.insert("trackType".into(), json!(track_type));
    props.insert("trackId".into(), json!(track.track_id));
    props.insert("aircraftId".into(), json!(track.aircraft_id));
    props.insert("label".into(), json!(track.label));
    props.insert("firstSeen".into(), json!(track.first_seen));
    props.insert("lastSeen".into(), json!(track.last_seen));
    feature(Value::LineString(coords), props)
}

fn segment_feature(seg: &IncursionSegment) -> Feature {
    let coords = seg.points.iter().map(|p| vec![p.0, p.1]).collect();
    let mut props = JsonObject::new();
    props.insert("trackType".into(), json!("incursion"));
    props.insert("segmentId".into(), json!(seg.segment_id));
    props.insert("trackId".into(), json!(seg.track_id));
    props.insert("isOpen".into(), json!(seg.is_open));
    props.insert("firstSeen".into(), json!(seg.first_seen));
    props.insert("lastSeen".into(), json!(seg.last_seen));
    props.insert("altitudeMin".into(), json!(seg.altitude_min));
    props.insert("altitudeMax".into(), json!(seg.altitude_max));
    feature(Value::LineString(coords), props)
}

fn ring_coords(ring: &[(f64, f64)]) -> Vec<Vec<f64>> {
    ring.iter().map(|&(lon, lat)| vec![lon, lat]).collect()
}

fn feature(value: Value, props: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
