//! Track and incursion-segment state.
//!
//! A `Track` is one continuous sighting episode for one aircraft. Its open
//! incursion segment (if any) lives on the track itself, so "at most one open
//! segment per track" holds by construction; closed segments move to the
//! repository's incursion list.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trajectory point: `(lon, lat, altitude_ft)`, insertion order chronological.
pub type TrackPoint = (f64, f64, f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackState {
    Active,
    Archived,
}

/// One contiguous in-geofence period of a parent track.
///
/// Points accumulate only while inside the geofence, starting empty when the
/// segment opens; a segment closed before a second sample lands legitimately
/// has zero points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncursionSegment {
    pub segment_id: String,
    pub track_id: String,
    pub points: Vec<(f64, f64)>,
    pub first_seen: f64,
    pub last_seen: f64,
    pub altitude_min: f64,
    pub altitude_max: f64,
    pub is_open: bool,
}

impl IncursionSegment {
    /// Open a new segment at the moment a position first satisfies the fence.
    pub fn open(track_id: &str, observed_at: f64, altitude: f64) -> Self {
        IncursionSegment {
            segment_id: Uuid::new_v4().to_string(),
            track_id: track_id.to_string(),
            points: Vec::new(),
            first_seen: observed_at,
            last_seen: observed_at,
            altitude_min: altitude,
            altitude_max: altitude,
            is_open: true,
        }
    }

    /// Record a subsequent in-fence sighting.
    pub fn append(&mut self, lon: f64, lat: f64, altitude: f64, observed_at: f64) {
        self.points.push((lon, lat));
        self.last_seen = observed_at;
        self.altitude_min = self.altitude_min.min(altitude);
        self.altitude_max = self.altitude_max.max(altitude);
    }

    /// Close the segment; it is immutable afterwards.
    pub fn close(&mut self) {
        self.is_open = false;
    }
}

/// The trajectory record for one aircraft sighting episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub track_id: String,
    pub aircraft_id: String,
    pub label: String,
    pub points: Vec<TrackPoint>,
    pub first_seen: f64,
    pub last_seen: f64,
    /// Most recent heading, degrees.
    pub heading: f64,
    pub state: TrackState,
    pub open_incursion: Option<IncursionSegment>,
}

impl Track {
    pub fn new(aircraft_id: &str, label: &str, observed_at: f64) -> Self {
        Track {
            track_id: make_track_id(aircraft_id, observed_at),
            aircraft_id: aircraft_id.to_string(),
            label: label.trim().to_string(),
            points: Vec::new(),
            first_seen: observed_at,
            last_seen: observed_at,
            heading: 0.0,
            state: TrackState::Active,
            open_incursion: None,
        }
    }

    pub fn age(&self, now: f64) -> f64 {
        now - self.last_seen
    }

    pub fn is_stale(&self, now: f64, timeout_secs: f64) -> bool {
        self.last_seen + timeout_secs < now
    }

    /// Latest known position, if any point has landed.
    pub fn position(&self) -> Option<TrackPoint> {
        self.points.last().copied()
    }

    /// One-time lossy down-sample before archival: keep every `every`-th
    /// point plus the final one. `every <= 1` keeps everything.
    pub fn thin_points(&mut self, every: usize) {
        if every <= 1 || self.points.len() <= 2 {
            return;
        }
        let last = self.points.len() - 1;
        let mut kept = Vec::with_capacity(self.points.len() / every + 2);
        for (i, p) in self.points.iter().enumerate() {
            if i % every == 0 || i == last {
                kept.push(*p);
            }
        }
        self.points = kept;
    }
}

/// Track ids embed the aircraft id and creation time (milliseconds), so a
/// re-appearing aircraft gets a fresh track instead of resuming an old one.
pub fn make_track_id(aircraft_id: &str, observed_at: f64) -> String {
    format!("{aircraft_id}-{}", (observed_at * 1000.0) as u64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_id_embeds_creation_time() {
        let a = make_track_id("4840d6", 100.0);
        let b = make_track_id("4840d6", 105.0);
        assert_eq!(a, "4840d6-100000");
        assert_ne!(a, b);
    }

    #[test]
    fn test_new_track_trims_label() {
        let track = Track::new("4840d6", "  KLM1023 ", 100.0);
        assert_eq!(track.label, "KLM1023");
        assert_eq!(track.first_seen, 100.0);
        assert_eq!(track.last_seen, 100.0);
        assert_eq!(track.state, TrackState::Active);
        assert!(track.points.is_empty());
        assert!(track.open_incursion.is_none());
    }

    #[test]
    fn test_staleness() {
        let track = Track::new("4840d6", "", 100.0);
        assert!(!track.is_stale(105.0, 10.0));
        assert!(!track.is_stale(110.0, 10.0)); // boundary: not yet past
        assert!(track.is_stale(110.1, 10.0));
    }

    #[test]
    fn test_thin_points_keeps_every_nth_and_last() {
        let mut track = Track::new("x", "", 0.0);
        track.points = (0..25).map(|i| (i as f64, 0.0, 0.0)).collect();
        track.thin_points(10);
        // Indices 0, 10, 20 plus the final index 24.
        let xs: Vec<f64> = track.points.iter().map(|p| p.0).collect();
        assert_eq!(xs, vec![0.0, 10.0, 20.0, 24.0]);
    }

    #[test]
    fn test_thin_points_noop_cases() {
        let mut track = Track::new("x", "", 0.0);
        track.points = vec![(0.0, 0.0, 0.0), (1.0, 1.0, 0.0)];
        track.thin_points(10);
        assert_eq!(track.points.len(), 2);

        track.points = (0..25).map(|i| (i as f64, 0.0, 0.0)).collect();
        track.thin_points(1);
        assert_eq!(track.points.len(), 25);
    }

    #[test]
    fn test_segment_opens_empty() {
        let seg = IncursionSegment::open("x-1000", 50.0, 300.0);
        assert!(seg.is_open);
        assert!(seg.points.is_empty());
        assert_eq!(seg.first_seen, 50.0);
        assert_eq!(seg.altitude_min, 300.0);
        assert_eq!(seg.altitude_max, 300.0);
        assert_eq!(seg.track_id, "x-1000");
    }

    #[test]
    fn test_segment_append_tracks_altitude_range() {
        let mut seg = IncursionSegment::open("x-1000", 50.0, 300.0);
        seg.append(1.0, 2.0, 250.0, 55.0);
        seg.append(1.1, 2.1, 420.0, 60.0);
        assert_eq!(seg.points.len(), 2);
        assert_eq!(seg.last_seen, 60.0);
        assert_eq!(seg.altitude_min, 250.0);
        assert_eq!(seg.altitude_max, 420.0);
    }

    #[test]
    fn test_segment_ids_unique() {
        let a = IncursionSegment::open("x-1000", 50.0, 300.0);
        let b = IncursionSegment::open("x-1000", 50.0, 300.0);
        assert_ne!(a.segment_id, b.segment_id);
    }
}
