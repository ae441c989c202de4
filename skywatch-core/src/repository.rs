//! Track repository — the three collections and their invariants.
//!
//! Owns active tracks, closed incursion segments, and the archive. Mutated
//! only by the reconciler and the sweeper; everything here is serializable
//! so the whole repository can round-trip through the snapshot store.

use serde::{Deserialize, Serialize};

use crate::track::{IncursionSegment, Track, TrackState};

/// Per-cycle counts exposed to the renderer/stats surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStats {
    pub active: usize,
    /// Open + closed incursion segments, cycle-to-date.
    pub incursions: usize,
    pub archived: usize,
    /// True while any track currently has an open segment.
    pub incursion_ongoing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackRepository {
    pub active: Vec<Track>,
    /// Closed segments only; the open segment lives on its parent track.
    pub incursions: Vec<IncursionSegment>,
    pub archived: Vec<Track>,
    /// Timestamp of the most recent reconciled batch.
    pub last_batch: f64,
}

impl TrackRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Linear scan for the active track of an aircraft. Fleet sizes are
    /// small (<1000) so this stays O(n) without an index.
    pub fn find_active(&self, aircraft_id: &str) -> Option<&Track> {
        self.active.iter().find(|t| t.aircraft_id == aircraft_id)
    }

    pub fn find_active_mut(&mut self, aircraft_id: &str) -> Option<&mut Track> {
        self.active.iter_mut().find(|t| t.aircraft_id == aircraft_id)
    }

    pub fn stats(&self) -> RepoStats {
        let open = self
            .active
            .iter()
            .filter(|t| t.open_incursion.is_some())
            .count();
        RepoStats {
            active: self.active.len(),
            incursions: self.incursions.len() + open,
            archived: self.archived.len(),
            incursion_ongoing: open > 0,
        }
    }

    /// Wipe everything (external clear operation).
    pub fn clear(&mut self) {
        *self = TrackRepository::default();
    }

    /// Invariant audit. Violations indicate a reconciler/sweeper defect;
    /// callers `debug_assert!` on the result after every mutation cycle.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut faults = Vec::new();

        for (i, track) in self.active.iter().enumerate() {
            if track.state != TrackState::Active {
                faults.push(format!("active[{i}] {} not in Active state", track.track_id));
            }
            if self
                .active
                .iter()
                .filter(|t| t.aircraft_id == track.aircraft_id)
                .count()
                > 1
            {
                faults.push(format!(
                    "duplicate active track for aircraft {}",
                    track.aircraft_id
                ));
            }
            if let Some(seg) = &track.open_incursion {
                if !seg.is_open {
                    faults.push(format!(
                        "track {} holds a closed segment as open",
                        track.track_id
                    ));
                }
                if seg.track_id != track.track_id {
                    faults.push(format!(
                        "segment {} bound to wrong track {}",
                        seg.segment_id, track.track_id
                    ));
                }
            }
        }

        for track in &self.archived {
            if track.state != TrackState::Archived {
                faults.push(format!("archived track {} not Archived", track.track_id));
            }
            if track.open_incursion.is_some() {
                faults.push(format!(
                    "archived track {} still holds an open segment",
                    track.track_id
                ));
            }
        }

        for seg in &self.incursions {
            if seg.is_open {
                faults.push(format!("closed-segment list holds open {}", seg.segment_id));
            }
        }

        faults.dedup();
        faults
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
