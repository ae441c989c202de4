//! Staleness sweeper — demotes silent tracks to the archive.
//!
//! Run once per cycle after reconciliation. The only path by which a track
//! leaves the active set; archival is permanent.

use serde::Serialize;

use crate::repository::TrackRepository;
use crate::track::TrackState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepOutcome {
    pub archived: usize,
    /// Open segments force-closed because their parent went stale.
    pub segments_closed: usize,
}

/// Archive every active track with no data for more than `timeout_secs`
/// before `now`. Open segments are closed first; points are thinned to every
/// `thin_every`-th before archival (lossy, for visual replay only).
pub fn sweep(
    repo: &mut TrackRepository,
    now: f64,
    timeout_secs: f64,
    thin_every: usize,
) -> SweepOutcome {
    let mut out = SweepOutcome::default();

    let mut still_active = Vec::with_capacity(repo.active.len());
    for mut track in repo.active.drain(..) {
        if !track.is_stale(now, timeout_secs) {
            still_active.push(track);
            continue;
        }

        if let Some(mut seg) = track.open_incursion.take() {
            seg.close();
            repo.incursions.push(seg);
            out.segments_closed += 1;
        }
        track.thin_points(thin_every);
        track.state = TrackState::Archived;
        repo.archived.push(track);
        out.archived += 1;
    }
    repo.active = still_active;

    let faults = repo.check_invariants();
    debug_assert!(faults.is_empty(), "repository invariants violated: {faults:?}");
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
