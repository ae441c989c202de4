//! Ingestion reconciler — merges one poll batch into the repository.
//!
//! Called once per cycle with the full current snapshot from the upstream
//! feed (not a delta). Tracks absent from the batch are left untouched; the
//! sweeper, not the reconciler, decides staleness.

use serde::Serialize;

use crate::geofence::Geofence;
use crate::repository::TrackRepository;
use crate::track::{IncursionSegment, Track};
use crate::types::PositionReport;

/// Per-batch counters, for logging and the stats surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub reports: usize,
    pub ground_dropped: usize,
    /// Reports older than the track's newest point, skipped.
    pub out_of_order: usize,
    /// Exact repeats of the track's newest point, skipped.
    pub duplicates: usize,
    pub tracks_created: usize,
    pub segments_opened: usize,
    pub segments_closed: usize,
    /// Invariant faults detected after the merge (reconciler defects).
    pub faults: usize,
}

/// Merge a batch of position reports. Idempotent within a cycle: re-running
/// the same batch creates no second track and no second open segment.
pub fn reconcile(
    repo: &mut TrackRepository,
    reports: &[PositionReport],
    geofence: &Geofence,
) -> ReconcileOutcome {
    let mut out = ReconcileOutcome {
        reports: reports.len(),
        ..Default::default()
    };

    for report in reports {
        // Flights on the ground are not tracked.
        let altitude = match report.altitude.feet() {
            Some(alt) => alt,
            None => {
                out.ground_dropped += 1;
                continue;
            }
        };

        let idx = match repo.active.iter().position(|t| t.aircraft_id == report.id) {
            Some(i) => i,
            None => {
                repo.active
                    .push(Track::new(&report.id, &report.label, report.observed_at));
                out.tracks_created += 1;
                repo.active.len() - 1
            }
        };
        let track = &mut repo.active[idx];

        // Per-track append order must equal chronological order.
        if report.observed_at < track.last_seen {
            out.out_of_order += 1;
            continue;
        }
        let point = (report.lon, report.lat, altitude);
        if report.observed_at == track.last_seen && track.points.last() == Some(&point) {
            out.duplicates += 1;
            continue;
        }

        track.points.push(point);
        track.last_seen = report.observed_at;
        track.heading = report.heading;
        if track.label.is_empty() && !report.label.trim().is_empty() {
            track.label = report.label.trim().to_string();
        }

        if geofence.contains(report.lon, report.lat, Some(altitude)) {
            match &mut track.open_incursion {
                Some(seg) => seg.append(report.lon, report.lat, altitude, report.observed_at),
                None => {
                    track.open_incursion = Some(IncursionSegment::open(
                        &track.track_id,
                        report.observed_at,
                        altitude,
                    ));
                    out.segments_opened += 1;
                }
            }
        } else if let Some(mut seg) = track.open_incursion.take() {
            seg.close();
            repo.incursions.push(seg);
            out.segments_closed += 1;
        }

        if report.observed_at > repo.last_batch {
            repo.last_batch = report.observed_at;
        }
    }

    let faults = repo.check_invariants();
    debug_assert!(faults.is_empty(), "repository invariants violated: {faults:?}");
    out.faults = faults.len();
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
