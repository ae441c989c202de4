//! Snapshot encode/decode — the whole repository as one JSON blob.
//!
//! The blob lives under a single storage key; a corrupt or missing blob is
//! non-fatal and yields an empty repository (cold restart, never a crash).

use serde::{Deserialize, Serialize};

use crate::repository::TrackRepository;

/// Storage key for the serialized repository.
pub const STORAGE_KEY: &str = "tracked-data";

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    saved_at: f64,
    repository: TrackRepository,
}

/// Serialize the repository into a versioned JSON blob.
pub fn encode(repo: &TrackRepository, saved_at: f64) -> String {
    let envelope = Envelope {
        version: SNAPSHOT_VERSION,
        saved_at,
        repository: repo.clone(),
    };
    // A repository of plain data types cannot fail to serialize.
    serde_json::to_string(&envelope).unwrap_or_else(|_| String::from("{}"))
}

/// Restore a repository from a stored blob.
///
/// Returns `(repository, was_corrupt)`: `None` input is a normal cold start;
/// unparseable JSON or an unknown version is corrupt and also starts cold.
pub fn decode(blob: Option<&str>) -> (TrackRepository, bool) {
    let text = match blob {
        Some(t) => t,
        None => return (TrackRepository::default(), false),
    };
    match serde_json::from_str::<Envelope>(text) {
        Ok(envelope) if envelope.version == SNAPSHOT_VERSION => (envelope.repository, false),
        _ => (TrackRepository::default(), true),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{IncursionSegment, Track, TrackState};

    fn populated_repo() -> TrackRepository {
        let mut repo = TrackRepository::new();

        let mut active = Track::new("a1", "BAW12", 100.0);
        active.points = vec![(0.1, 0.2, 300.0), (0.15, 0.25, 320.0)];
        active.last_seen = 105.0;
        active.heading = 90.0;
        active.open_incursion = Some(IncursionSegment::open(&active.track_id, 105.0, 320.0));
        repo.active.push(active);

        let mut closed = IncursionSegment::open("b2-90000", 90.0, 200.0);
        closed.append(0.5, 0.5, 210.0, 95.0);
        closed.close();
        repo.incursions.push(closed);

        let mut archived = Track::new("b2", "", 90.0);
        archived.points = vec![(0.5, 0.5, 200.0)];
        archived.state = TrackState::Archived;
        repo.archived.push(archived);

        repo.last_batch = 105.0;
        repo
    }

    #[test]
    fn test_round_trip_equality() {
        let repo = populated_repo();
        let blob = encode(&repo, 106.0);
        let (restored, corrupt) = decode(Some(&blob));
        assert!(!corrupt);
        assert_eq!(restored, repo);
    }

    #[test]
    fn test_empty_round_trip() {
        let repo = TrackRepository::default();
        let (restored, corrupt) = decode(Some(&encode(&repo, 0.0)));
        assert!(!corrupt);
        assert_eq!(restored, repo);
    }

    #[test]
    fn test_missing_blob_is_clean_cold_start() {
        let (repo, corrupt) = decode(None);
        assert!(!corrupt);
        assert_eq!(repo, TrackRepository::default());
    }

    #[test]
    fn test_corrupt_blob_starts_cold() {
        let (repo, corrupt) = decode(Some("{not json"));
        assert!(corrupt);
        assert_eq!(repo, TrackRepository::default());
    }

    #[test]
    fn test_unknown_version_is_corrupt() {
        let mut blob: serde_json::Value =
            serde_json::from_str(&encode(&populated_repo(), 0.0)).unwrap();
        blob["version"] = serde_json::json!(99);
        let (repo, corrupt) = decode(Some(&blob.to_string()));
        assert!(corrupt);
        assert_eq!(repo, TrackRepository::default());
    }
}
