//! skywatch-core: Track & incursion state engine.
//!
//! No async, no I/O — just the data model and algorithms. This crate is the
//! shared core used by `skywatch-server` (poll loop + web API) and by
//! anything else that needs to replay or inspect tracked data.

pub mod config;
pub mod export;
pub mod geofence;
pub mod reconciler;
pub mod repository;
pub mod snapshot;
pub mod sweeper;
pub mod track;
pub mod types;

// Re-export commonly used types at crate root
pub use geofence::{Geofence, GeofenceVolume, GeofenceWarning};
pub use reconciler::{reconcile, ReconcileOutcome};
pub use repository::{RepoStats, TrackRepository};
pub use sweeper::{sweep, SweepOutcome};
pub use track::{IncursionSegment, Track, TrackState};
pub use types::{Altitude, CoreError, PositionReport, Result};
