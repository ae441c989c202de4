//! The fetch/reconcile/sweep/persist cycle and its fixed-interval scheduler.
//!
//! One task owns all mutable state. The web layer talks to it through an
//! `EngineHandle`: commands go in over an unbounded channel, results come
//! out over `watch` channels holding the latest stats and GeoJSON export.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use skywatch_core::config::Config;
use skywatch_core::{export, reconcile, snapshot, sweep, Geofence, TrackRepository};

use crate::feed::FeedSource;
use crate::storage::BlobStore;

/// Summary of the most recent cycle, published after every cycle.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CycleStats {
    pub cycle: u64,
    pub reports: usize,
    pub active: usize,
    pub incursions: usize,
    pub archived: usize,
    pub incursion_ongoing: bool,
    /// Unix seconds of the next scheduled fetch.
    pub next_fetch_at: f64,
}

enum Command {
    ForceFetch,
    Clear,
    Shutdown,
}

/// Cloneable handle for observing and steering a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    stats_rx: watch::Receiver<CycleStats>,
    export_rx: watch::Receiver<String>,
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl EngineHandle {
    pub fn latest_stats(&self) -> CycleStats {
        *self.stats_rx.borrow()
    }

    pub fn latest_export(&self) -> String {
        self.export_rx.borrow().clone()
    }

    /// Receiver for callers that want to await changes.
    pub fn stats_receiver(&self) -> watch::Receiver<CycleStats> {
        self.stats_rx.clone()
    }

    pub fn force_fetch(&self) {
        let _ = self.cmd_tx.send(Command::ForceFetch);
    }

    pub fn clear(&self) {
        let _ = self.cmd_tx.send(Command::Clear);
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
    }
}

pub struct Engine {
    config: Config,
    geofence: Geofence,
    repo: TrackRepository,
    feed: Arc<dyn FeedSource>,
    store: Arc<dyn BlobStore>,
    cycle: u64,
    stats_tx: watch::Sender<CycleStats>,
    export_tx: watch::Sender<String>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
}

impl Engine {
    /// Build an engine, restoring the last snapshot from `store`.
    pub fn new(
        config: Config,
        geofence: Geofence,
        feed: Arc<dyn FeedSource>,
        store: Arc<dyn BlobStore>,
    ) -> (Engine, EngineHandle) {
        let blob = store.get(snapshot::STORAGE_KEY).unwrap_or_else(|e| {
            warn!(error = %e, "snapshot read failed, starting cold");
            None
        });
        let (repo, corrupt) = snapshot::decode(blob.as_deref());
        if corrupt {
            warn!("discarding corrupt snapshot, starting cold");
        } else if !repo.active.is_empty() || !repo.archived.is_empty() {
            let stats = repo.stats();
            info!(
                active = stats.active,
                incursions = stats.incursions,
                archived = stats.archived,
                "restored snapshot"
            );
        }

        let initial_export = export::to_feature_collection(
            &repo,
            &geofence,
            config.centre.lat,
            config.centre.lon,
            config.search.radius_m,
        )
        .to_string();
        let initial_stats = CycleStats {
            active: repo.stats().active,
            incursions: repo.stats().incursions,
            archived: repo.stats().archived,
            ..CycleStats::default()
        };

        let (stats_tx, stats_rx) = watch::channel(initial_stats);
        let (export_tx, export_rx) = watch::channel(initial_export);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let engine = Engine {
            config,
            geofence,
            repo,
            feed,
            store,
            cycle: 0,
            stats_tx,
            export_tx,
            cmd_rx,
        };
        let handle = EngineHandle {
            stats_rx,
            export_rx,
            cmd_tx,
        };
        (engine, handle)
    }

    /// Run cycles forever: one immediately, then one per interval. A
    /// `ForceFetch` cuts the wait short; commands that arrive while a cycle
    /// runs are applied before the next wait, so a force trigger is never
    /// lost and never runs a second concurrent fetch.
    pub async fn run(mut self) {
        loop {
            self.run_cycle_at(unix_now()).await;

            // drain commands queued during the cycle
            let mut fetch_now = false;
            loop {
                match self.cmd_rx.try_recv() {
                    Ok(Command::ForceFetch) => fetch_now = true,
                    Ok(Command::Clear) => self.clear_state(),
                    Ok(Command::Shutdown) | Err(mpsc::error::TryRecvError::Disconnected) => {
                        return;
                    }
                    Err(mpsc::error::TryRecvError::Empty) => break,
                }
            }
            if fetch_now {
                continue;
            }

            let interval = Duration::from_secs_f64(self.config.fetch.interval_secs);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::ForceFetch) => {
                        debug!("fetch forced");
                    }
                    Some(Command::Clear) => self.clear_state(),
                    Some(Command::Shutdown) | None => return,
                },
            }
        }
    }

    /// One full cycle: fetch, reconcile, sweep, persist, publish.
    ///
    /// Public so tests can drive the engine with an explicit clock.
    pub async fn run_cycle_at(&mut self, now: f64) {
        let reports = match self
            .feed
            .fetch(
                self.config.centre.lat,
                self.config.centre.lon,
                self.config.radius_nm(),
                now,
            )
            .await
        {
            Ok(reports) => reports,
            Err(e) => {
                warn!(error = %e, "feed fetch failed, treating as empty batch");
                Vec::new()
            }
        };

        let merged = reconcile(&mut self.repo, &reports, &self.geofence);
        if merged.faults > 0 {
            warn!(faults = merged.faults, "state invariants violated after merge");
        }
        let swept = sweep(
            &mut self.repo,
            now,
            self.config.timeout_secs(),
            self.config.fetch.thin_every,
        );

        let blob = snapshot::encode(&self.repo, now);
        if let Err(e) = self.store.set(snapshot::STORAGE_KEY, &blob) {
            warn!(error = %e, "snapshot write failed, state kept in memory");
        }

        self.cycle += 1;
        let repo_stats = self.repo.stats();
        info!(
            cycle = self.cycle,
            reports = merged.reports,
            created = merged.tracks_created,
            opened = merged.segments_opened,
            closed = merged.segments_closed + swept.segments_closed,
            archived = swept.archived,
            active = repo_stats.active,
            "cycle complete"
        );

        let stats = CycleStats {
            cycle: self.cycle,
            reports: merged.reports,
            active: repo_stats.active,
            incursions: repo_stats.incursions,
            archived: repo_stats.archived,
            incursion_ongoing: repo_stats.incursion_ongoing,
            next_fetch_at: now + self.config.fetch.interval_secs,
        };
        let _ = self.stats_tx.send(stats);
        let _ = self.export_tx.send(self.export_string());
    }

    fn clear_state(&mut self) {
        info!("clearing all tracked state");
        self.repo.clear();
        if let Err(e) = self.store.delete(snapshot::STORAGE_KEY) {
            warn!(error = %e, "snapshot delete failed");
        }
        let _ = self.stats_tx.send(CycleStats {
            cycle: self.cycle,
            ..CycleStats::default()
        });
        let _ = self.export_tx.send(self.export_string());
    }

    fn export_string(&self) -> String {
        export::to_feature_collection(
            &self.repo,
            &self.geofence,
            self.config.centre.lat,
            self.config.centre.lon,
            self.config.search.radius_m,
        )
        .to_string()
    }

    #[cfg(test)]
    fn repo(&self) -> &TrackRepository {
        &self.repo
    }
}

fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::testing::{FailingFeed, ScriptedFeed};
    use crate::storage::MemoryStore;
    use skywatch_core::{Altitude, PositionReport, TrackState};

    fn fence() -> Geofence {
        // unit square, altitude band 100..500 ft
        let text = r#"{
          "type": "Feature",
          "properties": {"name": "zone", "height": {"min": 100, "max": 500}},
          "geometry": {"type": "Polygon",
            "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}
        }"#;
        Geofence::load_geojson(text).unwrap().0
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.fetch.interval_secs = 5.0;
        config.fetch.stale_factor = 2.0;
        config.fetch.thin_every = 10;
        config
    }

    fn report(id: &str, lon: f64, lat: f64, alt: f64, at: f64) -> PositionReport {
        PositionReport {
            id: id.into(),
            lat,
            lon,
            altitude: Altitude::Feet(alt),
            heading: 0.0,
            label: String::new(),
            observed_at: at,
        }
    }

    #[tokio::test]
    async fn test_full_lifecycle_over_cycles() {
        // inside the fence for three cycles, outside for two, then silent
        let batches = vec![
            vec![report("a1", 0.5, 0.5, 300.0, 0.0)],
            vec![report("a1", 0.51, 0.5, 300.0, 5.0)],
            vec![report("a1", 0.52, 0.5, 300.0, 10.0)],
            vec![report("a1", 2.0, 2.0, 300.0, 15.0)],
            vec![report("a1", 2.1, 2.0, 300.0, 20.0)],
        ];
        let feed = Arc::new(ScriptedFeed::new(batches));
        let store = Arc::new(MemoryStore::new());
        let (mut engine, _handle) = Engine::new(test_config(), fence(), feed, store);

        for now in [0.0, 5.0, 10.0, 15.0, 20.0] {
            engine.run_cycle_at(now).await;
        }

        // segment closed when the aircraft left the fence
        assert_eq!(engine.repo().incursions.len(), 1);
        let seg = &engine.repo().incursions[0];
        assert!(!seg.is_open);
        assert_eq!(seg.first_seen, 0.0);
        assert_eq!(seg.last_seen, 10.0);
        assert_eq!(engine.repo().active.len(), 1);
        assert!(engine.repo().active[0].open_incursion.is_none());

        // silence: timeout is 10s, so not yet stale at 25, stale at 31
        engine.run_cycle_at(25.0).await;
        assert_eq!(engine.repo().active.len(), 1);

        engine.run_cycle_at(31.0).await;
        assert!(engine.repo().active.is_empty());
        assert_eq!(engine.repo().archived.len(), 1);
        assert_eq!(engine.repo().archived[0].state, TrackState::Archived);
        assert_eq!(engine.repo().archived[0].track_id, "a1-0");
    }

    #[tokio::test]
    async fn test_snapshot_survives_restart() {
        let store = Arc::new(MemoryStore::new());

        let feed = Arc::new(ScriptedFeed::new(vec![vec![report(
            "a1", 0.5, 0.5, 300.0, 0.0,
        )]]));
        let (mut engine, _handle) =
            Engine::new(test_config(), fence(), feed, Arc::clone(&store) as _);
        engine.run_cycle_at(0.0).await;
        let before = engine.repo().clone();
        drop(engine);

        let feed = Arc::new(ScriptedFeed::new(vec![]));
        let (engine, _handle) = Engine::new(test_config(), fence(), feed, store);
        assert_eq!(engine.repo(), &before);
    }

    #[tokio::test]
    async fn test_feed_failure_is_an_empty_cycle() {
        let store = Arc::new(MemoryStore::new());
        let (mut engine, handle) =
            Engine::new(test_config(), fence(), Arc::new(FailingFeed), store);

        engine.run_cycle_at(0.0).await;
        let stats = handle.latest_stats();
        assert_eq!(stats.cycle, 1);
        assert_eq!(stats.reports, 0);
        assert_eq!(stats.active, 0);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_starts_cold() {
        let store = Arc::new(MemoryStore::new());
        store.set(snapshot::STORAGE_KEY, "{garbage").unwrap();

        let feed = Arc::new(ScriptedFeed::new(vec![]));
        let (engine, _handle) = Engine::new(test_config(), fence(), feed, store);
        assert_eq!(engine.repo(), &TrackRepository::default());
    }

    #[tokio::test]
    async fn test_stats_and_export_published_per_cycle() {
        let feed = Arc::new(ScriptedFeed::new(vec![vec![report(
            "a1", 0.5, 0.5, 300.0, 0.0,
        )]]));
        let store = Arc::new(MemoryStore::new());
        let (mut engine, handle) = Engine::new(test_config(), fence(), feed, store);

        engine.run_cycle_at(0.0).await;
        let stats = handle.latest_stats();
        assert_eq!(stats.cycle, 1);
        assert_eq!(stats.active, 1);
        assert!(stats.incursion_ongoing);
        assert_eq!(stats.next_fetch_at, 5.0);

        let fc: serde_json::Value = serde_json::from_str(&handle.latest_export()).unwrap();
        assert_eq!(fc["type"], "FeatureCollection");
    }

    #[tokio::test]
    async fn test_run_loop_responds_to_shutdown_and_force() {
        let feed = Arc::new(ScriptedFeed::new(vec![
            vec![report("a1", 0.5, 0.5, 300.0, 0.0)],
            vec![],
        ]));
        let store = Arc::new(MemoryStore::new());
        let mut config = test_config();
        config.fetch.interval_secs = 3600.0; // only forced fetches can recur

        let (engine, handle) = Engine::new(config, fence(), feed, store);
        let mut stats_rx = handle.stats_receiver();
        let task = tokio::spawn(engine.run());

        // first cycle runs immediately on startup
        stats_rx.changed().await.unwrap();
        assert_eq!(stats_rx.borrow().cycle, 1);

        handle.force_fetch();
        stats_rx.changed().await.unwrap();
        assert_eq!(stats_rx.borrow().cycle, 2);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_wipes_state_and_storage() {
        let feed = Arc::new(ScriptedFeed::new(vec![vec![report(
            "a1", 0.5, 0.5, 300.0, 0.0,
        )]]));
        let store = Arc::new(MemoryStore::new());
        let (mut engine, handle) =
            Engine::new(test_config(), fence(), feed, Arc::clone(&store) as _);

        engine.run_cycle_at(0.0).await;
        assert!(store.get(snapshot::STORAGE_KEY).unwrap().is_some());

        engine.clear_state();
        assert_eq!(engine.repo(), &TrackRepository::default());
        assert!(store.get(snapshot::STORAGE_KEY).unwrap().is_none());
        assert_eq!(handle.latest_stats().active, 0);
    }
}
