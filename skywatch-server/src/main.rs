//! skywatch: airspace watch daemon and CLI.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use skywatch_core::config::{load_config, Config};
use skywatch_core::{export, snapshot, Geofence, TrackRepository};

mod engine;
mod feed;
mod storage;
mod web;

use engine::Engine;
use feed::AdsbxClient;
use storage::{BlobStore, SqliteStore};

#[derive(Parser)]
#[command(name = "skywatch", version, about = "Airspace track and incursion watch")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the polling engine and dashboard API
    Run {
        /// Feed API key (overrides the config file)
        #[arg(long, env = "SKYWATCH_API_KEY")]
        api_key: Option<String>,

        /// Geofence GeoJSON file (overrides the config file)
        #[arg(long)]
        geofence: Option<String>,

        /// SQLite database path (overrides the config file)
        #[arg(long)]
        db_path: Option<String>,

        /// Fetch interval in seconds (overrides the config file)
        #[arg(long)]
        interval: Option<f64>,

        /// Search radius in metres (overrides the config file)
        #[arg(long)]
        radius: Option<f64>,

        /// Run without the dashboard API
        #[arg(long)]
        headless: bool,

        /// Debug profile: wider search area, faster polling
        #[arg(long)]
        debug: bool,
    },

    /// Export the stored state as GeoJSON
    Export {
        /// SQLite database path (overrides the config file)
        #[arg(long)]
        db_path: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show stored-state statistics
    Stats {
        /// SQLite database path (overrides the config file)
        #[arg(long)]
        db_path: Option<String>,
    },

    /// Delete the stored snapshot
    Clear {
        /// SQLite database path (overrides the config file)
        #[arg(long)]
        db_path: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            api_key,
            geofence,
            db_path,
            interval,
            radius,
            headless,
            debug,
        } => {
            cmd_run(
                api_key, geofence, db_path, interval, radius, headless, debug,
            )
            .await
        }
        Commands::Export { db_path, out } => cmd_export(db_path, out),
        Commands::Stats { db_path } => cmd_stats(db_path),
        Commands::Clear { db_path } => cmd_clear(db_path),
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
async fn cmd_run(
    api_key: Option<String>,
    geofence_path: Option<String>,
    db_path: Option<String>,
    interval: Option<f64>,
    radius: Option<f64>,
    headless: bool,
    debug: bool,
) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = load_config();
    if let Some(key) = api_key {
        config.feed.api_key = Some(key);
    }
    if let Some(path) = geofence_path {
        config.geofence.path = path;
    }
    if let Some(path) = db_path {
        config.storage.path = path;
    }
    if let Some(secs) = interval {
        config.fetch.interval_secs = secs;
    }
    if let Some(metres) = radius {
        config.search.radius_m = metres;
    }
    if debug {
        config.debug = true;
    }
    config.apply_debug();

    let api_key = config.feed.api_key.clone().unwrap_or_else(|| {
        eprintln!("No feed API key configured (set SKYWATCH_API_KEY or feed.api_key)");
        std::process::exit(1);
    });

    let geofence = load_geofence(&config.geofence.path).unwrap_or_else(|e| {
        eprintln!("Error loading geofence {}: {e}", config.geofence.path);
        std::process::exit(1);
    });

    let store = SqliteStore::open(&config.storage.path).unwrap_or_else(|e| {
        eprintln!("Error opening database {}: {e}", config.storage.path);
        std::process::exit(1);
    });

    let feed = Arc::new(AdsbxClient::new(&config.feed.api_host, &api_key));
    let host = config.dashboard.host.clone();
    let port = config.dashboard.port;

    let (engine, handle) = Engine::new(config, geofence, feed, Arc::new(store));

    if !headless {
        tokio::spawn(web::serve(handle.clone(), host, port));
    }

    let engine_task = tokio::spawn(engine.run());

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            handle.shutdown();
            let _ = engine_task.await;
        }
        Err(e) => {
            eprintln!("Error waiting for shutdown signal: {e}");
        }
    }
}

/// Load and validate a geofence file, warning on incomplete volumes.
fn load_geofence(path: &str) -> Result<Geofence, String> {
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let (geofence, warnings) = Geofence::load_geojson(&text).map_err(|e| e.to_string())?;
    for warning in &warnings {
        warn!(%warning, "geofence volume incomplete");
    }
    Ok(geofence)
}

// ---------------------------------------------------------------------------
// export / stats / clear
// ---------------------------------------------------------------------------

fn open_store(db_path: Option<String>) -> (SqliteStore, Config) {
    let mut config = load_config();
    if let Some(path) = db_path {
        config.storage.path = path;
    }
    let store = SqliteStore::open(&config.storage.path).unwrap_or_else(|e| {
        eprintln!("Error opening database {}: {e}", config.storage.path);
        std::process::exit(1);
    });
    (store, config)
}

fn load_repo(store: &SqliteStore) -> TrackRepository {
    let blob = store.get(snapshot::STORAGE_KEY).unwrap_or_else(|e| {
        eprintln!("Error reading snapshot: {e}");
        std::process::exit(1);
    });
    let (repo, corrupt) = snapshot::decode(blob.as_deref());
    if corrupt {
        eprintln!("Warning: stored snapshot is corrupt, showing empty state");
    }
    repo
}

fn cmd_export(db_path: Option<String>, out: Option<PathBuf>) {
    let (store, config) = open_store(db_path);
    let repo = load_repo(&store);

    // The geofence file is optional here; exports still carry tracks and
    // the search area without it.
    let geofence = std::fs::read_to_string(&config.geofence.path)
        .ok()
        .and_then(|text| Geofence::load_geojson(&text).ok())
        .map(|(g, _)| g)
        .unwrap_or_default();

    let fc = export::to_feature_collection(
        &repo,
        &geofence,
        config.centre.lat,
        config.centre.lon,
        config.search.radius_m,
    );
    let text = fc.to_string();

    match out {
        Some(path) => {
            std::fs::write(&path, &text).unwrap_or_else(|e| {
                eprintln!("Error writing {}: {e}", path.display());
                std::process::exit(1);
            });
            println!("Exported {} features to {}", fc.features.len(), path.display());
        }
        None => println!("{text}"),
    }
}

fn cmd_stats(db_path: Option<String>) {
    let (store, config) = open_store(db_path);
    let repo = load_repo(&store);
    let stats = repo.stats();

    println!();
    println!("Database: {}", config.storage.path);
    println!();
    println!("  Active tracks:    {}", stats.active);
    println!("  Incursions:       {}", stats.incursions);
    println!("  Archived tracks:  {}", stats.archived);
    println!(
        "  Incursion now:    {}",
        if stats.incursion_ongoing { "YES" } else { "no" }
    );
    println!();

    if repo.active.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Aircraft", "Label", "Points", "First seen", "Last seen", "In fence",
    ]);

    for track in &repo.active {
        table.add_row(vec![
            Cell::new(&track.aircraft_id),
            Cell::new(if track.label.is_empty() {
                "-"
            } else {
                track.label.as_str()
            }),
            Cell::new(track.points.len()),
            Cell::new(format!("{:.0}", track.first_seen)),
            Cell::new(format!("{:.0}", track.last_seen)),
            Cell::new(if track.open_incursion.is_some() {
                "YES"
            } else {
                "no"
            }),
        ]);
    }

    println!("{table}");
}

fn cmd_clear(db_path: Option<String>) {
    let (store, config) = open_store(db_path);
    store.delete(snapshot::STORAGE_KEY).unwrap_or_else(|e| {
        eprintln!("Error clearing snapshot: {e}");
        std::process::exit(1);
    });
    println!("Cleared tracked state from {}", config.storage.path);
}
