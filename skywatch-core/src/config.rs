//! Configuration file management for skywatch.
//!
//! Reads/writes `~/.skywatch/config.yaml` with search-area, fetch-policy,
//! feed, storage, and dashboard settings.

use std::path::PathBuf;

use crate::types::CoreError;

/// Metres to nautical miles (the upstream feed takes its radius in nm).
pub const M_TO_NM: f64 = 0.0005399568;

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub debug: bool,
    pub centre: CentreConfig,
    pub search: SearchConfig,
    pub fetch: FetchConfig,
    pub feed: FeedConfig,
    pub geofence: GeofenceConfig,
    pub storage: StorageConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CentreConfig {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub radius_m: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    pub interval_secs: f64,
    /// Staleness timeout = interval × this factor (tolerates one missed poll
    /// at the default of 2).
    pub stale_factor: f64,
    /// Archival down-sampling: keep every Nth trajectory point.
    pub thin_every: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub api_key: Option<String>,
    pub api_host: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceConfig {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            debug: false,
            centre: CentreConfig {
                lat: 55.055068,
                lon: -1.966238,
            },
            search: SearchConfig { radius_m: 38000.0 },
            fetch: FetchConfig {
                interval_secs: 5.0,
                stale_factor: 2.0,
                thin_every: 10,
            },
            feed: FeedConfig {
                api_key: None,
                api_host: "adsbexchange-com1.p.rapidapi.com".into(),
            },
            geofence: GeofenceConfig {
                path: "data/tda.geojson".into(),
            },
            storage: StorageConfig {
                path: "data/skywatch.db".into(),
            },
            dashboard: DashboardConfig {
                host: "127.0.0.1".into(),
                port: 8080,
            },
        }
    }
}

impl Config {
    /// Search radius in nautical miles, as the feed request wants it.
    pub fn radius_nm(&self) -> f64 {
        self.search.radius_m * M_TO_NM
    }

    /// Staleness timeout in seconds.
    pub fn timeout_secs(&self) -> f64 {
        self.fetch.interval_secs * self.fetch.stale_factor
    }

    /// Debug profile: wider search area, faster polling.
    pub fn apply_debug(&mut self) {
        if self.debug {
            self.search.radius_m = 150_000.0;
            self.fetch.interval_secs = 2.0;
        }
    }
}

/// Get the config directory path (`~/.skywatch/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".skywatch")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.skywatch/config.yaml`.
///
/// Returns default config if the file doesn't exist or fails to parse.
pub fn load_config() -> Config {
    let path = config_file();
    if !path.exists() {
        return Config::default();
    }

    let text = match std::fs::read_to_string(&path) {
        Ok(t) => t,
        Err(_) => return Config::default(),
    };

    parse_config(&text).unwrap_or_default()
}

/// Save config to `~/.skywatch/config.yaml`.
pub fn save_config(config: &Config) -> Result<PathBuf, CoreError> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir).map_err(|e| CoreError::Config(e.to_string()))?;

    let path = config_file();
    let text = serialize_config(config);
    std::fs::write(&path, text).map_err(|e| CoreError::Config(e.to_string()))?;

    Ok(path)
}

/// Parse simple YAML-like config text.
fn parse_config(text: &str) -> Option<Config> {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        if let Some((key, val)) = stripped.split_once(':') {
            let key = key.trim();
            let val = val.trim();

            if !is_indented {
                if val.is_empty() {
                    current_section = Some(key.to_string());
                } else {
                    current_section = None;
                    if key == "debug" {
                        config.debug = val == "true";
                    }
                }
            } else if let Some(ref section) = current_section {
                match section.as_str() {
                    "centre" => match key {
                        "lat" => {
                            if let Some(v) = parse_float_value(val) {
                                config.centre.lat = v;
                            }
                        }
                        "lon" => {
                            if let Some(v) = parse_float_value(val) {
                                config.centre.lon = v;
                            }
                        }
                        _ => {}
                    },
                    "search" => {
                        if key == "radius_m" {
                            if let Some(v) = parse_float_value(val) {
                                config.search.radius_m = v;
                            }
                        }
                    }
                    "fetch" => match key {
                        "interval_secs" => {
                            if let Some(v) = parse_float_value(val) {
                                config.fetch.interval_secs = v;
                            }
                        }
                        "stale_factor" => {
                            if let Some(v) = parse_float_value(val) {
                                config.fetch.stale_factor = v;
                            }
                        }
                        "thin_every" => {
                            if let Ok(v) = val.parse::<usize>() {
                                config.fetch.thin_every = v;
                            }
                        }
                        _ => {}
                    },
                    "feed" => match key {
                        "api_key" => config.feed.api_key = parse_string_value(val),
                        "api_host" => {
                            if let Some(v) = parse_string_value(val) {
                                config.feed.api_host = v;
                            }
                        }
                        _ => {}
                    },
                    "geofence" => {
                        if key == "path" {
                            if let Some(v) = parse_string_value(val) {
                                config.geofence.path = v;
                            }
                        }
                    }
                    "storage" => {
                        if key == "path" {
                            if let Some(v) = parse_string_value(val) {
                                config.storage.path = v;
                            }
                        }
                    }
                    "dashboard" => match key {
                        "host" => {
                            if let Some(v) = parse_string_value(val) {
                                config.dashboard.host = v;
                            }
                        }
                        "port" => {
                            if let Ok(v) = val.parse::<u16>() {
                                config.dashboard.port = v;
                            }
                        }
                        _ => {}
                    },
                    _ => {}
                }
            }
        }
    }

    Some(config)
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    if (val.starts_with('"') && val.ends_with('"'))
        || (val.starts_with('\'') && val.ends_with('\''))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

fn parse_float_value(val: &str) -> Option<f64> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    val.parse().ok()
}

/// Serialize config to YAML-like text.
fn serialize_config(config: &Config) -> String {
    let mut lines = vec!["# skywatch configuration".to_string(), String::new()];

    lines.push(format!("debug: {}", config.debug));
    lines.push(String::new());

    lines.push("centre:".into());
    lines.push(format!("  lat: {}", config.centre.lat));
    lines.push(format!("  lon: {}", config.centre.lon));
    lines.push(String::new());

    lines.push("search:".into());
    lines.push(format!("  radius_m: {}", config.search.radius_m));
    lines.push(String::new());

    lines.push("fetch:".into());
    lines.push(format!("  interval_secs: {}", config.fetch.interval_secs));
    lines.push(format!("  stale_factor: {}", config.fetch.stale_factor));
    lines.push(format!("  thin_every: {}", config.fetch.thin_every));
    lines.push(String::new());

    lines.push("feed:".into());
    match &config.feed.api_key {
        Some(k) => lines.push(format!("  api_key: \"{k}\"")),
        None => lines.push("  api_key: null".into()),
    }
    lines.push(format!("  api_host: \"{}\"", config.feed.api_host));
    lines.push(String::new());

    lines.push("geofence:".into());
    lines.push(format!("  path: \"{}\"", config.geofence.path));
    lines.push(String::new());

    lines.push("storage:".into());
    lines.push(format!("  path: \"{}\"", config.storage.path));
    lines.push(String::new());

    lines.push("dashboard:".into());
    lines.push(format!("  host: \"{}\"", config.dashboard.host));
    lines.push(format!("  port: {}", config.dashboard.port));
    lines.push(String::new());

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fetch.interval_secs, 5.0);
        assert_eq!(config.fetch.stale_factor, 2.0);
        assert_eq!(config.fetch.thin_every, 10);
        assert_eq!(config.search.radius_m, 38000.0);
        assert!(config.feed.api_key.is_none());
        assert_eq!(config.dashboard.port, 8080);
    }

    #[test]
    fn test_timeout_is_interval_times_factor() {
        let config = Config::default();
        assert_eq!(config.timeout_secs(), 10.0);
    }

    #[test]
    fn test_radius_nm() {
        let config = Config::default();
        assert!((config.radius_nm() - 20.518).abs() < 0.01);
    }

    #[test]
    fn test_debug_profile() {
        let mut config = Config::default();
        config.debug = true;
        config.apply_debug();
        assert_eq!(config.search.radius_m, 150_000.0);
        assert_eq!(config.fetch.interval_secs, 2.0);

        let mut normal = Config::default();
        normal.apply_debug();
        assert_eq!(normal.search.radius_m, 38000.0);
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
debug: true

centre:
  lat: 51.5
  lon: -0.12

search:
  radius_m: 20000

fetch:
  interval_secs: 10
  stale_factor: 3
  thin_every: 5

feed:
  api_key: "secret"
  api_host: "example.rapidapi.com"

geofence:
  path: "/tmp/zone.geojson"

storage:
  path: "/tmp/test.db"

dashboard:
  host: "0.0.0.0"
  port: 9090
"#;
        let config = parse_config(text).unwrap();
        assert!(config.debug);
        assert_eq!(config.centre.lat, 51.5);
        assert_eq!(config.search.radius_m, 20000.0);
        assert_eq!(config.fetch.interval_secs, 10.0);
        assert_eq!(config.fetch.stale_factor, 3.0);
        assert_eq!(config.fetch.thin_every, 5);
        assert_eq!(config.feed.api_key.as_deref(), Some("secret"));
        assert_eq!(config.geofence.path, "/tmp/zone.geojson");
        assert_eq!(config.storage.path, "/tmp/test.db");
        assert_eq!(config.dashboard.port, 9090);
    }

    #[test]
    fn test_parse_config_null_key() {
        let text = "feed:\n  api_key: null\n";
        let config = parse_config(text).unwrap();
        assert!(config.feed.api_key.is_none());
    }

    #[test]
    fn test_roundtrip() {
        let mut config = Config::default();
        config.debug = true;
        config.centre.lat = 40.0;
        config.feed.api_key = Some("key-123".into());
        config.fetch.thin_every = 4;

        let text = serialize_config(&config);
        let parsed = parse_config(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
