//! Upstream aircraft feed — ADS-B Exchange v2 via RapidAPI.
//!
//! The engine only sees the `FeedSource` trait; a failed or malformed fetch
//! surfaces as an error that the scheduler downgrades to "zero reports this
//! cycle".

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use skywatch_core::{Altitude, PositionReport};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// One poll of the upstream feed for a circular search area.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the current aircraft snapshot around `(lat, lon)` within
    /// `radius_nm`. `now` (Unix seconds) stamps the returned reports.
    async fn fetch(
        &self,
        lat: f64,
        lon: f64,
        radius_nm: f64,
        now: f64,
    ) -> Result<Vec<PositionReport>, FeedError>;
}

/// ADS-B Exchange client (RapidAPI gateway).
pub struct AdsbxClient {
    client: reqwest::Client,
    host: String,
    api_key: String,
}

impl AdsbxClient {
    pub fn new(host: &str, api_key: &str) -> Self {
        AdsbxClient {
            client: reqwest::Client::new(),
            host: host.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl FeedSource for AdsbxClient {
    async fn fetch(
        &self,
        lat: f64,
        lon: f64,
        radius_nm: f64,
        now: f64,
    ) -> Result<Vec<PositionReport>, FeedError> {
        let url = format!(
            "https://{}/v2/lat/{lat}/lon/{lon}/dist/{radius_nm}/",
            self.host
        );
        let payload: Value = self
            .client
            .get(&url)
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.host)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_reports(&payload, now)
    }
}

/// Extract position reports from a feed payload.
///
/// The aircraft list lives under `ac`; its absence is a malformed payload.
/// Individual records missing an id, position, or altitude are skipped —
/// they cannot be tracked or geofenced.
pub fn parse_reports(payload: &Value, now: f64) -> Result<Vec<PositionReport>, FeedError> {
    let list = payload
        .get("ac")
        .and_then(Value::as_array)
        .ok_or_else(|| FeedError::Malformed("no aircraft list in payload".into()))?;

    let mut reports = Vec::with_capacity(list.len());
    for entry in list {
        let id = match entry.get("hex").and_then(Value::as_str) {
            Some(h) => h.trim().to_string(),
            None => continue,
        };
        let (lat, lon) = match (
            entry.get("lat").and_then(Value::as_f64),
            entry.get("lon").and_then(Value::as_f64),
        ) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => continue,
        };
        let altitude = match entry.get("alt_baro") {
            Some(v) => match serde_json::from_value::<Altitude>(v.clone()) {
                Ok(alt) => alt,
                Err(_) => continue,
            },
            None => continue,
        };
        let heading = entry.get("track").and_then(Value::as_f64).unwrap_or(0.0);
        let label = entry
            .get("flight")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string();

        reports.push(PositionReport {
            id,
            lat,
            lon,
            altitude,
            heading,
            label,
            observed_at: now,
        });
    }
    Ok(reports)
}

// ---------------------------------------------------------------------------
// Test feed
// ---------------------------------------------------------------------------

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays pre-scripted batches, then empty batches forever.
    pub struct ScriptedFeed {
        batches: Mutex<VecDeque<Vec<PositionReport>>>,
    }

    impl ScriptedFeed {
        pub fn new(batches: Vec<Vec<PositionReport>>) -> Self {
            ScriptedFeed {
                batches: Mutex::new(batches.into()),
            }
        }
    }

    #[async_trait]
    impl FeedSource for ScriptedFeed {
        async fn fetch(
            &self,
            _lat: f64,
            _lon: f64,
            _radius_nm: f64,
            _now: f64,
        ) -> Result<Vec<PositionReport>, FeedError> {
            Ok(self.batches.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    /// Always fails, simulating upstream outage.
    pub struct FailingFeed;

    #[async_trait]
    impl FeedSource for FailingFeed {
        async fn fetch(
            &self,
            _lat: f64,
            _lon: f64,
            _radius_nm: f64,
            _now: f64,
        ) -> Result<Vec<PositionReport>, FeedError> {
            Err(FeedError::Malformed("upstream outage".into()))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
