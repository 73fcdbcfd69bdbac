//! Operational metrics with periodic JSON flush.
//!
//! The collector is explicitly constructed and shared by the composition
//! root (`Arc<MetricsCollector>`); there is no global singleton. An
//! internal mutex guards all mutation, so any component holding the Arc
//! can record from any thread.
//!
//! Flushes rewrite one JSON document atomically (temp file + rename) so
//! a dashboard reading the file outside the state lock never observes a
//! partial write.

use crate::error::TelemetryResult;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Samples retained per duration series between flushes.
const DURATION_WINDOW: usize = 1000;

/// Reduced statistics for one duration series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    pub avg: f64,
    pub p95: f64,
    pub max: f64,
}

/// On-disk metrics document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MetricsDocument {
    #[serde(default)]
    last_updated: String,
    #[serde(default)]
    counters: BTreeMap<String, u64>,
    #[serde(default)]
    gauges: BTreeMap<String, f64>,
    #[serde(default)]
    durations: BTreeMap<String, DurationStats>,
    #[serde(default)]
    timestamps: BTreeMap<String, String>,
}

#[derive(Default)]
struct MetricsState {
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, f64>,
    durations: BTreeMap<String, Vec<f64>>,
    timestamps: BTreeMap<String, String>,
}

/// Process-wide metrics collector.
pub struct MetricsCollector {
    path: PathBuf,
    state: Mutex<MetricsState>,
}

impl MetricsCollector {
    /// Create a collector persisting to `path`, restoring counters,
    /// gauges, and timestamps from the previous flush. A missing or
    /// corrupt file starts fresh.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut state = MetricsState::default();

        match std::fs::read_to_string(&path) {
            Ok(body) => match serde_json::from_str::<MetricsDocument>(&body) {
                Ok(doc) => {
                    state.counters = doc.counters;
                    state.gauges = doc.gauges;
                    state.timestamps = doc.timestamps;
                    // Duration samples are reduced at flush time and not
                    // restorable; series restart empty.
                }
                Err(e) => warn!(?e, "Corrupt metrics file, starting fresh"),
            },
            Err(_) => {}
        }

        Self {
            path,
            state: Mutex::new(state),
        }
    }

    /// Increment a counter by 1.
    pub fn increment(&self, name: &str) {
        self.increment_by(name, 1);
    }

    /// Increment a counter by `value`.
    pub fn increment_by(&self, name: &str, value: u64) {
        let mut state = self.state.lock();
        *state.counters.entry(name.to_string()).or_insert(0) += value;
    }

    /// Overwrite a gauge with the latest value.
    pub fn set_gauge(&self, name: &str, value: f64) {
        self.state.lock().gauges.insert(name.to_string(), value);
    }

    /// Record one duration sample; only the last [`DURATION_WINDOW`]
    /// samples per series are retained.
    pub fn record_duration(&self, name: &str, value: f64) {
        let mut state = self.state.lock();
        let series = state.durations.entry(name.to_string()).or_default();
        series.push(value);
        if series.len() > DURATION_WINDOW {
            let excess = series.len() - DURATION_WINDOW;
            series.drain(..excess);
        }
    }

    /// Set a "last run" style timestamp to now (RFC 3339).
    pub fn set_timestamp(&self, name: &str) {
        self.state
            .lock()
            .timestamps
            .insert(name.to_string(), Utc::now().to_rfc3339());
    }

    /// Current value of a counter (mainly for tests and reports).
    pub fn counter(&self, name: &str) -> u64 {
        self.state.lock().counters.get(name).copied().unwrap_or(0)
    }

    /// Current value of a gauge.
    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.state.lock().gauges.get(name).copied()
    }

    /// Write the merged metrics document atomically.
    pub fn flush(&self) -> TelemetryResult<()> {
        let doc = {
            let state = self.state.lock();
            MetricsDocument {
                last_updated: Utc::now().to_rfc3339(),
                counters: state.counters.clone(),
                gauges: state.gauges.clone(),
                durations: state
                    .durations
                    .iter()
                    .filter(|(_, samples)| !samples.is_empty())
                    .map(|(name, samples)| (name.clone(), reduce(samples)))
                    .collect(),
                timestamps: state.timestamps.clone(),
            }
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, serde_json::to_vec_pretty(&doc)?)?;
        std::fs::rename(&temp_path, &self.path)?;

        debug!(path = %self.path.display(), "Metrics flushed");
        Ok(())
    }

    /// Path of the metrics file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn reduce(samples: &[f64]) -> DurationStats {
    let avg = samples.iter().sum::<f64>() / samples.len() as f64;
    let max = samples.iter().cloned().fold(f64::MIN, f64::max);
    DurationStats {
        avg,
        p95: percentile(samples, 0.95),
        max,
    }
}

fn percentile(samples: &[f64], fraction: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("no NaN durations"));
    let index = ((sorted.len() as f64) * fraction) as usize;
    sorted[index.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_counters_and_gauges() {
        let dir = TempDir::new().unwrap();
        let metrics = MetricsCollector::new(dir.path().join("metrics.json"));

        metrics.increment("rebalance_total");
        metrics.increment("rebalance_total");
        metrics.increment_by("orders_executed", 4);
        metrics.set_gauge("portfolio_value_usd", 10000.0);
        metrics.set_gauge("portfolio_value_usd", 10500.0);

        assert_eq!(metrics.counter("rebalance_total"), 2);
        assert_eq!(metrics.counter("orders_executed"), 4);
        assert_eq!(metrics.gauge("portfolio_value_usd"), Some(10500.0));
    }

    #[test]
    fn test_flush_and_reload_merges_counters() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.json");

        {
            let metrics = MetricsCollector::new(&path);
            metrics.increment_by("rebalance_total", 3);
            metrics.set_gauge("drift_max_pct", 7.5);
            metrics.set_timestamp("autopilot_last_run");
            metrics.flush().unwrap();
        }

        let metrics = MetricsCollector::new(&path);
        metrics.increment("rebalance_total");
        assert_eq!(metrics.counter("rebalance_total"), 4);
        assert_eq!(metrics.gauge("drift_max_pct"), Some(7.5));
    }

    #[test]
    fn test_duration_stats_reduced_on_flush() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.json");
        let metrics = MetricsCollector::new(&path);

        for i in 1..=100 {
            metrics.record_duration("order_execution_duration_ms", i as f64);
        }
        metrics.flush().unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&body).unwrap();
        let stats = &doc["durations"]["order_execution_duration_ms"];
        assert_eq!(stats["avg"].as_f64().unwrap(), 50.5);
        assert_eq!(stats["max"].as_f64().unwrap(), 100.0);
        assert!(stats["p95"].as_f64().unwrap() >= 95.0);
    }

    #[test]
    fn test_duration_window_bounded() {
        let dir = TempDir::new().unwrap();
        let metrics = MetricsCollector::new(dir.path().join("metrics.json"));

        for i in 0..(DURATION_WINDOW + 50) {
            metrics.record_duration("d", i as f64);
        }
        let state = metrics.state.lock();
        assert_eq!(state.durations["d"].len(), DURATION_WINDOW);
        // Oldest samples were dropped.
        assert_eq!(state.durations["d"][0], 50.0);
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.json");
        std::fs::write(&path, "{not json").unwrap();

        let metrics = MetricsCollector::new(&path);
        assert_eq!(metrics.counter("rebalance_total"), 0);
    }
}
