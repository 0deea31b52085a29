// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for criteria-engine.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `criteria_engine_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `backend`: relational, document
//! - `mode`: find, simple, pipeline
//! - `status`: success, error
//! - `kind`: configuration, validation, backend

use metrics::{counter, histogram};
use std::time::{Duration, Instant};

/// Record a completed search
pub fn record_search(backend: &str, mode: &str, status: &str) {
    counter!(
        "criteria_engine_searches_total",
        "backend" => backend.to_string(),
        "mode" => mode.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a failed search by error kind
pub fn record_error(backend: &str, kind: &str) {
    counter!(
        "criteria_engine_errors_total",
        "backend" => backend.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record search latency
pub fn record_latency(backend: &str, mode: &str, duration: Duration) {
    histogram!(
        "criteria_engine_search_seconds",
        "backend" => backend.to_string(),
        "mode" => mode.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record the number of items returned and the matching total
pub fn record_result_size(backend: &str, items: usize, total: u64) {
    histogram!(
        "criteria_engine_result_items",
        "backend" => backend.to_string()
    )
    .record(items as f64);
    histogram!(
        "criteria_engine_result_total",
        "backend" => backend.to_string()
    )
    .record(total as f64);
}

/// Record join-tree size for a relational build
pub fn record_join_nodes(count: usize) {
    histogram!("criteria_engine_join_nodes").record(count as f64);
}

/// Record pipeline length for a document aggregation
pub fn record_pipeline_stages(count: usize) {
    histogram!("criteria_engine_pipeline_stages").record(count as f64);
}

/// Timer that records search latency on drop
pub struct LatencyTimer {
    backend: &'static str,
    mode: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(backend: &'static str, mode: &'static str) -> Self {
        Self {
            backend,
            mode,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.backend, self.mode, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These only check the calls are safe without an installed recorder.

    #[test]
    fn test_record_search() {
        record_search("relational", "find", "success");
        record_search("document", "pipeline", "error");
    }

    #[test]
    fn test_record_error_and_sizes() {
        record_error("relational", "configuration");
        record_result_size("document", 10, 250);
        record_join_nodes(3);
        record_pipeline_stages(6);
    }

    #[test]
    fn test_latency_timer_records_on_drop() {
        let timer = LatencyTimer::new("document", "simple");
        std::thread::sleep(Duration::from_millis(1));
        drop(timer);
    }
}
