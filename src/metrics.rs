//! Prometheus metrics for the score store and HTTP API.
//!
//! This module provides metrics for:
//! - Store liveness probes and reconnects
//! - Secret lookups
//! - High score reads and writes
//! - HTTP request latency

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use strum::IntoStaticStr;
use tracing::debug;

// === Metric Name Constants ===

/// Store probe latency metric name.
pub const METRIC_STORE_PROBE_LATENCY: &str = "store_probe_latency_ms";
/// HTTP request latency metric name.
pub const METRIC_HTTP_REQUEST_LATENCY: &str = "http_request_latency_ms";
/// Store probes counter metric name.
pub const METRIC_STORE_PROBES: &str = "store_probes_total";
/// Store reconnects counter metric name.
pub const METRIC_STORE_RECONNECTS: &str = "store_reconnects_total";
/// Unavailable acquisitions counter metric name.
pub const METRIC_STORE_UNAVAILABLE: &str = "store_unavailable_total";
/// Secret lookups counter metric name.
pub const METRIC_SECRET_LOOKUPS: &str = "secret_lookups_total";
/// Score reads counter metric name.
pub const METRIC_SCORE_READS: &str = "score_reads_total";
/// Score writes counter metric name.
pub const METRIC_SCORE_WRITES: &str = "score_writes_total";
/// Dropped score writes counter metric name.
pub const METRIC_SCORE_WRITES_DROPPED: &str = "score_writes_dropped_total";

/// Result label for store probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ProbeOutcome {
    /// PING answered.
    Healthy,
    /// PING failed or timed out.
    Failed,
}

/// Result label for secret lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum LookupOutcome {
    /// Secret returned.
    Found,
    /// Secret not configured.
    Missing,
    /// Provider failed.
    Error,
}

/// Register metric descriptions with the installed recorder.
///
/// Descriptions sent before a recorder is installed are dropped, so this runs
/// from `install_prometheus`.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_STORE_PROBE_LATENCY,
        "Store liveness probe latency in milliseconds"
    );
    describe_histogram!(
        METRIC_HTTP_REQUEST_LATENCY,
        "HTTP request latency in milliseconds"
    );

    describe_counter!(METRIC_STORE_PROBES, "Total number of store liveness probes");
    describe_counter!(
        METRIC_STORE_RECONNECTS,
        "Total number of fresh store connections established"
    );
    describe_counter!(
        METRIC_STORE_UNAVAILABLE,
        "Total number of requests that found the store unavailable"
    );
    describe_counter!(METRIC_SECRET_LOOKUPS, "Total number of secret lookups");
    describe_counter!(METRIC_SCORE_READS, "Total number of high score reads");
    describe_counter!(METRIC_SCORE_WRITES, "Total number of new high scores stored");
    describe_counter!(
        METRIC_SCORE_WRITES_DROPPED,
        "Total number of new high scores that could not be stored"
    );

    debug!("Metrics initialized");
}

/// Install the Prometheus recorder and return the handle used to render it.
pub fn install_prometheus() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    init_metrics();
    Ok(handle)
}

/// Record a store probe and its latency.
pub fn record_store_probe(start: Instant, outcome: ProbeOutcome) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    let result: &'static str = outcome.into();
    histogram!(METRIC_STORE_PROBE_LATENCY).record(latency_ms);
    counter!(METRIC_STORE_PROBES, "result" => result).increment(1);
}

/// Record HTTP request latency.
pub fn record_http_latency(start: Instant, endpoint: &str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_HTTP_REQUEST_LATENCY, "endpoint" => endpoint.to_string()).record(latency_ms);
}

/// Increment store reconnects counter.
pub fn inc_store_reconnects() {
    counter!(METRIC_STORE_RECONNECTS).increment(1);
}

/// Increment unavailable store counter.
pub fn inc_store_unavailable() {
    counter!(METRIC_STORE_UNAVAILABLE).increment(1);
}

/// Increment secret lookups counter.
pub fn inc_secret_lookups(outcome: LookupOutcome) {
    let result: &'static str = outcome.into();
    counter!(METRIC_SECRET_LOOKUPS, "result" => result).increment(1);
}

/// Increment score reads counter.
pub fn inc_score_reads() {
    counter!(METRIC_SCORE_READS).increment(1);
}

/// Increment score writes counter.
pub fn inc_score_writes() {
    counter!(METRIC_SCORE_WRITES).increment(1);
}

/// Increment dropped score writes counter.
pub fn inc_score_writes_dropped() {
    counter!(METRIC_SCORE_WRITES_DROPPED).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels_are_snake_case() {
        let healthy: &'static str = ProbeOutcome::Healthy.into();
        let missing: &'static str = LookupOutcome::Missing.into();
        assert_eq!(healthy, "healthy");
        assert_eq!(missing, "missing");
    }

    #[test]
    fn rendered_metrics_carry_descriptions() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            init_metrics();
            inc_store_reconnects();
        });

        let rendered = handle.render();
        assert!(rendered.contains(
            "# HELP store_reconnects_total Total number of fresh store connections established"
        ));
        assert!(rendered.contains("store_reconnects_total 1"));
    }

    #[test]
    fn recording_without_recorder_is_a_noop() {
        record_store_probe(Instant::now(), ProbeOutcome::Failed);
        record_http_latency(Instant::now(), "/score");
        inc_score_writes_dropped();
    }
}
