//! Prometheus metrics for update cycles and external calls.
//!
//! This module provides metrics for:
//! - Update runs, failures and duration
//! - sing-box subprocess latency and per-node failures
//! - subconverter request latency and conversion outcomes

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::{debug, warn};

// === Metric Name Constants ===

/// Update runs counter metric name.
pub const METRIC_UPDATE_RUNS: &str = "update_runs_total";
/// Update failures counter metric name.
pub const METRIC_UPDATE_FAILURES: &str = "update_failures_total";
/// Update duration metric name.
pub const METRIC_UPDATE_DURATION: &str = "update_duration_ms";
/// Node fetch errors counter metric name.
pub const METRIC_NODE_FETCH_ERRORS: &str = "node_fetch_errors_total";
/// Conversions counter metric name.
pub const METRIC_CONVERSIONS: &str = "conversions_total";
/// sing-box call latency metric name.
pub const METRIC_CLI_LATENCY: &str = "cli_call_latency_ms";
/// subconverter request latency metric name.
pub const METRIC_CONVERTER_LATENCY: &str = "converter_request_latency_ms";

static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder and register metric descriptions.
/// Call this once at startup; later calls are no-ops.
pub fn init_metrics() {
    let handle = PROMETHEUS.get_or_try_init(|| PrometheusBuilder::new().install_recorder());
    if let Err(e) = handle {
        warn!(error = %e, "failed to install prometheus recorder");
        return;
    }

    describe_counter!(METRIC_UPDATE_RUNS, "Total number of update cycles started");
    describe_counter!(
        METRIC_UPDATE_FAILURES,
        "Total number of update cycles that failed, by reason"
    );
    describe_histogram!(
        METRIC_UPDATE_DURATION,
        "Update cycle duration in milliseconds"
    );
    describe_counter!(
        METRIC_NODE_FETCH_ERRORS,
        "Total number of configs that produced no node URL"
    );
    describe_counter!(
        METRIC_CONVERSIONS,
        "Total number of subconverter conversions, by outcome"
    );
    describe_histogram!(
        METRIC_CLI_LATENCY,
        "sing-box subprocess latency in milliseconds"
    );
    describe_histogram!(
        METRIC_CONVERTER_LATENCY,
        "subconverter request latency in milliseconds"
    );

    debug!("Metrics initialized");
}

/// Render all metrics in Prometheus text format.
///
/// Returns an empty string when no recorder is installed.
pub fn render() -> String {
    match PROMETHEUS.get() {
        Some(handle) => {
            handle.run_upkeep();
            handle.render()
        }
        None => String::new(),
    }
}

/// Increment update runs counter.
pub fn inc_update_runs() {
    counter!(METRIC_UPDATE_RUNS).increment(1);
}

/// Increment update failures counter.
pub fn inc_update_failures(reason: &'static str) {
    counter!(METRIC_UPDATE_FAILURES, "reason" => reason).increment(1);
}

/// Record update cycle duration.
pub fn record_update_duration(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_UPDATE_DURATION).record(latency_ms);
}

/// Increment node fetch errors counter.
pub fn inc_node_fetch_errors() {
    counter!(METRIC_NODE_FETCH_ERRORS).increment(1);
}

/// Increment conversions counter.
pub fn inc_conversions(outcome: &'static str) {
    counter!(METRIC_CONVERSIONS, "outcome" => outcome).increment(1);
}

/// Record sing-box subprocess latency.
pub fn record_cli_latency(start: Instant, command: &str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_CLI_LATENCY, "command" => command.to_string()).record(latency_ms);
}

/// Record subconverter request latency.
pub fn record_converter_latency(start: Instant, endpoint: &'static str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_CONVERTER_LATENCY, "endpoint" => endpoint).record(latency_ms);
}
