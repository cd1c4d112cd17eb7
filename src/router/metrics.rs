//! Prometheus metrics for the dispatch path.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{
    BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder,
};

pub const REQUESTS_TOTAL: &str = "router_requests_total";
pub const LATENCY_SECONDS: &str = "router_latency_seconds";
pub const WORKER_HEALTH: &str = "router_worker_health";

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0, 30.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(LATENCY_SECONDS.to_string()), LATENCY_BUCKETS)
}

/// Installs the process-wide recorder. The returned handle renders the
/// exposition text served on `/metrics`.
pub fn install_prometheus() -> anyhow::Result<PrometheusHandle> {
    let handle = builder()?.install_recorder()?;
    describe();
    Ok(handle)
}

/// Recorder that is not installed globally; pair with
/// `metrics::with_local_recorder` or `metrics::set_default_local_recorder`.
pub fn build_recorder() -> anyhow::Result<PrometheusRecorder> {
    Ok(builder()?.build_recorder())
}

fn describe() {
    describe_counter!(REQUESTS_TOTAL, "Total router requests");
    describe_histogram!(LATENCY_SECONDS, "Router latency of successful dispatches");
    describe_gauge!(WORKER_HEALTH, "Health of workers (1=last call succeeded, 0=failed)");
}

pub struct RouterMetrics;

impl RouterMetrics {
    pub fn record_request() {
        counter!(REQUESTS_TOTAL).increment(1);
    }

    pub fn record_latency(elapsed: Duration) {
        histogram!(LATENCY_SECONDS).record(elapsed.as_secs_f64());
    }

    pub fn set_worker_health(worker_id: usize, healthy: bool) {
        gauge!(WORKER_HEALTH, "worker" => worker_id.to_string()).set(if healthy { 1.0 } else { 0.0 });
    }
}
