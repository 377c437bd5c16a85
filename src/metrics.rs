//! Metrics initialization and recording.
//!
//! Counters are recorded unconditionally; when the exporter is not
//! installed the `metrics` facade turns them into no-ops.

use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;
use crate::error::{Error, Result};
use crate::policy::Verdict;

/// Initialize the metrics system based on configuration.
///
/// When metrics are enabled, this starts an HTTP server that exposes
/// a `/metrics` endpoint for Prometheus to scrape. Must be called from
/// within a Tokio runtime.
pub fn init(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(config.listen)
        .install()
        .map_err(|err| Error::Metrics(err.to_string()))?;

    Ok(())
}

pub fn record_verdict(verdict: Verdict) {
    let label = match verdict {
        Verdict::Accept => "accept",
        Verdict::Drop => "drop",
    };
    metrics::counter!("nfq_packets_total", "verdict" => label).increment(1);
}

pub fn record_decode_error() {
    metrics::counter!("nfq_decode_errors_total").increment(1);
}

pub fn record_bypass() {
    metrics::counter!("nfq_bypassed_total").increment(1);
}

pub fn record_worker_failure() {
    metrics::counter!("nfq_worker_failures_total").increment(1);
}

pub fn record_queue_wait(wait: Duration) {
    metrics::histogram!("nfq_queue_wait_seconds").record(wait.as_secs_f64());
}
