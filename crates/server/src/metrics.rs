// crates/server/src/metrics.rs
//! Prometheus recorder for the job metrics emitted by `railvision-core`.
//!
//! The core crate only talks to the `metrics` facade; until [`init_metrics`]
//! runs, its counters and histograms go nowhere.

use std::sync::OnceLock;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const JOB_DURATION: &str = "railvision_job_duration_seconds";

/// Backend run times span sub-second dummies to multi-minute decodes.
const JOB_DURATION_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

/// Install the global Prometheus recorder.
///
/// Returns `false` when a recorder was already installed, by us or anyone
/// else; job metrics are then rendered by whoever owns that recorder.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let installed = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(JOB_DURATION.to_string()), JOB_DURATION_BUCKETS)
        .and_then(|builder| builder.install_recorder());
    let handle = match installed {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed");
            return false;
        }
    };
    if PROMETHEUS_HANDLE.set(handle).is_err() {
        return false;
    }

    describe_counter!(
        "railvision_jobs_submitted_total",
        "Jobs accepted for analysis, by backend"
    );
    describe_counter!(
        "railvision_jobs_completed_total",
        "Jobs that reached a terminal status, by backend and status"
    );
    describe_histogram!(
        JOB_DURATION,
        Unit::Seconds,
        "Wall clock time of backend invocations"
    );
    describe_gauge!("railvision_jobs_in_flight", "Backends currently executing");

    tracing::info!("Prometheus metrics initialized");
    true
}

/// Current exposition in Prometheus text format, `None` before [`init_metrics`].
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(PrometheusHandle::render)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_a_no_op() {
        init_metrics();
        assert!(!init_metrics());
        assert!(render_metrics().is_some());
    }

    #[test]
    fn test_recorded_job_metrics_are_rendered() {
        init_metrics();
        metrics::counter!("railvision_jobs_submitted_total", "backend" => "dummy").increment(1);

        let text = render_metrics().unwrap();
        assert!(text.contains("railvision_jobs_submitted_total"));
    }
}
