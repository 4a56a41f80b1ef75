//! Prometheus metrics for authorization decisions.

#[cfg(feature = "prometheus")]
use std::sync::OnceLock;
use std::time::Duration;

#[cfg(feature = "prometheus")]
use metrics::{counter, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::{authz::AuthzDecision, config::MetricsConfig};

/// Global Prometheus handle for the metrics endpoint.
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics system with the given configuration.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
            &config.latency_buckets_secs,
        )
        .map_err(|e| MetricsError::Setup(e.to_string()))?;

    let handle = builder.install_recorder().map_err(MetricsError::Install)?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::Setup("Metrics already initialized".to_string()))?;

    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(_config: &MetricsConfig) -> Result<(), MetricsError> {
    Ok(())
}

/// Get the Prometheus handle for rendering metrics.
#[cfg(feature = "prometheus")]
pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record a completed authorization decision.
pub fn record_authz_decision(decision: &AuthzDecision, elapsed: Duration) {
    #[cfg(feature = "prometheus")]
    {
        let outcome = if decision.allowed { "allow" } else { "deny" };
        counter!(
            "docguard_authz_decisions_total",
            "decision" => outcome,
            "rule" => decision.rule.as_str()
        )
        .increment(1);

        histogram!("docguard_authz_decision_duration_seconds", "decision" => outcome)
            .record(elapsed.as_secs_f64());
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (decision, elapsed);
    }
}

/// Record an evaluation that failed on a store lookup.
pub fn record_authz_failure() {
    #[cfg(feature = "prometheus")]
    {
        counter!("docguard_authz_decisions_total", "decision" => "error", "rule" => "lookup_failed")
            .increment(1);
    }
}

/// Record an audit log write that failed.
pub fn record_audit_write_failure() {
    #[cfg(feature = "prometheus")]
    {
        counter!("docguard_audit_write_failures_total").increment(1);
    }
}

/// Metrics initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
