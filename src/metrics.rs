//! Prometheus exposition for the refresh pipeline.

use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const REFRESH_TOTAL: &str = "dashboard_refresh_total";
pub const REFRESH_DROPPED_TOTAL: &str = "dashboard_refresh_dropped_total";
pub const AGENT_ERRORS_TOTAL: &str = "dashboard_agent_errors_total";
pub const AGENT_LATENCY_MS: &str = "dashboard_agent_latency_ms";

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the global Prometheus recorder once per process and return its handle.
pub fn install() -> anyhow::Result<PrometheusHandle> {
    let handle = HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe();
        Ok::<_, anyhow::Error>(handle)
    })?;
    Ok(handle.clone())
}

fn describe() {
    describe_counter!(
        REFRESH_TOTAL,
        "Published dashboard refreshes, labelled by mode (live|demo)."
    );
    describe_counter!(
        REFRESH_DROPPED_TOTAL,
        "Refresh requests dropped because one was already in flight."
    );
    describe_counter!(AGENT_ERRORS_TOTAL, "Agent calls that failed in transport.");
    describe_histogram!(AGENT_LATENCY_MS, "Agent call latency in milliseconds.");
}

/// `/metrics` route in the Prometheus text format; merges into any app router.
pub fn routes<S>(handle: PrometheusHandle) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/metrics",
        get(move || {
            let h = handle.clone();
            async move { h.render() }
        }),
    )
}
