// src/lib.rs
// Public library surface for the service binary, the probe and integration tests.

pub mod agent;
pub mod api;
pub mod config;
pub mod dataset;
pub mod extract;
pub mod metrics;
pub mod numeric;
pub mod orchestrator;
pub mod placeholder;
pub mod prompts;
pub mod telemetry;
pub mod validate;

pub use crate::api::{router, AppState};
pub use crate::dataset::{DataMode, Dataset, RequestContext};
pub use crate::orchestrator::{DashboardOrchestrator, DashboardUpdate};

use axum::Router;
use tracing::info;

use crate::config::DashboardConfig;

/// Build the full application router from config and environment:
/// agent client, dashboard session, Prometheus `/metrics`.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = DashboardConfig::load_default()?;
    let agent = agent::build_agent_client(&cfg.agent)?;
    info!(
        agent = agent.name(),
        agent_id = cfg.agent.agent_id.as_deref().unwrap_or("-"),
        has_key = cfg.agent.has_api_key(),
        thresholds = ?cfg.validation,
        "dashboard service configured"
    );

    let handle = metrics::install()?;
    let state = AppState::new(agent, cfg.validation);
    Ok(router(state).merge(metrics::routes(handle)))
}
