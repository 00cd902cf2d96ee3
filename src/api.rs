use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::agent::DynAgentClient;
use crate::dataset::{DataMode, Dataset, RequestContext};
use crate::extract::narrative_brief;
use crate::orchestrator::{DashboardOrchestrator, DashboardUpdate};
use crate::prompts::{standard_prompt, with_context, StandardPrompt, STANDARD_PROMPTS};
use crate::validate::Thresholds;

/// One dashboard session per service instance.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<DashboardOrchestrator>,
    pub agent: DynAgentClient,
}

impl AppState {
    pub fn new(agent: DynAgentClient, thresholds: Thresholds) -> Self {
        Self {
            orchestrator: Arc::new(DashboardOrchestrator::new(agent.clone(), thresholds)),
            agent,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/dashboard/placeholder", get(dashboard_placeholder))
        .route("/dashboard/refresh", post(dashboard_refresh))
        .route("/chat", post(chat))
        .route("/prompts", get(prompts))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub data: Dataset,
    pub mode: DataMode,
    /// Agent text as received; escaping is the UI's job.
    pub narrative: String,
    /// Prose before the table appendix.
    pub brief: String,
    pub context_label: String,
    pub generated_at: DateTime<Utc>,
}

impl From<DashboardUpdate> for DashboardResponse {
    fn from(u: DashboardUpdate) -> Self {
        Self {
            brief: narrative_brief(&u.narrative).to_string(),
            context_label: u.context.label(),
            data: u.data,
            mode: u.mode,
            narrative: u.narrative,
            generated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { error: msg.into() }))
}

async fn dashboard_placeholder(
    State(state): State<AppState>,
    Query(ctx): Query<RequestContext>,
) -> Json<DashboardResponse> {
    Json(state.orchestrator.initial(&ctx).into())
}

async fn dashboard_refresh(
    State(state): State<AppState>,
    Json(ctx): Json<RequestContext>,
) -> Result<Json<DashboardResponse>, ApiError> {
    match state.orchestrator.refresh(&ctx).await {
        Some(update) => Ok(Json(update.into())),
        None => Err(api_error(
            StatusCode::CONFLICT,
            "a dashboard refresh is already in flight",
        )),
    }
}

#[derive(Debug, Deserialize)]
struct ChatReq {
    #[serde(default)]
    message: String,
    /// Id from `/prompts`; replaces `message` when set.
    #[serde(default)]
    prompt_id: Option<String>,
    #[serde(default)]
    context: Option<RequestContext>,
}

#[derive(Debug, Serialize)]
struct ChatResp {
    reply: String,
}

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatReq>,
) -> Result<Json<ChatResp>, ApiError> {
    let text = match req.prompt_id.as_deref() {
        Some(id) => standard_prompt(id)
            .map(|p| p.text.to_string())
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, format!("unknown prompt id '{id}'")))?,
        None => req.message.trim().to_string(),
    };
    if text.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message is empty"));
    }
    let message = match &req.context {
        Some(ctx) => with_context(ctx, &text),
        None => text,
    };

    match state.agent.complete(&message).await {
        Ok(reply) => Ok(Json(ChatResp { reply })),
        Err(e) => {
            tracing::warn!(error = %e, "chat call failed");
            Err(api_error(StatusCode::BAD_GATEWAY, e.to_string()))
        }
    }
}

async fn prompts() -> Json<&'static [StandardPrompt]> {
    let all: &'static [StandardPrompt] = &STANDARD_PROMPTS;
    Json(all)
}
