//! Component N (SPEC_FULL §4.N): thin HTTP transport exposing the
//! coordination layer to out-of-process callers. No conversation
//! persistence, no auth beyond an optional constant-time bearer token
//! (§1 non-goals exclude user authentication).

use crate::coordination::models::{AgentCard, Task};
use crate::coordination::{AgentRegistry, LockManager, Orchestrator, TaskQueue};
use crate::error::ForgeError;
use crate::tools::{ToolContext, ToolRegistry};
use crate::validation;
use axum::extract::{Path as AxumPath, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub struct ApiState {
    pub agents: Arc<AgentRegistry>,
    pub tasks: Arc<TaskQueue>,
    pub locks: Arc<LockManager>,
    pub orchestrator: Arc<Orchestrator>,
    pub tool_ctx: ToolContext,
    pub bearer_token: Option<String>,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/agents", get(list_agents).post(register_agent))
        .route("/agents/{id}/heartbeat", post(heartbeat))
        .route("/tasks", get(list_tasks).post(submit_task))
        .route("/tasks/{id}", get(get_task))
        .route("/tasks/{id}/claim", post(claim_task))
        .route("/tools/{name}", post(run_tool))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn authorize(state: &ApiState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = &state.bearer_token else {
        return Ok(());
    };
    let provided = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match provided {
        Some(token) if crate::security::tokens_equal(token, expected) => Ok(()),
        _ => Err((StatusCode::UNAUTHORIZED, "unauthorized").into_response()),
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn list_agents(State(state): State<Arc<ApiState>>, headers: HeaderMap) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    match state.agents.list().await {
        Ok(agents) => Json(agents).into_response(),
        Err(e) => error_response(e),
    }
}

async fn register_agent(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(card): Json<AgentCard>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    if let Err(e) = validation::validate_agent_id(&card.id) {
        return error_response(e);
    }
    match state.agents.register(card).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn heartbeat(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    if let Err(e) = validation::validate_agent_id(&id) {
        return error_response(e);
    }
    match state.agents.heartbeat(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_tasks(State(state): State<Arc<ApiState>>, headers: HeaderMap) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    match state.orchestrator.pending_tasks().await {
        tasks => Json(tasks).into_response(),
    }
}

async fn submit_task(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(task): Json<Task>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    if let Err(e) = validation::validate_key(&task.id) {
        return error_response(e);
    }
    match state.tasks.submit(task).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_task(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    if let Err(e) = validation::validate_key(&id) {
        return error_response(e);
    }
    match state.tasks.get(&id).await {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
struct ClaimRequest {
    agent_id: String,
}

async fn claim_task(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
    Json(body): Json<ClaimRequest>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    if let Err(e) = validation::validate_key(&id).and_then(|_| validation::validate_agent_id(&body.agent_id)) {
        return error_response(e);
    }
    match state.tasks.claim(&id, &body.agent_id).await {
        Ok(task) => Json(task).into_response(),
        Err(e) => error_response(e),
    }
}

async fn run_tool(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    AxumPath(name): AxumPath<String>,
    Json(input): Json<serde_json::Value>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    match ToolRegistry::run(&state.tool_ctx, &name, input).await {
        Ok(output) => Json(output).into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(error: ForgeError) -> Response {
    let status = match &error {
        ForgeError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ForgeError::NotFound(_) => StatusCode::NOT_FOUND,
        ForgeError::AlreadyExists(_) | ForgeError::Precondition(_) => StatusCode::CONFLICT,
        ForgeError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, error.to_string()).into_response()
}
