// HTTP request handlers
use crate::application::tool_catalog::{self, ToolDefinition, ToolName};
use crate::application::tool_result::ToolResult;
use crate::presentation::app_state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/tools", get(list_tools))
        .route("/sessions/:id/dashboard", get(get_dashboard))
        .route("/sessions/:id/tools/:name", post(invoke_tool))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Tool definitions a host agent registers
pub async fn list_tools() -> Json<Vec<ToolDefinition>> {
    Json(tool_catalog::definitions())
}

pub async fn get_dashboard(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Json<ToolResult> {
    let tools = state.sessions.session(&id).await;
    Json(tools.get_dashboard().await)
}

/// Runs one tool call; the body is its parameter object and may be empty
pub async fn invoke_tool(
    Path((id, name)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> (StatusCode, Json<ToolResult>) {
    if ToolName::from_str(&name).is_err() {
        let result = ToolResult::failure(format!("Unknown tool '{}'", name));
        return (StatusCode::NOT_FOUND, Json(result));
    }

    let params = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(params) => params,
            Err(e) => {
                tracing::info!("Rejected malformed body for tool {}: {}", name, e);
                let result = ToolResult::failure(format!("Request body is not valid JSON: {}", e));
                return (StatusCode::BAD_REQUEST, Json(result));
            }
        }
    };

    let tools = state.sessions.session(&id).await;
    let result = tool_catalog::dispatch(&tools, &name, params).await;
    (StatusCode::OK, Json(result))
}
