//! REST API server for the financial copilot agents
//!
//! A thin JSON adapter over the agent registry:
//! - `GET /health`
//! - `GET /api/agents`
//! - `POST /api/agents/:name` with `{"state": {...}, "config": {...}}`

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::agents::AgentRegistry;
use crate::error::AgentError;
use crate::models::AgentState;
use crate::settings::RunConfig;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    #[serde(default)]
    pub state: Option<AgentState>,
    #[serde(default)]
    pub config: RunConfig,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

fn status_for(err: &AgentError) -> StatusCode {
    match err {
        AgentError::AgentNotFound(_) => StatusCode::NOT_FOUND,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(err: AgentError) -> (StatusCode, Json<ApiResponse>) {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(error = %err, "Agent run failed");
    } else {
        warn!(error = %err, "Rejected agent request");
    }
    (status, Json(ApiResponse::error(err.to_string())))
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub registry: AgentRegistry,
}

/// =============================
/// Handlers
/// =============================

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_agents(State(state): State<ApiState>) -> Json<ApiResponse> {
    Json(ApiResponse::success(state.registry.list()))
}

async fn invoke_agent(
    State(api): State<ApiState>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<ApiResponse>) {
    let Some(agent) = api.registry.get(&name) else {
        return failure(AgentError::AgentNotFound(name));
    };

    let request: InvokeRequest = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(e) => return failure(AgentError::InvalidState(e.to_string())),
    };

    // Surface malformed settings before any node runs.
    if let Err(e) = request.config.settings() {
        return failure(e);
    }

    let state = request.state.unwrap_or_default();
    info!(
        agent = %name,
        messages = state.messages.len(),
        "Invoking agent"
    );

    match agent.run(state, &request.config).await {
        Ok(state) => (StatusCode::OK, Json(ApiResponse::success(state))),
        Err(e) => failure(e),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(registry: AgentRegistry) -> Router {
    let state = ApiState { registry };

    Router::new()
        .route("/health", get(health))
        .route("/api/agents", get(list_agents))
        .route("/api/agents/:name", post(invoke_agent))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    registry: AgentRegistry,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(registry);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Agent;
    use crate::models::Message;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Echo;

    #[async_trait]
    impl Agent for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Repeats the latest message"
        }

        async fn run(&self, mut state: AgentState, config: &RunConfig) -> crate::Result<AgentState> {
            config.settings()?;
            let reply = state
                .latest_message()
                .map(Message::text)
                .ok_or_else(|| AgentError::LlmError("nothing to echo".to_string()))?;
            state.messages.push(Message::assistant(reply));
            Ok(state)
        }
    }

    fn router() -> Router {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(Echo));
        create_router(registry)
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_lists_agents() {
        let request = Request::builder().uri("/api/agents").body(Body::empty()).unwrap();
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"],
            json!([{"name": "echo", "description": "Repeats the latest message"}])
        );
    }

    #[tokio::test]
    async fn test_invokes_agent() {
        let request = post_json(
            "/api/agents/echo",
            json!({"state": {"messages": [{"role": "user", "content": "hello"}]}}),
        );
        let (status, body) = send(request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let messages = body["data"]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"], "hello");
        assert_eq!(body["data"]["locale"], "en-US");
    }

    #[tokio::test]
    async fn test_unknown_agent_is_404() {
        let (status, body) = send(post_json("/api/agents/nobody", json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_malformed_settings_are_400() {
        let request = post_json(
            "/api/agents/echo",
            json!({"config": {"configurable": {"x-settings": "%%% not base64"}}}),
        );
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Settings decode error"));
    }

    #[tokio::test]
    async fn test_malformed_state_is_400() {
        let request = post_json("/api/agents/echo", json!({"state": {"messages": 3}}));
        let (status, _) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_agent_failure_is_500() {
        let (status, body) = send(post_json("/api/agents/echo", json!({"state": {}}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "LLM error: nothing to echo");
    }
}
