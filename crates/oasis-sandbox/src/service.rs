//! The sandbox HTTP service: `POST /execute`, `GET /health`,
//! `DELETE /workspace/{session_id}`.
//!
//! A semaphore caps concurrent executions; when full, `/execute`
//! answers 503 before any user code runs. Each session gets a
//! workspace directory evicted after a TTL of inactivity.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::exec::run_code;
use crate::types::{ExecuteRequest, ExecuteResponse};
use crate::workspace::{is_valid_session_id, SessionWorkspaces};

/// Environment-driven service configuration (`SANDBOX_*`).
#[derive(Clone, Debug)]
pub struct SandboxConfig {
    pub addr: String,
    pub workspace: String,
    pub python_bin: String,
    pub node_bin: String,
    pub max_concurrent: usize,
    pub session_ttl: Duration,
    pub max_output: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8094".to_string(),
            workspace: "/tmp/oasis-sandbox".to_string(),
            python_bin: "python3".to_string(),
            node_bin: "node".to_string(),
            max_concurrent: 4,
            session_ttl: Duration::from_secs(30 * 60),
            max_output: 64 * 1024,
        }
    }
}

impl SandboxConfig {
    /// Read configuration from `SANDBOX_*` environment variables,
    /// keeping defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("SANDBOX_ADDR") {
            config.addr = v;
        }
        if let Ok(v) = std::env::var("SANDBOX_WORKSPACE") {
            config.workspace = v;
        }
        if let Ok(v) = std::env::var("SANDBOX_PYTHON_BIN") {
            config.python_bin = v;
        }
        if let Ok(v) = std::env::var("SANDBOX_NODE_BIN") {
            config.node_bin = v;
        }
        if let Ok(v) = std::env::var("SANDBOX_MAX_CONCURRENT") {
            if let Ok(n) = v.parse() {
                config.max_concurrent = n;
            }
        }
        if let Ok(v) = std::env::var("SANDBOX_SESSION_TTL") {
            if let Some(ttl) = parse_duration(&v) {
                config.session_ttl = ttl;
            }
        }
        if let Ok(v) = std::env::var("SANDBOX_MAX_OUTPUT") {
            if let Ok(n) = v.parse() {
                config.max_output = n;
            }
        }
        config
    }
}

/// Parse `"90s"`, `"15m"`, `"2h"`, or bare seconds.
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(mins) = s.strip_suffix('m') {
        return mins.parse::<u64>().ok().map(|n| Duration::from_secs(n * 60));
    }
    if let Some(hours) = s.strip_suffix('h') {
        return hours
            .parse::<u64>()
            .ok()
            .map(|n| Duration::from_secs(n * 3600));
    }
    let secs = s.strip_suffix('s').unwrap_or(s);
    secs.parse::<u64>().ok().map(Duration::from_secs)
}

#[derive(Clone)]
struct AppState {
    config: Arc<SandboxConfig>,
    slots: Arc<Semaphore>,
    workspaces: Arc<SessionWorkspaces>,
    http: reqwest::Client,
}

/// Build the axum router and start the eviction task.
pub fn build_router(config: SandboxConfig) -> Router {
    let workspaces = Arc::new(SessionWorkspaces::new(
        config.workspace.clone().into(),
        config.session_ttl,
    ));

    let state = AppState {
        slots: Arc::new(Semaphore::new(config.max_concurrent)),
        config: Arc::new(config),
        workspaces: workspaces.clone(),
        http: reqwest::Client::new(),
    };

    // Periodic idle-workspace eviction.
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            workspaces.evict_idle();
        }
    });

    Router::new()
        .route("/execute", post(execute))
        .route("/health", get(health))
        .route("/workspace/{session_id}", delete(remove_workspace))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn execute(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> impl IntoResponse {
    // Concurrency gate: refuse before touching user code.
    let Ok(_permit) = state.slots.try_acquire() else {
        warn!("execution slots exhausted");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "sandbox busy, retry later" })),
        )
            .into_response();
    };

    let session_id = request
        .session_id
        .clone()
        .unwrap_or_else(|| "default".to_string());
    if !is_valid_session_id(&session_id) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "invalid session_id" })),
        )
            .into_response();
    }

    let dir = match state.workspaces.dir_for(&session_id) {
        Ok(dir) => dir,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("workspace error: {e}") })),
            )
                .into_response();
        }
    };

    let response = run_code(
        &request,
        &dir,
        &state.config.python_bin,
        &state.config.node_bin,
        state.config.max_output,
    )
    .await;

    info!(
        execution = %request.execution_id,
        session = %session_id,
        exit_code = response.exit_code,
        "execution finished"
    );

    if let Some(url) = request.callback_url.as_deref().filter(|u| !u.is_empty()) {
        deliver_callback(&state.http, url, &response).await;
    }

    Json(response).into_response()
}

/// Best-effort result delivery to the caller's webhook.
async fn deliver_callback(http: &reqwest::Client, url: &str, response: &ExecuteResponse) {
    if let Err(e) = http.post(url).json(response).send().await {
        warn!(url, error = %e, "callback delivery failed");
    }
}

async fn remove_workspace(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    if !is_valid_session_id(&session_id) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "invalid session_id" })),
        );
    }
    match state.workspaces.remove(&session_id) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "removed": session_id }))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_config(tmp: &tempfile::TempDir, max_concurrent: usize) -> SandboxConfig {
        SandboxConfig {
            workspace: tmp.path().to_string_lossy().into_owned(),
            max_concurrent,
            ..Default::default()
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_config(&tmp, 1));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_execute_503_when_slots_exhausted() {
        let tmp = tempfile::tempdir().unwrap();
        // Zero slots: every execute is refused before running code.
        let app = build_router(test_config(&tmp, 0));

        let request = Request::post("/execute")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"execution_id":"e1","code":"print(1)","runtime":"python"}"#,
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        // No workspace was touched: user code never ran.
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_execute_rejects_traversal_session() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_config(&tmp, 1));

        let request = Request::post("/execute")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"execution_id":"e1","code":"print(1)","runtime":"python","session_id":"../evil"}"#,
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(&tmp, 1);
        std::fs::create_dir_all(tmp.path().join("sess1")).unwrap();
        let app = build_router(config);

        let response = app
            .clone()
            .oneshot(
                Request::delete("/workspace/sess1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!tmp.path().join("sess1").exists());

        let response = app
            .oneshot(
                Request::delete("/workspace/..%2Fevil")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("90s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("15m"), Some(Duration::from_secs(900)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("soon"), None);
    }

    #[test]
    fn test_config_from_env() {
        std::env::set_var("SANDBOX_MAX_CONCURRENT", "9");
        std::env::set_var("SANDBOX_SESSION_TTL", "5m");
        let config = SandboxConfig::from_env();
        assert_eq!(config.max_concurrent, 9);
        assert_eq!(config.session_ttl, Duration::from_secs(300));
        std::env::remove_var("SANDBOX_MAX_CONCURRENT");
        std::env::remove_var("SANDBOX_SESSION_TTL");
    }
}
