//! HTTP/REST Router (C7): toolset/tool discovery and the invocation endpoint
//! (spec §4.7), grounded on the teacher's `build_app()` router-merging
//! pattern in `startup.rs`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use tower_http::trace::TraceLayer;

use toolbox_core::invoke::{self, Outcome};
use toolbox_core::{InvokeContext, ResourceManager, ToolboxError, DEFAULT_TOOLSET};

#[derive(Clone)]
struct AppState {
    resources: Arc<ResourceManager>,
}

/// Builds the REST router. Callers merge this with the MCP transport
/// routers (`toolbox_mcp::transport::*::router`) to form the full app.
pub fn router(resources: Arc<ResourceManager>) -> Router {
    let state = AppState { resources };
    Router::new()
        .route("/", get(root))
        .route("/api/toolset", get(default_toolset))
        .route("/api/toolset/{name}", get(named_toolset))
        .route("/api/tool/{name}", get(tool_manifest))
        .route("/api/tool/{name}/invoke", post(invoke_tool))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "toolbox gateway is running"
}

async fn default_toolset(State(state): State<AppState>) -> Response {
    manifest_response(&state, DEFAULT_TOOLSET).await
}

async fn named_toolset(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    manifest_response(&state, &name).await
}

async fn manifest_response(state: &AppState, name: &str) -> Response {
    let tuple = state.resources.current().await;
    match tuple.toolset_manifest(name) {
        Ok(manifest) => Json(manifest).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn tool_manifest(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let tuple = state.resources.current().await;
    match tuple.tool(&name) {
        Ok(tool) => Json(tool.manifest()).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn invoke_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: http::HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    if !has_json_content_type(&headers) {
        return ToolboxError::BadParam("Content-Type must be application/json".to_string()).into_response();
    }

    let raw_inputs: serde_json::Map<String, Value> = if body.is_empty() {
        serde_json::Map::new()
    } else {
        match serde_json::from_slice(&body) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return ToolboxError::BadParam("request body must be a JSON object".to_string()).into_response(),
            Err(e) => return ToolboxError::BadParam(format!("invalid JSON body: {e}")).into_response(),
        }
    };

    let tuple = state.resources.current().await;
    let (_close_tx, close_rx) = tokio::sync::watch::channel(false);
    let ctx = InvokeContext::new(None, close_rx);

    match invoke::invoke(&tuple, &name, &headers, &raw_inputs, ctx).await {
        Ok(Outcome::Success(outcome)) => {
            let result = outcome.to_json().to_string();
            Json(json!({ "result": result })).into_response()
        }
        Ok(Outcome::InvokeFailed(message)) => ToolboxError::InvokeError(message).into_response(),
        Err(err) => err.into_response(),
    }
}

fn has_json_content_type(headers: &http::HeaderMap) -> bool {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|value| value.split(';').next().unwrap_or("").trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn root_is_a_liveness_string() {
        let resources = Arc::new(ResourceManager::new(toolbox_core::ResourceTuple::default()));
        let app = router(resources);
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_tool_manifest_is_404() {
        let resources = Arc::new(ResourceManager::new(toolbox_core::ResourceTuple::default()));
        let app = router(resources);
        let response = app
            .oneshot(Request::builder().uri("/api/tool/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invoke_without_json_content_type_is_bad_request() {
        let resources = Arc::new(ResourceManager::new(toolbox_core::ResourceTuple::default()));
        let app = router(resources);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/tool/missing/invoke")
                    .header(http::header::CONTENT_TYPE, "text/plain")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), http::StatusCode::BAD_REQUEST);
    }
}
