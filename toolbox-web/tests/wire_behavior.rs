//! End-to-end wire-behavior tests: the REST router merged with the MCP
//! Streamable HTTP transport, driven as a real HTTP client would.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use toolbox_core::{ResourceManager, ResourceTuple};
use toolbox_mcp::{Engine, SessionManager};

fn app() -> axum::Router {
    let resources = Arc::new(ResourceManager::new(ResourceTuple::default()));
    let engine = Arc::new(Engine::new(resources.clone()));
    let sessions = Arc::new(SessionManager::new());

    toolbox_web::router::router(resources)
        .merge(toolbox_mcp::transport::streamable_http::router(engine.clone(), sessions.clone()))
        .merge(toolbox_mcp::transport::sse::router(engine, sessions))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn rest_root_and_default_toolset_manifest() {
    let response = app()
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app()
        .oneshot(Request::builder().uri("/api/toolset").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let manifest = body_json(response).await;
    assert!(manifest["tools"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn rest_invoke_rejects_non_json_content_type() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/tool/missing/invoke")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn mcp_initialize_then_tools_list_over_streamable_http() {
    let app = app();

    let init_body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "test-client", "version": "0.0.0"},
        },
    });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mcp")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(init_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let session_id = response
        .headers()
        .get("mcp-session-id")
        .expect("initialize mints a session id")
        .to_str()
        .unwrap()
        .to_string();
    let init_result = body_json(response).await;
    assert_eq!(init_result["result"]["protocolVersion"], "2025-03-26");

    let list_body = json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"});
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mcp")
                .header(header::CONTENT_TYPE, "application/json")
                .header("mcp-session-id", session_id)
                .body(Body::from(list_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let list_result = body_json(response).await;
    assert!(list_result["result"]["tools"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn mcp_rejects_unsupported_protocol_version_header() {
    let body = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mcp")
                .header(header::CONTENT_TYPE, "application/json")
                .header("mcp-protocol-version", "1999-01-01")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert_eq!(error["error"]["data"], "invalid protocol version: 1999-01-01");
}
