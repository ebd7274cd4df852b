//! Streamable HTTP transport (post-2025-03-26): one JSON-RPC round-trip per
//! POST, no server-initiated streaming (§4.9).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

use toolbox_core::DEFAULT_TOOLSET;

use crate::engine::Engine;
use crate::protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, SUPPORTED_PROTOCOL_VERSIONS, VERSION_REQUIRING_PROTOCOL_HEADER,
};
use crate::session::SessionManager;
use crate::transport::{PROTOCOL_VERSION_HEADER, SESSION_ID_HEADER};

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    sessions: Arc<SessionManager>,
}

pub fn router(engine: Arc<Engine>, sessions: Arc<SessionManager>) -> Router {
    let state = AppState { engine, sessions };
    Router::new()
        .route("/mcp", post(post_root).get(get_not_supported).delete(delete_root))
        .route(
            "/mcp/{toolset}",
            post(post_toolset).get(get_not_supported).delete(delete_root),
        )
        .with_state(state)
}

async fn get_not_supported() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        "toolbox does not support streaming in streamable HTTP transport",
    )
}

async fn delete_root(State(state): State<AppState>, headers: HeaderMap) -> Response {
    handle_delete(&state, &headers).await
}

async fn post_root(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    handle_post(&state, DEFAULT_TOOLSET, &headers, body).await
}

async fn post_toolset(
    State(state): State<AppState>,
    Path(toolset): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    handle_post(&state, &toolset, &headers, body).await
}

async fn handle_delete(state: &AppState, headers: &HeaderMap) -> Response {
    let Some(session_id) = header_str(headers, SESSION_ID_HEADER) else {
        return (StatusCode::BAD_REQUEST, "missing session id").into_response();
    };
    state.sessions.remove(session_id).await;
    StatusCode::NO_CONTENT.into_response()
}

async fn handle_post(state: &AppState, toolset: &str, headers: &HeaderMap, body: String) -> Response {
    let parsed: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => return rpc_error_response(StatusCode::BAD_REQUEST, JsonRpcError::parse_error(e.to_string()), None),
    };

    if parsed.is_array() {
        return rpc_error_response(
            StatusCode::BAD_REQUEST,
            JsonRpcError::new(-32600, "not supporting batch requests", None),
            None,
        );
    }

    let request: JsonRpcRequest = match serde_json::from_value(parsed) {
        Ok(req) => req,
        Err(e) => return rpc_error_response(StatusCode::BAD_REQUEST, JsonRpcError::invalid_request(e.to_string()), None),
    };

    let session_id = header_str(headers, SESSION_ID_HEADER);
    let (session, minted) = match session_id {
        Some(id) => match state.sessions.get(id).await {
            Some(session) => (session, false),
            None => {
                return rpc_error_response(StatusCode::BAD_REQUEST, JsonRpcError::invalid_request("unknown session id"), request.id)
            }
        },
        None => {
            let (session, _events, _close) = state.sessions.create().await;
            (session, true)
        }
    };

    let negotiated = session.protocol_version().await;
    match header_str(headers, PROTOCOL_VERSION_HEADER) {
        Some(header_version) => {
            if !SUPPORTED_PROTOCOL_VERSIONS.contains(&header_version) {
                return rpc_error_response(
                    StatusCode::BAD_REQUEST,
                    JsonRpcError::invalid_request(format!("invalid protocol version: {header_version}")),
                    request.id,
                );
            }
        }
        None => {
            // The header becomes required once the session has negotiated the
            // newest revision (§4.8).
            if negotiated.as_deref() == Some(VERSION_REQUIRING_PROTOCOL_HEADER) {
                return rpc_error_response(
                    StatusCode::BAD_REQUEST,
                    JsonRpcError::invalid_request(format!("missing required header: {PROTOCOL_VERSION_HEADER}")),
                    request.id,
                );
            }
        }
    }

    let response = state.engine.dispatch(&session, toolset, headers, request).await;

    let mut http_response = match response {
        Some(rpc_response) => Json(rpc_response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    };

    if minted {
        if let Ok(value) = HeaderValue::from_str(&session.id) {
            http_response.headers_mut().insert(SESSION_ID_HEADER, value);
        }
    }

    http_response
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn rpc_error_response(status: StatusCode, error: JsonRpcError, id: Option<Value>) -> Response {
    (status, Json(JsonRpcResponse::error(error, id))).into_response()
}
