//! Legacy SSE transport (pre-2025-03-26 compatibility): GET opens an event
//! stream and advertises a session-scoped POST endpoint; subsequent POSTs
//! are processed by the engine and their response is delivered as a
//! `message` SSE event rather than in the POST's own HTTP response (§4.9).

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::Value;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use toolbox_core::DEFAULT_TOOLSET;

use crate::engine::Engine;
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::session::{Session, SessionManager};

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    sessions: Arc<SessionManager>,
}

pub fn router(engine: Arc<Engine>, sessions: Arc<SessionManager>) -> Router {
    let state = AppState { engine, sessions };
    Router::new()
        .route("/sse", get(open_stream))
        .route("/sse/message", post(post_message))
        .with_state(state)
}

#[derive(Deserialize)]
struct SessionIdQuery {
    #[serde(rename = "sessionId")]
    session_id: String,
}

async fn open_stream(State(state): State<AppState>) -> impl IntoResponse {
    let (session, events_rx, _close_rx) = state.sessions.create().await;
    let endpoint = format!("/sse/message?sessionId={}", session.id);

    let endpoint_event = futures_util::stream::once(async move {
        Ok::<_, Infallible>(Event::default().event("endpoint").data(endpoint))
    });

    // Ends once the session's sender side is dropped (session removed from
    // the table and its last handle goes away), closing the client stream.
    let message_events =
        ReceiverStream::new(events_rx).map(|body| Ok::<_, Infallible>(Event::default().event("message").data(body)));

    let stream = endpoint_event.chain(message_events);
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(30)))
}

async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<SessionIdQuery>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let Some(session) = state.sessions.get(&query.session_id).await else {
        return (StatusCode::BAD_REQUEST, "unknown session id").into_response();
    };

    let parsed: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => return accept_and_enqueue_error(&session, JsonRpcError::parse_error(e.to_string())),
    };
    if parsed.is_array() {
        return accept_and_enqueue_error(&session, JsonRpcError::new(-32600, "not supporting batch requests", None));
    }
    let request: JsonRpcRequest = match serde_json::from_value(parsed) {
        Ok(req) => req,
        Err(e) => return accept_and_enqueue_error(&session, JsonRpcError::invalid_request(e.to_string())),
    };

    if let Some(response) = state.engine.dispatch(&session, DEFAULT_TOOLSET, &headers, request).await {
        if let Ok(text) = serde_json::to_string(&response) {
            session.enqueue_event(text);
        }
    }

    StatusCode::ACCEPTED.into_response()
}

fn accept_and_enqueue_error(session: &Session, error: JsonRpcError) -> Response {
    let response = JsonRpcResponse::error(error, None);
    if let Ok(text) = serde_json::to_string(&response) {
        session.enqueue_event(text);
    }
    StatusCode::ACCEPTED.into_response()
}
