//! MCP Protocol Engine (C8): dispatches JSON-RPC requests against a session
//! and the live resource tuple. Shared by every transport.

use std::sync::Arc;

use serde_json::{json, Value};
use toolbox_core::invoke::{self, Outcome};
use toolbox_core::{InvokeContext, ResourceManager};

use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, SUPPORTED_PROTOCOL_VERSIONS};
use crate::session::{Session, SessionState};

pub struct Engine {
    resources: Arc<ResourceManager>,
}

impl Engine {
    pub fn new(resources: Arc<ResourceManager>) -> Self {
        Self { resources }
    }

    /// Dispatches one already-deserialized JSON-RPC request. Returns `None`
    /// for notifications, which never receive a response (spec §4.8).
    pub async fn dispatch(
        &self,
        session: &Session,
        toolset: &str,
        headers: &http::HeaderMap,
        request: JsonRpcRequest,
    ) -> Option<JsonRpcResponse> {
        session.touch().await;

        let is_notification = request.is_notification();
        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(session, &request.params).await,
            "notifications/initialized" => {
                session.mark_ready().await;
                return None;
            }
            "tools/list" => self.handle_tools_list(session, toolset).await,
            "tools/call" => self.handle_tools_call(session, headers, &request.params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        if is_notification {
            return None;
        }

        Some(match result {
            Ok(value) => JsonRpcResponse::success(value, request.id),
            Err(error) => JsonRpcResponse::error(error, request.id),
        })
    }

    async fn handle_initialize(&self, session: &Session, params: &Option<Value>) -> Result<Value, JsonRpcError> {
        let requested = params
            .as_ref()
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::invalid_params("missing protocolVersion"))?;

        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&requested) {
            return Err(JsonRpcError::invalid_params(format!(
                "unsupported protocolVersion {requested:?}; supported: {SUPPORTED_PROTOCOL_VERSIONS:?}"
            )));
        }
        session.set_protocol_version(requested).await;

        Ok(json!({
            "protocolVersion": requested,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": { "name": "Toolbox", "version": env!("CARGO_PKG_VERSION") },
        }))
    }

    async fn handle_tools_list(&self, session: &Session, toolset: &str) -> Result<Value, JsonRpcError> {
        // `tools/list` is allowed in both Active and Ready (spec §9's Open
        // Question resolved in favor of the more permissive reading).
        if session.state().await == SessionState::Closed {
            return Err(JsonRpcError::invalid_request("session is closed"));
        }
        let tuple = self.resources.current().await;
        tuple
            .mcp_toolset_manifest(toolset)
            .map_err(|e| JsonRpcError::invalid_params(e.to_string()))
    }

    async fn handle_tools_call(
        &self,
        session: &Session,
        headers: &http::HeaderMap,
        params: &Option<Value>,
    ) -> Result<Value, JsonRpcError> {
        if session.state().await != SessionState::Ready {
            return Err(JsonRpcError::invalid_request("tools/call requires an initialized session"));
        }

        let params = params.as_ref().ok_or_else(|| JsonRpcError::invalid_params("missing params"))?;
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::invalid_params("missing tool name"))?;
        let arguments = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => serde_json::Map::new(),
            Some(_) => return Err(JsonRpcError::invalid_params("arguments must be an object")),
        };

        let tuple = self.resources.current().await;
        let (close_tx, close_rx) = tokio::sync::watch::channel(false);
        let _keep_alive = close_tx;
        let ctx = InvokeContext::new(None, close_rx);

        match invoke::invoke(&tuple, name, headers, &arguments, ctx).await {
            Ok(Outcome::Success(outcome)) => Ok(json!({
                "content": outcome.to_text_blocks().into_iter().map(|text| json!({"type": "text", "text": text})).collect::<Vec<_>>(),
                "isError": false,
            })),
            Ok(Outcome::InvokeFailed(message)) => Ok(json!({
                "content": [{"type": "text", "text": message}],
                "isError": true,
            })),
            Err(err) => Err(JsonRpcError::new(err.jsonrpc_code(), err.to_string(), None)),
        }
    }
}
