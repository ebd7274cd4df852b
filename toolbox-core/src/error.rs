//! Error taxonomy shared by the config loader, invocation engine, REST
//! router, and MCP protocol engine.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result type alias used across the gateway.
pub type ToolboxResult<T> = Result<T, ToolboxError>;

/// The abstract error kinds from the error-handling design: one variant per
/// kind, not per call site.
#[derive(Debug, Error, Clone)]
pub enum ToolboxError {
    #[error("config error: {0}")]
    Config(String),

    #[error("config conflict: {0}")]
    ConfigConflict(String),

    #[error("source init failed: {0}")]
    SourceInit(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("bad param: {0}")]
    BadParam(String),

    #[error("auth verifier error: {0}")]
    AuthFail(String),

    #[error("invoke error: {0}")]
    InvokeError(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),
}

impl ToolboxError {
    /// HTTP status code for the REST router, per spec §7.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ToolboxError::ToolNotFound(_) => StatusCode::NOT_FOUND,
            ToolboxError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ToolboxError::BadParam(_) => StatusCode::BAD_REQUEST,
            ToolboxError::InvokeError(_) => StatusCode::BAD_REQUEST,
            ToolboxError::Config(_) | ToolboxError::ConfigConflict(_) => StatusCode::BAD_REQUEST,
            ToolboxError::SourceInit(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ToolboxError::AuthFail(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ToolboxError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ToolboxError::ProtocolError(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// JSON-RPC error code for the MCP protocol engine, per spec §7's table.
    /// Deliberately distinct from axum-mcp's own `McpError::error_code()`.
    pub fn jsonrpc_code(&self) -> i32 {
        match self {
            ToolboxError::ToolNotFound(_) => -32602,
            ToolboxError::Unauthorized(_) => -32600,
            ToolboxError::BadParam(_) => -32602,
            ToolboxError::InternalError(_) => -32603,
            ToolboxError::ProtocolError(_) => -32700,
            // Reached only if an invoke/source/config error somehow surfaces
            // as a protocol-level error rather than an embedded result.
            _ => -32603,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Serialize)]
struct RestErrorEnvelope {
    status: String,
    error: String,
}

impl IntoResponse for ToolboxError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = RestErrorEnvelope {
            status: status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            error: self.message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for ToolboxError {
    fn from(err: serde_json::Error) -> Self {
        ToolboxError::InternalError(format!("serialization error: {err}"))
    }
}

impl From<std::io::Error> for ToolboxError {
    fn from(err: std::io::Error) -> Self {
        ToolboxError::InternalError(format!("I/O error: {err}"))
    }
}
