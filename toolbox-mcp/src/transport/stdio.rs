//! stdio transport: newline-delimited JSON-RPC on the gateway's own
//! standard in/out, a single session, shutdown on EOF (§4.9).

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

use crate::engine::Engine;
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::session::SessionManager;

/// Runs the stdio transport to completion (until stdin EOF).
pub async fn serve(engine: Arc<Engine>, toolset: &str) -> std::io::Result<()> {
    let sessions = SessionManager::new();
    let (session, _events, _close) = sessions.create().await;

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin).lines();
    let mut writer = BufWriter::new(tokio::io::stdout());

    while let Some(line) = reader.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(value) if value.is_array() => Some(JsonRpcResponse::error(
                JsonRpcError::new(-32600, "not supporting batch requests", None),
                None,
            )),
            Ok(value) => match serde_json::from_value::<JsonRpcRequest>(value) {
                Ok(request) => {
                    engine
                        .dispatch(&session, toolset, &http::HeaderMap::new(), request)
                        .await
                }
                Err(e) => Some(JsonRpcResponse::error(JsonRpcError::invalid_request(e.to_string()), None)),
            },
            Err(e) => Some(JsonRpcResponse::error(JsonRpcError::parse_error(e.to_string()), None)),
        };

        if let Some(response) = response {
            let text = serde_json::to_string(&response)?;
            writer.write_all(text.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }

    Ok(())
}
