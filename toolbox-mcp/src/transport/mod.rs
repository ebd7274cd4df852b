//! MCP Transports (C9): Streamable HTTP, legacy SSE, and stdio. All three
//! converge on the shared `Engine`.

pub mod sse;
pub mod stdio;
pub mod streamable_http;

pub const SESSION_ID_HEADER: &str = "mcp-session-id";
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";
