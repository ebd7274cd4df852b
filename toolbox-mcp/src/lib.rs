//! MCP Protocol Engine (C8) and Transports (C9): JSON-RPC dispatch, protocol
//! version negotiation, session lifecycle, and the Streamable HTTP, SSE, and
//! stdio transports that front it.

pub mod engine;
pub mod protocol;
pub mod session;
pub mod transport;

pub use engine::Engine;
pub use session::{Session, SessionManager, SessionState};
