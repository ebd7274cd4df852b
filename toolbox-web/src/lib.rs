//! REST Router (C7), Hot-Reload Coordinator (C10), and Server Lifecycle
//! (C11) for the toolbox gateway.

pub mod lifecycle;
pub mod reload;
pub mod router;

pub use reload::{spawn as spawn_reload, source_for_path, ConfigSource, ReloadHandle};
