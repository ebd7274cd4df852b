//! Built-in source and tool kind plugins: `postgres-sql` and `http`.
//!
//! Each kind self-registers its constructors against the process-wide
//! registry (§4.1, §9) so `toolbox-config` can dispatch to it by name
//! without knowing the concrete type.

pub mod http;
pub mod postgres;

use std::sync::Arc;

use toolbox_core::registry::Registry;

/// Registers every kind this crate provides. Call once at startup before
/// loading configuration.
pub fn register(registry: &Registry) {
    registry.register_source_kind("postgres-sql", Arc::new(postgres::PostgresSourceConstructor));
    registry.register_tool_kind("postgres-sql", Arc::new(postgres::PostgresToolConstructor));

    registry.register_source_kind("http", Arc::new(http::HttpSourceConstructor));
    registry.register_tool_kind("http", Arc::new(http::HttpToolConstructor));
}
