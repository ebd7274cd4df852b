//! Built-in auth service kind plugins: `google`.

pub mod google;

use std::sync::Arc;

use toolbox_core::registry::Registry;

/// Registers every kind this crate provides. Call once at startup before
/// loading configuration.
pub fn register(registry: &Registry) {
    registry.register_auth_kind("google", Arc::new(google::GoogleAuthServiceConstructor));
}
