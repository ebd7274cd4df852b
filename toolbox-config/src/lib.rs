//! YAML configuration loading for the toolbox gateway: two-pass kind
//! dispatch, `${VAR}` environment substitution, multi-file merge, and
//! materialization through the Plugin Registry (§4.4).

pub mod error;
pub mod loader;

pub use error::{ConfigError, ConfigResult};
pub use loader::{decode_pass1, materialize, substitute_env, ConfigLoader, RawConfig, RawEntry};
