//! Configuration error types

use thiserror::Error;

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading configuration file
    #[error("failed to read config file {path}: {source}")]
    FileReadError { path: String, source: std::io::Error },

    /// YAML parsing error
    #[error("failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Unknown `kind` for a source/authService/tool entry.
    #[error("unknown {category} kind {kind:?} for entry {name:?}")]
    UnknownKind {
        category: String,
        kind: String,
        name: String,
    },

    /// Strict decoding rejected an unrecognized field.
    #[error("invalid configuration for {name:?}: {message}")]
    ValidationError { name: String, message: String },

    /// Duplicate name across merged files, within one category.
    #[error("duplicate {category} name {name:?} across merged configuration files")]
    ConfigConflict { category: String, name: String },

    /// Dial/ping failure while materializing a source.
    #[error("failed to initialize source {name:?}: {message}")]
    SourceInit { name: String, message: String },
}

impl From<toolbox_core::ToolboxError> for ConfigError {
    fn from(err: toolbox_core::ToolboxError) -> Self {
        ConfigError::ValidationError {
            name: "<materialization>".to_string(),
            message: err.to_string(),
        }
    }
}
