//! Data model, plugin registry, resource manager, and invocation engine for
//! the toolbox gateway. This crate has no knowledge of YAML, HTTP, or MCP
//! wire formats; it defines the domain language everything else builds on.

pub mod error;
pub mod invoke;
pub mod model;
pub mod param;
pub mod registry;
pub mod resources;

pub use error::{ToolboxError, ToolboxResult};
pub use model::{AuthService, InvokeContext, InvokeOutcome, ResourceTuple, Source, Tool, Toolset, DEFAULT_TOOLSET};
pub use param::{ParamValues, Parameter, ParamType, VerifiedClaims};
pub use registry::{global as registry, Registry};
pub use resources::ResourceManager;
