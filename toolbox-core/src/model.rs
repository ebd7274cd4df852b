//! The data model: Source, AuthService, and Tool contracts (§4.3), Toolset,
//! and the atomically-swapped ResourceTuple (§3).

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolboxError;
use crate::param::{Parameter, ParamValues, VerifiedClaims};

/// A named connection/handle to an external system. Tools obtain their
/// typed handle via `as_any().downcast_ref`, mirroring a capability check
/// against the source's declared kind; a mismatch is a startup error raised
/// by the tool constructor, not by this trait.
pub trait Source: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
}

/// A named verifier of bearer-token-style credentials.
///
/// A missing authentication input returns `Ok(None)` — the caller proceeds
/// unauthenticated. An invalid/expired credential returns `Err`, which the
/// invocation engine logs and treats as "not present" rather than a request
/// failure, unless a later authorization step requires it.
#[async_trait]
pub trait AuthService: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> &str;

    async fn claims_from_request(
        &self,
        headers: &http::HeaderMap,
    ) -> Result<Option<HashMap<String, Value>>, ToolboxError>;
}

/// Cancellation/timeout carried from the inbound request into `Tool::invoke`
/// and from there into the source driver.
#[derive(Clone)]
pub struct InvokeContext {
    pub deadline: Option<std::time::Instant>,
    cancelled: tokio::sync::watch::Receiver<bool>,
}

impl InvokeContext {
    pub fn new(deadline: Option<std::time::Instant>, cancelled: tokio::sync::watch::Receiver<bool>) -> Self {
        Self { deadline, cancelled }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Resolves once either the deadline elapses or cancellation fires,
    /// whichever happens first. Drivers poll this alongside their own I/O.
    pub async fn cancelled(&mut self) {
        let wait_cancel = self.cancelled.changed();
        match self.deadline {
            Some(deadline) => {
                let timeout = deadline.saturating_duration_since(std::time::Instant::now());
                tokio::select! {
                    _ = tokio::time::sleep(timeout) => {}
                    _ = wait_cancel => {}
                }
            }
            None => {
                let _ = wait_cancel.await;
            }
        }
    }
}

/// Drivers return heterogeneous shapes; the engine normalizes at the edge
/// (§4.6 step 7, §9 "Result shape variability").
#[derive(Debug, Clone)]
pub enum InvokeOutcome {
    Null,
    Scalar(Value),
    Rows(Vec<Value>),
}

impl InvokeOutcome {
    /// Single JSON value for the REST response envelope.
    pub fn to_json(&self) -> Value {
        match self {
            InvokeOutcome::Null => Value::Null,
            InvokeOutcome::Scalar(v) => v.clone(),
            InvokeOutcome::Rows(rows) => Value::Array(rows.clone()),
        }
    }

    /// One block per row for MCP; a single block otherwise.
    pub fn to_text_blocks(&self) -> Vec<String> {
        match self {
            InvokeOutcome::Null => vec!["null".to_string()],
            InvokeOutcome::Scalar(v) => vec![v.to_string()],
            InvokeOutcome::Rows(rows) => rows.iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// A named, parameterized operation over a source (§3).
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> &str;
    fn description(&self) -> &str;
    fn source_name(&self) -> &str;

    /// Runtime-supplied inputs.
    fn parameters(&self) -> &[Parameter];

    /// Inputs spliced into the statement template before binding; a
    /// separate namespace from `parameters` (§3, §9).
    fn template_parameters(&self) -> &[Parameter];

    /// Non-empty means the caller must present verified claims from at
    /// least one listed service.
    fn auth_required(&self) -> &[String];

    /// REST discovery manifest: description + parameter list.
    fn manifest(&self) -> Value {
        serde_json::json!({
            "name": self.name(),
            "description": self.description(),
            "parameters": self.parameters().iter().map(Parameter::manifest_projection).collect::<Vec<_>>(),
        })
    }

    /// MCP discovery manifest: name + description + JSON input schema.
    fn mcp_manifest(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for p in self.parameters() {
            properties.insert(p.name.clone(), p.json_schema_projection());
            if p.required {
                required.push(p.name.clone());
            }
        }
        serde_json::json!({
            "name": self.name(),
            "description": self.description(),
            "inputSchema": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        })
    }

    fn authorized(&self, verified_services: &HashSet<String>) -> bool {
        let required = self.auth_required();
        required.is_empty() || required.iter().any(|s| verified_services.contains(s))
    }

    /// Parse raw inputs against this tool's declared parameters and
    /// template parameters (two disjoint namespaces over one flat body).
    fn parse_params(
        &self,
        raw: &serde_json::Map<String, Value>,
        claims: &VerifiedClaims,
    ) -> Result<(ParamValues, ParamValues), ToolboxError> {
        crate::param::parse_param_groups(self.parameters(), self.template_parameters(), raw, claims)
    }

    /// `template_params` are spliced into the statement shape (identifier
    /// quoting, list expansion); `params` bind positionally against the
    /// resulting statement using driver-native placeholders (§4.6 step 5).
    async fn invoke(
        &self,
        ctx: InvokeContext,
        params: ParamValues,
        template_params: ParamValues,
    ) -> Result<InvokeOutcome, ToolboxError>;
}

/// A named, ordered collection of tool names. The distinguished default
/// toolset (empty-string name) always contains every tool.
#[derive(Debug, Clone)]
pub struct Toolset {
    pub name: String,
    pub tool_names: Vec<String>,
}

pub const DEFAULT_TOOLSET: &str = "";

/// The atomically-swapped `{sources, authServices, tools, toolsets}` tuple
/// (§3). Replaced as a unit by the Resource Manager; no reader ever
/// observes a partial swap.
#[derive(Clone, Default)]
pub struct ResourceTuple {
    pub sources: HashMap<String, Arc<dyn Source>>,
    pub auth_services: HashMap<String, Arc<dyn AuthService>>,
    pub tools: HashMap<String, Arc<dyn Tool>>,
    pub toolsets: HashMap<String, Toolset>,
}

impl ResourceTuple {
    pub fn tool(&self, name: &str) -> Result<Arc<dyn Tool>, ToolboxError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolboxError::ToolNotFound(name.to_string()))
    }

    pub fn toolset_manifest(&self, name: &str) -> Result<Value, ToolboxError> {
        let toolset = self
            .toolsets
            .get(name)
            .ok_or_else(|| ToolboxError::ToolNotFound(format!("toolset {name:?}")))?;
        let tools: Vec<Value> = toolset
            .tool_names
            .iter()
            .filter_map(|n| self.tools.get(n))
            .map(|t| t.manifest())
            .collect();
        Ok(serde_json::json!({ "tools": tools }))
    }

    pub fn mcp_toolset_manifest(&self, name: &str) -> Result<Value, ToolboxError> {
        let toolset = self
            .toolsets
            .get(name)
            .ok_or_else(|| ToolboxError::ToolNotFound(format!("toolset {name:?}")))?;
        let tools: Vec<Value> = toolset
            .tool_names
            .iter()
            .filter_map(|n| self.tools.get(n))
            .map(|t| t.mcp_manifest())
            .collect();
        Ok(serde_json::json!({ "tools": tools }))
    }
}
