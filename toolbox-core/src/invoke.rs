//! Invocation Engine (C6): the single pipeline used by both the REST and
//! MCP entry points. See spec §4.6 for the seven-step contract.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::error::ToolboxError;
use crate::model::{InvokeContext, InvokeOutcome, ResourceTuple};
use crate::param::VerifiedClaims;

/// The outcome of a completed invocation. `InvokeFailed` is a driver-level
/// error: it is *not* a protocol error. REST turns it into HTTP 400; MCP
/// embeds it in `CallToolResult.isError` rather than a JSON-RPC error
/// (spec §4.6 step 7, §7 `InvokeError`).
pub enum Outcome {
    Success(InvokeOutcome),
    InvokeFailed(String),
}

/// Runs steps 1-7 against the given resource snapshot. Callers (REST router,
/// MCP `tools/call` handler) supply the inbound headers, the raw JSON body,
/// and an `InvokeContext` carrying the request's deadline/cancellation.
pub async fn invoke(
    tuple: &ResourceTuple,
    tool_name: &str,
    headers: &http::HeaderMap,
    raw_inputs: &serde_json::Map<String, Value>,
    ctx: InvokeContext,
) -> Result<Outcome, ToolboxError> {
    // 1. Resolve tool.
    let tool = tuple.tool(tool_name)?;

    // 2. Extract claims. Per-service verification errors are logged and
    // treated as "not present" rather than surfaced.
    let (verified_services, claims) = extract_claims(tuple, headers).await;

    // 3. Authorize.
    if !tool.authorized(&verified_services) {
        return Err(ToolboxError::Unauthorized(format!(
            "tool {tool_name:?} requires one of {:?}",
            tool.auth_required()
        )));
    }

    // 4. Parse parameters (also performs step 5's namespace split).
    let (params, template_params) = tool.parse_params(raw_inputs, &claims)?;

    // 6. Invoke.
    match tool.invoke(ctx, params, template_params).await {
        Ok(outcome) => Ok(Outcome::Success(outcome)),
        Err(ToolboxError::InvokeError(message)) => Ok(Outcome::InvokeFailed(message)),
        Err(other) => Err(other),
    }
}

async fn extract_claims(
    tuple: &ResourceTuple,
    headers: &http::HeaderMap,
) -> (HashSet<String>, VerifiedClaims) {
    let mut verified_services = HashSet::new();
    let mut claims: VerifiedClaims = HashMap::new();

    for (name, service) in tuple.auth_services.iter() {
        match service.claims_from_request(headers).await {
            Ok(Some(service_claims)) => {
                verified_services.insert(name.clone());
                claims.insert(name.clone(), service_claims);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(service = %name, error = %err, "auth service verification failed; treating as not verified");
            }
        }
    }

    (verified_services, claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tool;
    use crate::param::{ParamValues, Parameter};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoTool {
        auth_required: Vec<String>,
        fail: bool,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn kind(&self) -> &str {
            "test"
        }
        fn description(&self) -> &str {
            "echoes back"
        }
        fn source_name(&self) -> &str {
            ""
        }
        fn parameters(&self) -> &[Parameter] {
            &[]
        }
        fn template_parameters(&self) -> &[Parameter] {
            &[]
        }
        fn auth_required(&self) -> &[String] {
            &self.auth_required
        }

        async fn invoke(
            &self,
            _ctx: InvokeContext,
            _params: ParamValues,
            _template_params: ParamValues,
        ) -> Result<InvokeOutcome, ToolboxError> {
            if self.fail {
                Err(ToolboxError::InvokeError("boom".to_string()))
            } else {
                Ok(InvokeOutcome::Scalar(serde_json::json!("ok")))
            }
        }
    }

    fn ctx() -> InvokeContext {
        let (_tx, rx) = tokio::sync::watch::channel(false);
        InvokeContext::new(None, rx)
    }

    fn tuple_with(tool: EchoTool) -> ResourceTuple {
        let mut tools = HashMap::new();
        tools.insert("echo".to_string(), Arc::new(tool) as Arc<dyn Tool>);
        ResourceTuple {
            tools,
            ..ResourceTuple::default()
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_tool_not_found() {
        let tuple = ResourceTuple::default();
        let result = invoke(&tuple, "missing", &http::HeaderMap::new(), &serde_json::Map::new(), ctx()).await;
        assert!(matches!(result, Err(ToolboxError::ToolNotFound(_))));
    }

    #[tokio::test]
    async fn auth_required_without_claims_is_unauthorized() {
        let tuple = tuple_with(EchoTool { auth_required: vec!["google".to_string()], fail: false });
        let result = invoke(&tuple, "echo", &http::HeaderMap::new(), &serde_json::Map::new(), ctx()).await;
        assert!(matches!(result, Err(ToolboxError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn successful_invocation_returns_scalar_outcome() {
        let tuple = tuple_with(EchoTool { auth_required: vec![], fail: false });
        let result = invoke(&tuple, "echo", &http::HeaderMap::new(), &serde_json::Map::new(), ctx())
            .await
            .unwrap();
        match result {
            Outcome::Success(InvokeOutcome::Scalar(v)) => assert_eq!(v, serde_json::json!("ok")),
            _ => panic!("expected a scalar success outcome"),
        }
    }

    #[tokio::test]
    async fn driver_invoke_error_becomes_invoke_failed_not_a_protocol_error() {
        let tuple = tuple_with(EchoTool { auth_required: vec![], fail: true });
        let result = invoke(&tuple, "echo", &http::HeaderMap::new(), &serde_json::Map::new(), ctx())
            .await
            .unwrap();
        assert!(matches!(result, Outcome::InvokeFailed(message) if message == "boom"));
    }
}
