//! `http` source and tool kind: a named base URL + client, and a tool that
//! issues one HTTP request per invocation with parameters bound into the
//! query string.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use toolbox_core::registry::{SourceConstructor, ToolConstructor};
use toolbox_core::{InvokeContext, InvokeOutcome, ParamValues, Parameter, Source, Tool, ToolboxError};

pub struct HttpSource {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl Source for HttpSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "http"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HttpSourceConfig {
    kind: String,
    #[serde(rename = "baseUrl")]
    base_url: String,
}

pub struct HttpSourceConstructor;

#[async_trait]
impl SourceConstructor for HttpSourceConstructor {
    async fn construct(&self, name: &str, raw: &Value) -> Result<Arc<dyn Source>, ToolboxError> {
        let config: HttpSourceConfig = serde_json::from_value(raw.clone())
            .map_err(|e| ToolboxError::Config(format!("source {name:?}: {e}")))?;
        let _ = &config.kind;
        url::Url::parse(&config.base_url)
            .map_err(|e| ToolboxError::SourceInit(format!("{name}: invalid baseUrl: {e}")))?;

        Ok(Arc::new(HttpSource {
            name: name.to_string(),
            base_url: config.base_url,
            client: reqwest::Client::new(),
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HttpToolConfig {
    kind: String,
    source: String,
    #[serde(default)]
    description: String,
    path: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    parameters: Vec<Parameter>,
    #[serde(default, rename = "templateParameters")]
    template_parameters: Vec<Parameter>,
    #[serde(default, rename = "authRequired")]
    auth_required: Vec<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

pub struct HttpTool {
    name: String,
    description: String,
    source_name: String,
    path: String,
    method: String,
    parameters: Vec<Parameter>,
    template_parameters: Vec<Parameter>,
    auth_required: Vec<String>,
    base_url: String,
    client: reqwest::Client,
}

#[async_trait]
impl Tool for HttpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "http"
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn source_name(&self) -> &str {
        &self.source_name
    }

    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn template_parameters(&self) -> &[Parameter] {
        &self.template_parameters
    }

    fn auth_required(&self) -> &[String] {
        &self.auth_required
    }

    async fn invoke(
        &self,
        _ctx: InvokeContext,
        params: ParamValues,
        template_params: ParamValues,
    ) -> Result<InvokeOutcome, ToolboxError> {
        let mut path = self.path.clone();
        for (name, value) in template_params.as_slice() {
            path = path.replace(&format!("{{{{{name}}}}}"), &value.to_string());
        }
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);

        let method = reqwest::Method::from_bytes(self.method.as_bytes())
            .map_err(|e| ToolboxError::InternalError(e.to_string()))?;
        let mut request = self.client.request(method, &url);
        for (name, value) in params.as_slice() {
            request = request.query(&[(name.as_str(), value_as_query_string(value))]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolboxError::InvokeError(e.to_string()))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .unwrap_or(Value::String(String::new()));

        if !status.is_success() {
            return Err(ToolboxError::InvokeError(format!(
                "http {status}: {body}"
            )));
        }

        Ok(InvokeOutcome::Scalar(body))
    }
}

fn value_as_query_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct HttpToolConstructor;

#[async_trait]
impl ToolConstructor for HttpToolConstructor {
    async fn construct(
        &self,
        name: &str,
        raw: &Value,
        sources: &HashMap<String, Arc<dyn Source>>,
    ) -> Result<Arc<dyn Tool>, ToolboxError> {
        let config: HttpToolConfig = serde_json::from_value(raw.clone())
            .map_err(|e| ToolboxError::Config(format!("tool {name:?}: {e}")))?;
        let _ = &config.kind;

        let source = sources
            .get(&config.source)
            .ok_or_else(|| ToolboxError::Config(format!("tool {name:?}: unknown source {:?}", config.source)))?;
        let http_source = source
            .as_any()
            .downcast_ref::<HttpSource>()
            .ok_or_else(|| {
                ToolboxError::Config(format!(
                    "tool {name:?}: source {:?} is kind {:?}, expected http",
                    config.source,
                    source.kind()
                ))
            })?;

        Ok(Arc::new(HttpTool {
            name: name.to_string(),
            description: config.description,
            source_name: config.source,
            path: config.path,
            method: config.method,
            parameters: config.parameters,
            template_parameters: config.template_parameters,
            auth_required: config.auth_required,
            base_url: http_source.base_url.clone(),
            client: http_source.client.clone(),
        }))
    }
}
