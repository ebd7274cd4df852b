//! `postgres-sql` source and tool kind: a named connection pool and
//! parameterized-statement tool backed by `sqlx::PgPool`.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row, TypeInfo};
use toolbox_core::registry::{SourceConstructor, ToolConstructor};
use toolbox_core::{InvokeContext, InvokeOutcome, ParamValues, Parameter, Source, Tool, ToolboxError};

pub struct PostgresSource {
    name: String,
    pool: PgPool,
}

impl Source for PostgresSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "postgres-sql"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PostgresSourceConfig {
    kind: String,
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    database: String,
    user: String,
    #[serde(default)]
    password: String,
}

fn default_port() -> u16 {
    5432
}

pub struct PostgresSourceConstructor;

#[async_trait]
impl SourceConstructor for PostgresSourceConstructor {
    async fn construct(&self, name: &str, raw: &Value) -> Result<Arc<dyn Source>, ToolboxError> {
        let config: PostgresSourceConfig = serde_json::from_value(raw.clone())
            .map_err(|e| ToolboxError::Config(format!("source {name:?}: {e}")))?;
        let _ = &config.kind;

        let url = format!(
            "postgres://{}:{}@{}:{}/{}",
            config.user, config.password, config.host, config.port, config.database
        );
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&url)
            .await
            .map_err(|e| ToolboxError::SourceInit(format!("{name}: {e}")))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| ToolboxError::SourceInit(format!("{name}: ping failed: {e}")))?;

        Ok(Arc::new(PostgresSource {
            name: name.to_string(),
            pool,
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PostgresToolConfig {
    kind: String,
    source: String,
    #[serde(default)]
    description: String,
    statement: String,
    #[serde(default)]
    parameters: Vec<Parameter>,
    #[serde(default, rename = "templateParameters")]
    template_parameters: Vec<Parameter>,
    #[serde(default, rename = "authRequired")]
    auth_required: Vec<String>,
}

pub struct PostgresSqlTool {
    name: String,
    description: String,
    source_name: String,
    statement: String,
    parameters: Vec<Parameter>,
    template_parameters: Vec<Parameter>,
    auth_required: Vec<String>,
    pool: PgPool,
}

#[async_trait]
impl Tool for PostgresSqlTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "postgres-sql"
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
        let statement = expand_template(&self.statement, &template_params);

        let mut query = sqlx::query(&statement);
        for (_, value) in params.as_slice() {
            query = bind_value(query, value);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ToolboxError::InvokeError(e.to_string()))?;

        let objects: Vec<Value> = rows.iter().map(row_to_json).collect();
        Ok(InvokeOutcome::Rows(objects))
    }
}

/// Splices template parameters into the statement text using `{{name}}`
/// placeholders with identifier-safe quoting (spec §4.6 step 5, §9).
fn expand_template(statement: &str, template_params: &ParamValues) -> String {
    let mut out = statement.to_string();
    for (name, value) in template_params.as_slice() {
        let placeholder = format!("{{{{{name}}}}}");
        let replacement = quote_template_value(value);
        out = out.replace(&placeholder, &replacement);
    }
    out
}

fn quote_template_value(value: &Value) -> String {
    match value {
        Value::String(s) => quote_identifier(s),
        Value::Array(items) => items
            .iter()
            .map(quote_template_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) if n.is_i64() => query.bind(n.as_i64().unwrap()),
        Value::Number(n) => query.bind(n.as_f64().unwrap_or_default()),
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

/// Decodes a Postgres row into a JSON object keyed by column name, matching
/// the common scalar types exercised by the gateway's tools.
fn row_to_json(row: &PgRow) -> Value {
    let mut map = serde_json::Map::new();
    for column in row.columns() {
        let name = column.name().to_string();
        let type_name = column.type_info().name();
        let value = match type_name {
            "INT2" | "INT4" | "INT8" => row
                .try_get::<i64, _>(column.ordinal())
                .map(|v| Value::Number(v.into()))
                .unwrap_or(Value::Null),
            "FLOAT4" | "FLOAT8" | "NUMERIC" => row
                .try_get::<f64, _>(column.ordinal())
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            "BOOL" => row
                .try_get::<bool, _>(column.ordinal())
                .map(Value::Bool)
                .unwrap_or(Value::Null),
            _ => row
                .try_get::<String, _>(column.ordinal())
                .map(Value::String)
                .unwrap_or(Value::Null),
        };
        map.insert(name, value);
    }
    Value::Object(map)
}

pub struct PostgresToolConstructor;

#[async_trait]
impl ToolConstructor for PostgresToolConstructor {
    async fn construct(
        &self,
        name: &str,
        raw: &Value,
        sources: &HashMap<String, Arc<dyn Source>>,
    ) -> Result<Arc<dyn Tool>, ToolboxError> {
        let config: PostgresToolConfig = serde_json::from_value(raw.clone())
            .map_err(|e| ToolboxError::Config(format!("tool {name:?}: {e}")))?;
        let _ = &config.kind;

        let source = sources
            .get(&config.source)
            .ok_or_else(|| ToolboxError::Config(format!("tool {name:?}: unknown source {:?}", config.source)))?;
        let pg_source = source
            .as_any()
            .downcast_ref::<PostgresSource>()
            .ok_or_else(|| {
                ToolboxError::Config(format!(
                    "tool {name:?}: source {:?} is kind {:?}, expected postgres-sql",
                    config.source,
                    source.kind()
                ))
            })?;

        Ok(Arc::new(PostgresSqlTool {
            name: name.to_string(),
            description: config.description,
            source_name: config.source,
            statement: config.statement,
            parameters: config.parameters,
            template_parameters: config.template_parameters,
            auth_required: config.auth_required,
            pool: pg_source.pool.clone(),
        }))
    }
}
