//! Typed parameter declarations, coercion, and the auth-binding resolution
//! that produces concrete `ParamValues` for a single invocation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolboxError;

/// One input slot's declared type. Array and map carry their element type
/// recursively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Float,
    Boolean,
    Array { item: Box<ParamType> },
    Map { value: Box<ParamType> },
}

/// A `(authService, claimField)` pair: when the named service is verified on
/// a request, the parameter's value is taken from that claim field instead
/// of the caller-supplied body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthBinding {
    pub service: String,
    pub claim_field: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(flatten)]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    /// Declaration order matters: first verified service wins when more
    /// than one binding matches (spec §9, Open Question resolved).
    #[serde(default, rename = "authBindings")]
    pub auth_bindings: Vec<AuthBinding>,
}

impl Parameter {
    /// Client-facing manifest projection for REST discovery.
    pub fn manifest_projection(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "type": param_type_name(&self.param_type),
            "required": self.required,
            "description": self.description,
        })
    }

    /// JSON-schema projection for MCP `inputSchema` properties.
    pub fn json_schema_projection(&self) -> Value {
        json_schema_for(&self.param_type)
    }

    /// Coerce a raw JSON value into this parameter's declared type.
    pub fn coerce(&self, raw: &Value) -> Result<Value, ToolboxError> {
        coerce_typed(&self.param_type, raw, &self.name)
    }
}

fn param_type_name(t: &ParamType) -> &'static str {
    match t {
        ParamType::String => "string",
        ParamType::Integer => "integer",
        ParamType::Float => "float",
        ParamType::Boolean => "boolean",
        ParamType::Array { .. } => "array",
        ParamType::Map { .. } => "map",
    }
}

fn json_schema_for(t: &ParamType) -> Value {
    match t {
        ParamType::String => serde_json::json!({"type": "string"}),
        ParamType::Integer => serde_json::json!({"type": "integer"}),
        ParamType::Float => serde_json::json!({"type": "number"}),
        ParamType::Boolean => serde_json::json!({"type": "boolean"}),
        ParamType::Array { item } => serde_json::json!({
            "type": "array",
            "items": json_schema_for(item),
        }),
        ParamType::Map { value } => serde_json::json!({
            "type": "object",
            "additionalProperties": json_schema_for(value),
        }),
    }
}

fn coerce_typed(t: &ParamType, raw: &Value, name: &str) -> Result<Value, ToolboxError> {
    match t {
        ParamType::Integer => coerce_integer(raw, name),
        ParamType::Float => coerce_float(raw, name),
        ParamType::Boolean => coerce_boolean(raw, name),
        ParamType::String => match raw {
            Value::String(_) => Ok(raw.clone()),
            other => Err(bad_param(name, format!("expected string, got {other}"))),
        },
        ParamType::Array { item } => match raw {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for element in items {
                    out.push(coerce_typed(item, element, name)?);
                }
                Ok(Value::Array(out))
            }
            other => Err(bad_param(name, format!("expected array, got {other}"))),
        },
        ParamType::Map { value } => match raw {
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), coerce_typed(value, v, name)?);
                }
                Ok(Value::Object(out))
            }
            other => Err(bad_param(name, format!("expected map, got {other}"))),
        },
    }
}

fn coerce_integer(raw: &Value, name: &str) -> Result<Value, ToolboxError> {
    match raw {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Number(i.into()))
            } else if n.as_u64().is_some() {
                Err(bad_param(name, format!("integer parameter overflows i64: {n}")))
            } else {
                Err(bad_param(name, format!("integer parameter has a fractional part: {n}")))
            }
        }
        Value::String(s) => s
            .parse::<i64>()
            .map(|i| Value::Number(i.into()))
            .map_err(|_| bad_param(name, format!("not a valid integer: {s:?}"))),
        other => Err(bad_param(name, format!("expected integer, got {other}"))),
    }
}

fn coerce_float(raw: &Value, name: &str) -> Result<Value, ToolboxError> {
    match raw {
        Value::Number(_) => Ok(raw.clone()),
        Value::String(s) => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| bad_param(name, format!("not a valid float: {s:?}"))),
        other => Err(bad_param(name, format!("expected float, got {other}"))),
    }
}

fn coerce_boolean(raw: &Value, name: &str) -> Result<Value, ToolboxError> {
    match raw {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::String(s) if s == "true" => Ok(Value::Bool(true)),
        Value::String(s) if s == "false" => Ok(Value::Bool(false)),
        other => Err(bad_param(name, format!("expected boolean, got {other}"))),
    }
}

fn bad_param(name: &str, detail: String) -> ToolboxError {
    ToolboxError::BadParam(format!("parameter {name:?}: {detail}"))
}

/// The resolved, ordered, keyed values for one invocation: declaration order
/// preserved (needed for positional SQL binding) plus a by-name view for
/// template expansion.
#[derive(Debug, Clone, Default)]
pub struct ParamValues {
    ordered: Vec<(String, Value)>,
}

impl ParamValues {
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.ordered.push((name.into(), value));
    }

    /// Name-keyed view, used by template expansion.
    pub fn as_map(&self) -> HashMap<String, Value> {
        self.ordered.iter().cloned().collect()
    }

    /// Declaration-ordered view, used for positional driver binding.
    pub fn as_slice(&self) -> &[(String, Value)] {
        &self.ordered
    }
}

/// Claims verified for the current request, keyed by auth service name.
pub type VerifiedClaims = HashMap<String, HashMap<String, Value>>;

/// Implements spec §4.2's `ParseParams`: auth-binding resolution, caller
/// value/default fallback, coercion, and extraneous-key rejection.
pub fn parse_params(
    decls: &[Parameter],
    raw_inputs: &serde_json::Map<String, Value>,
    verified_claims: &VerifiedClaims,
) -> Result<ParamValues, ToolboxError> {
    let mut consumed = std::collections::HashSet::new();
    let values = parse_group(decls, raw_inputs, verified_claims, &mut consumed)?;
    reject_extraneous(raw_inputs, &consumed)?;
    Ok(values)
}

/// Parses `parameters` and `templateParameters` against the same raw input
/// object (spec §3: two namespaces, one flat caller-supplied body), then
/// rejects any key consumed by neither group.
pub fn parse_param_groups(
    primary: &[Parameter],
    template: &[Parameter],
    raw_inputs: &serde_json::Map<String, Value>,
    verified_claims: &VerifiedClaims,
) -> Result<(ParamValues, ParamValues), ToolboxError> {
    let mut consumed = std::collections::HashSet::new();
    let primary_values = parse_group(primary, raw_inputs, verified_claims, &mut consumed)?;
    let template_values = parse_group(template, raw_inputs, verified_claims, &mut consumed)?;
    reject_extraneous(raw_inputs, &consumed)?;
    Ok((primary_values, template_values))
}

fn parse_group(
    decls: &[Parameter],
    raw_inputs: &serde_json::Map<String, Value>,
    verified_claims: &VerifiedClaims,
    consumed: &mut std::collections::HashSet<String>,
) -> Result<ParamValues, ToolboxError> {
    let mut values = ParamValues::default();

    for decl in decls {
        let bound = decl.auth_bindings.iter().find_map(|binding| {
            verified_claims
                .get(&binding.service)
                .and_then(|claims| claims.get(&binding.claim_field))
                .map(|value| value.clone())
        });

        let raw_value = if let Some(claim_value) = bound {
            if raw_inputs.contains_key(&decl.name) {
                return Err(ToolboxError::BadParam(format!(
                    "parameter {:?} is auth-bound and must not be supplied by the caller",
                    decl.name
                )));
            }
            consumed.insert(decl.name.clone());
            claim_value
        } else if let Some(caller_value) = raw_inputs.get(&decl.name) {
            consumed.insert(decl.name.clone());
            caller_value.clone()
        } else if let Some(default) = &decl.default {
            default.clone()
        } else if decl.required {
            return Err(ToolboxError::BadParam(format!(
                "missing required parameter {:?}",
                decl.name
            )));
        } else {
            continue;
        };

        let coerced = decl.coerce(&raw_value)?;
        values.push(decl.name.clone(), coerced);
    }

    Ok(values)
}

fn reject_extraneous(
    raw_inputs: &serde_json::Map<String, Value>,
    consumed: &std::collections::HashSet<String>,
) -> Result<(), ToolboxError> {
    for key in raw_inputs.keys() {
        if !consumed.contains(key) {
            return Err(ToolboxError::BadParam(format!(
                "unexpected parameter {key:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_param(name: &str, required: bool) -> Parameter {
        Parameter {
            name: name.to_string(),
            param_type: ParamType::Integer,
            required,
            default: None,
            description: None,
            auth_bindings: vec![],
        }
    }

    #[test]
    fn integer_rejects_fractional_string() {
        let p = int_param("id", true);
        assert!(p.coerce(&serde_json::json!("1.5")).is_err());
        assert!(p.coerce(&serde_json::json!("1")).is_ok());
        assert!(p.coerce(&serde_json::json!(1)).is_ok());
        assert!(p
            .coerce(&serde_json::json!(-9223372036854775808i64))
            .is_ok());
    }

    #[test]
    fn array_rejects_mixed_types() {
        let p = Parameter {
            name: "ids".into(),
            param_type: ParamType::Array {
                item: Box::new(ParamType::Integer),
            },
            required: true,
            default: None,
            description: None,
            auth_bindings: vec![],
        };
        assert!(p.coerce(&serde_json::json!([1, 2, 3])).is_ok());
        assert!(p.coerce(&serde_json::json!([1, "x"])).is_err());
    }

    #[test]
    fn auth_bound_rejects_caller_supplied_value() {
        let decls = vec![Parameter {
            name: "email".into(),
            param_type: ParamType::String,
            required: true,
            default: None,
            description: None,
            auth_bindings: vec![AuthBinding {
                service: "my-google-auth".into(),
                claim_field: "email".into(),
            }],
        }];
        let mut claims = VerifiedClaims::new();
        let mut service_claims = HashMap::new();
        service_claims.insert("email".to_string(), serde_json::json!("foo@x"));
        claims.insert("my-google-auth".to_string(), service_claims);

        let mut raw = serde_json::Map::new();
        raw.insert("email".to_string(), serde_json::json!("someone-else@y"));

        let err = parse_params(&decls, &raw, &claims).unwrap_err();
        assert!(matches!(err, ToolboxError::BadParam(_)));

        let empty_raw = serde_json::Map::new();
        let values = parse_params(&decls, &empty_raw, &claims).unwrap();
        assert_eq!(values.as_map().get("email").unwrap(), "foo@x");
    }

    #[test]
    fn extraneous_keys_rejected() {
        let decls = vec![int_param("id", false)];
        let mut raw = serde_json::Map::new();
        raw.insert("id".to_string(), serde_json::json!(1));
        raw.insert("bogus".to_string(), serde_json::json!(true));
        let claims = VerifiedClaims::new();
        assert!(parse_params(&decls, &raw, &claims).is_err());
    }
}
