//! Two-pass YAML config loading (§4.4): raw kind extraction, environment
//! substitution, multi-file merge with conflict detection, and
//! materialization through the Plugin Registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use toolbox_core::{AuthService, ResourceTuple, Source, Tool, Toolset, DEFAULT_TOOLSET};

use crate::error::{ConfigError, ConfigResult};

static ENV_VAR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Substitutes every `${NAME}` occurrence with the environment variable's
/// value. Unset variables are left verbatim (not an error) — spec §4.4/§6.
pub fn substitute_env(text: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// One pass-1 decoded entry: its declared `kind` plus the raw map, ready for
/// pass-2 strict dispatch through the registry.
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub kind: String,
    pub raw: Value,
}

/// The descriptor tree produced by pass 1, before materialization.
#[derive(Debug, Clone, Default)]
pub struct RawConfig {
    pub sources: HashMap<String, RawEntry>,
    pub auth_services: HashMap<String, RawEntry>,
    pub tools: HashMap<String, RawEntry>,
    pub toolsets: HashMap<String, Vec<String>>,
}

impl RawConfig {
    /// Unions `other` into `self` by name within each category; fails with
    /// `ConfigConflict` on any duplicate name.
    pub fn merge(&mut self, other: RawConfig) -> ConfigResult<()> {
        merge_category("sources", &mut self.sources, other.sources)?;
        merge_category("authServices", &mut self.auth_services, other.auth_services)?;
        merge_category("tools", &mut self.tools, other.tools)?;
        for (name, tools) in other.toolsets {
            if self.toolsets.insert(name.clone(), tools).is_some() {
                return Err(ConfigError::ConfigConflict {
                    category: "toolsets".to_string(),
                    name,
                });
            }
        }
        Ok(())
    }
}

fn merge_category(
    category: &str,
    accum: &mut HashMap<String, RawEntry>,
    incoming: HashMap<String, RawEntry>,
) -> ConfigResult<()> {
    for (name, entry) in incoming {
        if accum.insert(name.clone(), entry).is_some() {
            return Err(ConfigError::ConfigConflict {
                category: category.to_string(),
                name,
            });
        }
    }
    Ok(())
}

/// Decodes one YAML document's raw text into a `RawConfig` (pass 1):
/// top-level `sources`/`authServices` (alias `authSources`, folded in with a
/// warning)/`tools`/`toolsets`, reading only each entry's `kind` field.
pub fn decode_pass1(text: &str) -> ConfigResult<RawConfig> {
    let substituted = substitute_env(text);
    let doc: serde_yaml::Value = serde_yaml::from_str(&substituted)?;
    let doc = doc.as_mapping().cloned().unwrap_or_default();

    let mut config = RawConfig::default();
    config.sources = decode_kind_map(&doc, "sources")?;

    let mut auth_services = decode_kind_map(&doc, "authServices")?;
    let legacy_auth_sources = decode_kind_map(&doc, "authSources")?;
    if !legacy_auth_sources.is_empty() {
        tracing::warn!("\"authSources\" is deprecated; use \"authServices\" instead");
        for (name, entry) in legacy_auth_sources {
            if auth_services.insert(name.clone(), entry).is_some() {
                return Err(ConfigError::ConfigConflict {
                    category: "authServices".to_string(),
                    name,
                });
            }
        }
    }
    config.auth_services = auth_services;

    config.tools = decode_kind_map(&doc, "tools")?;

    if let Some(toolsets_value) = doc.get(serde_yaml::Value::String("toolsets".to_string())) {
        let toolsets_map = toolsets_value.as_mapping().ok_or_else(|| ConfigError::ValidationError {
            name: "toolsets".to_string(),
            message: "expected a mapping of toolset name to tool name list".to_string(),
        })?;
        for (name_value, tools_value) in toolsets_map {
            let name = yaml_key_to_string(name_value)?;
            let tools: Vec<String> = serde_yaml::from_value(tools_value.clone())?;
            config.toolsets.insert(name, tools);
        }
    }

    Ok(config)
}

fn decode_kind_map(
    doc: &serde_yaml::Mapping,
    key: &str,
) -> ConfigResult<HashMap<String, RawEntry>> {
    let mut out = HashMap::new();
    let Some(section) = doc.get(serde_yaml::Value::String(key.to_string())) else {
        return Ok(out);
    };
    let mapping = section.as_mapping().ok_or_else(|| ConfigError::ValidationError {
        name: key.to_string(),
        message: "expected a mapping of name to entry".to_string(),
    })?;
    for (name_value, entry_value) in mapping {
        let name = yaml_key_to_string(name_value)?;
        let entry_mapping = entry_value.as_mapping().ok_or_else(|| ConfigError::ValidationError {
            name: name.clone(),
            message: "expected a mapping with a \"kind\" field".to_string(),
        })?;
        let kind = entry_mapping
            .get(serde_yaml::Value::String("kind".to_string()))
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConfigError::ValidationError {
                name: name.clone(),
                message: "missing required \"kind\" field".to_string(),
            })?
            .to_string();
        let raw: Value = serde_yaml::from_value(entry_value.clone())?;
        out.insert(name, RawEntry { kind, raw });
    }
    Ok(out)
}

fn yaml_key_to_string(key: &serde_yaml::Value) -> ConfigResult<String> {
    key.as_str().map(|s| s.to_string()).ok_or_else(|| ConfigError::ValidationError {
        name: "<key>".to_string(),
        message: "expected a string key".to_string(),
    })
}

/// Loads and merges one or more files (or every `*.yaml`/`*.yml` file in a
/// directory) into a single `RawConfig`.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load_file(path: &Path) -> ConfigResult<RawConfig> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
            path: path.display().to_string(),
            source,
        })?;
        decode_pass1(&text)
    }

    pub fn load_files(paths: &[PathBuf]) -> ConfigResult<RawConfig> {
        let mut merged = RawConfig::default();
        for path in paths {
            merged.merge(Self::load_file(path)?)?;
        }
        Ok(merged)
    }

    pub fn load_folder(dir: &Path) -> ConfigResult<RawConfig> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|source| ConfigError::FileReadError {
                path: dir.display().to_string(),
                source,
            })?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml")))
            .collect();
        entries.sort();
        Self::load_files(&entries)
    }
}

/// Materialization order (§4.4): sources → auth services → tools (sources
/// map passed in) → toolsets (tools map passed in). Any error aborts the
/// whole attempt; the caller is responsible for leaving the prior
/// `ResourceTuple` untouched on failure.
pub async fn materialize(raw: &RawConfig, registry: &toolbox_core::Registry) -> ConfigResult<ResourceTuple> {
    let mut sources: HashMap<String, Arc<dyn Source>> = HashMap::new();
    for (name, entry) in &raw.sources {
        let ctor = registry.source_constructor(&entry.kind).ok_or_else(|| ConfigError::UnknownKind {
            category: "source".to_string(),
            kind: entry.kind.clone(),
            name: name.clone(),
        })?;
        let source = ctor
            .construct(name, &entry.raw)
            .await
            .map_err(|e| ConfigError::SourceInit { name: name.clone(), message: e.to_string() })?;
        sources.insert(name.clone(), source);
    }

    let mut auth_services: HashMap<String, Arc<dyn AuthService>> = HashMap::new();
    for (name, entry) in &raw.auth_services {
        let ctor = registry.auth_constructor(&entry.kind).ok_or_else(|| ConfigError::UnknownKind {
            category: "authService".to_string(),
            kind: entry.kind.clone(),
            name: name.clone(),
        })?;
        let service = ctor.construct(name, &entry.raw).await?;
        auth_services.insert(name.clone(), service);
    }

    let mut tools: HashMap<String, Arc<dyn Tool>> = HashMap::new();
    for (name, entry) in &raw.tools {
        let ctor = registry.tool_constructor(&entry.kind).ok_or_else(|| ConfigError::UnknownKind {
            category: "tool".to_string(),
            kind: entry.kind.clone(),
            name: name.clone(),
        })?;
        let tool = ctor.construct(name, &entry.raw, &sources).await?;
        tools.insert(name.clone(), tool);
    }

    let mut toolsets: HashMap<String, Toolset> = HashMap::new();
    toolsets.insert(
        DEFAULT_TOOLSET.to_string(),
        Toolset {
            name: DEFAULT_TOOLSET.to_string(),
            tool_names: tools.keys().cloned().collect(),
        },
    );
    for (name, tool_names) in &raw.toolsets {
        for tool_name in tool_names {
            if !tools.contains_key(tool_name) {
                return Err(ConfigError::ValidationError {
                    name: name.clone(),
                    message: format!("toolset references unknown tool {tool_name:?}"),
                });
            }
        }
        toolsets.insert(
            name.clone(),
            Toolset {
                name: name.clone(),
                tool_names: tool_names.clone(),
            },
        );
    }

    Ok(ResourceTuple {
        sources,
        auth_services,
        tools,
        toolsets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_substitution_leaves_unset_vars_verbatim() {
        std::env::set_var("TOOLBOX_TEST_VAR", "hello");
        let out = substitute_env("host: ${TOOLBOX_TEST_VAR}\nmissing: ${TOOLBOX_TEST_MISSING}");
        assert!(out.contains("host: hello"));
        assert!(out.contains("missing: ${TOOLBOX_TEST_MISSING}"));
    }

    #[test]
    fn pass1_reads_kind_and_authsources_alias() {
        let yaml = r#"
sources:
  my-pg:
    kind: postgres-sql
    host: localhost
authSources:
  legacy-auth:
    kind: google
"#;
        let config = decode_pass1(yaml).unwrap();
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources["my-pg"].kind, "postgres-sql");
        assert_eq!(config.auth_services.len(), 1);
        assert_eq!(config.auth_services["legacy-auth"].kind, "google");
    }

    #[test]
    fn merge_conflict_on_duplicate_source_name() {
        let a = decode_pass1("sources:\n  dup:\n    kind: postgres-sql\n").unwrap();
        let b = decode_pass1("sources:\n  dup:\n    kind: http\n").unwrap();
        let mut merged = a;
        assert!(merged.merge(b).is_err());
    }
}
