//! Integration tests for toolbox-config: file loading, multi-file merge, and
//! materialization against a real (test-local) registry.

use std::io::Write;

use async_trait::async_trait;
use serde_json::Value;
use toolbox_config::ConfigLoader;
use toolbox_core::registry::SourceConstructor;
use toolbox_core::Registry;

struct NoopSource;
impl toolbox_core::Source for NoopSource {
    fn name(&self) -> &str {
        "noop"
    }
    fn kind(&self) -> &str {
        "noop"
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

struct NoopSourceCtor;
#[async_trait]
impl SourceConstructor for NoopSourceCtor {
    async fn construct(&self, name: &str, _raw: &Value) -> Result<std::sync::Arc<dyn toolbox_core::Source>, toolbox_core::ToolboxError> {
        let _ = name;
        Ok(std::sync::Arc::new(NoopSource))
    }
}

fn test_registry() -> Registry {
    let registry = Registry::default();
    registry.register_source_kind("noop", std::sync::Arc::new(NoopSourceCtor));
    registry
}

fn write_temp_yaml(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn load_file_reads_kind_and_merges_authsources_alias() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp_yaml(
        &dir,
        "config.yaml",
        "sources:\n  db:\n    kind: noop\nauthSources:\n  legacy:\n    kind: google\n",
    );
    let config = ConfigLoader::load_file(&path).unwrap();
    assert_eq!(config.sources.len(), 1);
    assert_eq!(config.auth_services["legacy"].kind, "google");
}

#[test]
fn load_files_merges_across_files_and_detects_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_temp_yaml(&dir, "a.yaml", "sources:\n  db-a:\n    kind: noop\n");
    let b = write_temp_yaml(&dir, "b.yaml", "sources:\n  db-b:\n    kind: noop\n");
    let merged = ConfigLoader::load_files(&[a.clone(), b.clone()]).unwrap();
    assert_eq!(merged.sources.len(), 2);

    let dup = write_temp_yaml(&dir, "dup.yaml", "sources:\n  db-a:\n    kind: noop\n");
    assert!(ConfigLoader::load_files(&[a, dup]).is_err());
}

#[test]
fn load_folder_merges_every_yaml_file_in_sorted_order() {
    let dir = tempfile::tempdir().unwrap();
    write_temp_yaml(&dir, "01-sources.yaml", "sources:\n  db:\n    kind: noop\n");
    write_temp_yaml(&dir, "02-toolsets.yaml", "toolsets:\n  reporting: []\n");
    write_temp_yaml(&dir, "ignored.txt", "not yaml");

    let merged = ConfigLoader::load_folder(dir.path()).unwrap();
    assert_eq!(merged.sources.len(), 1);
    assert_eq!(merged.toolsets.len(), 1);
}

#[tokio::test]
async fn materialize_builds_default_toolset_from_every_tool() {
    let registry = test_registry();
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp_yaml(&dir, "config.yaml", "sources:\n  db:\n    kind: noop\n");
    let raw = ConfigLoader::load_file(&path).unwrap();

    let tuple = toolbox_config::materialize(&raw, &registry).await.unwrap();
    assert_eq!(tuple.sources.len(), 1);
    assert!(tuple.toolsets.contains_key(toolbox_core::DEFAULT_TOOLSET));
}

#[tokio::test]
async fn materialize_fails_on_unknown_kind() {
    let registry = test_registry();
    let raw = toolbox_config::decode_pass1("sources:\n  db:\n    kind: unregistered-kind\n").unwrap();
    let result = toolbox_config::materialize(&raw, &registry).await;
    assert!(result.is_err());
}
