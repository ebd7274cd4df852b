//! Process-wide plugin registry (C1): `kind -> config constructor` maps for
//! sources, auth services, and tools. The registry is the only mechanism
//! tying YAML kinds to code — no switch statement enumerates kinds in the
//! core. Registration happens once at program start; double-registration of
//! the same kind is a fatal startup error.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::ToolboxError;
use crate::model::{AuthService, Source, Tool};

/// Builds a concrete `Source` from its raw, kind-dispatched config. Sources
/// are materialized first, before auth services and tools.
#[async_trait]
pub trait SourceConstructor: Send + Sync {
    async fn construct(&self, name: &str, raw: &Value) -> Result<Arc<dyn Source>, ToolboxError>;
}

#[async_trait]
pub trait AuthServiceConstructor: Send + Sync {
    async fn construct(&self, name: &str, raw: &Value) -> Result<Arc<dyn AuthService>, ToolboxError>;
}

/// Tool constructors receive the already-materialized sources map so they
/// can bind to their declared source by name and verify the source's kind
/// is one they accept.
#[async_trait]
pub trait ToolConstructor: Send + Sync {
    async fn construct(
        &self,
        name: &str,
        raw: &Value,
        sources: &HashMap<String, Arc<dyn Source>>,
    ) -> Result<Arc<dyn Tool>, ToolboxError>;
}

#[derive(Default)]
pub struct Registry {
    source_kinds: RwLock<HashMap<String, Arc<dyn SourceConstructor>>>,
    auth_kinds: RwLock<HashMap<String, Arc<dyn AuthServiceConstructor>>>,
    tool_kinds: RwLock<HashMap<String, Arc<dyn ToolConstructor>>>,
}

impl Registry {
    pub fn register_source_kind(&self, kind: impl Into<String>, ctor: Arc<dyn SourceConstructor>) {
        let kind = kind.into();
        let mut map = self.source_kinds.write().expect("registry lock poisoned");
        if map.insert(kind.clone(), ctor).is_some() {
            panic!("source kind {kind:?} registered twice");
        }
    }

    pub fn register_auth_kind(&self, kind: impl Into<String>, ctor: Arc<dyn AuthServiceConstructor>) {
        let kind = kind.into();
        let mut map = self.auth_kinds.write().expect("registry lock poisoned");
        if map.insert(kind.clone(), ctor).is_some() {
            panic!("auth kind {kind:?} registered twice");
        }
    }

    pub fn register_tool_kind(&self, kind: impl Into<String>, ctor: Arc<dyn ToolConstructor>) {
        let kind = kind.into();
        let mut map = self.tool_kinds.write().expect("registry lock poisoned");
        if map.insert(kind.clone(), ctor).is_some() {
            panic!("tool kind {kind:?} registered twice");
        }
    }

    pub fn source_constructor(&self, kind: &str) -> Option<Arc<dyn SourceConstructor>> {
        self.source_kinds.read().expect("registry lock poisoned").get(kind).cloned()
    }

    pub fn auth_constructor(&self, kind: &str) -> Option<Arc<dyn AuthServiceConstructor>> {
        self.auth_kinds.read().expect("registry lock poisoned").get(kind).cloned()
    }

    pub fn tool_constructor(&self, kind: &str) -> Option<Arc<dyn ToolConstructor>> {
        self.tool_kinds.read().expect("registry lock poisoned").get(kind).cloned()
    }
}

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::default);

/// The process-wide registry instance. All kind plugins self-register
/// against this at startup by calling `global().register_*_kind(...)`.
pub fn global() -> &'static Registry {
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopSource;
    impl Source for NoopSource {
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

    struct NoopCtor;
    #[async_trait]
    impl SourceConstructor for NoopCtor {
        async fn construct(&self, _name: &str, _raw: &Value) -> Result<Arc<dyn Source>, ToolboxError> {
            Ok(Arc::new(NoopSource))
        }
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn double_registration_is_fatal() {
        let registry = Registry::default();
        registry.register_source_kind("noop", Arc::new(NoopCtor));
        registry.register_source_kind("noop", Arc::new(NoopCtor));
    }

    #[test]
    fn lookup_after_registration() {
        let registry = Registry::default();
        registry.register_source_kind("noop", Arc::new(NoopCtor));
        assert!(registry.source_constructor("noop").is_some());
        assert!(registry.source_constructor("missing").is_none());
    }
}
