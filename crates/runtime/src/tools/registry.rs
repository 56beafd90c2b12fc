//! Name-indexed tool registry.

use super::{RegistryError, Tool, ToolSpec};
use indexmap::IndexMap;
use std::sync::Arc;

/// A tool together with the descriptor captured at registration.
#[derive(Clone)]
pub struct RegisteredTool {
    pub spec: ToolSpec,
    pub tool: Arc<dyn Tool>,
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// The authoritative set of tools available to a session.
///
/// Built once at startup and then shared read-only (usually behind an
/// `Arc`), so lookups need no locking.
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    tools: IndexMap<String, RegisteredTool>,
    specs: Vec<ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. Fails if a tool with the same name is already present.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let spec = tool.spec();
        if spec.name.trim().is_empty() {
            return Err(RegistryError::InvalidName(spec.name));
        }
        if self.tools.contains_key(&spec.name) {
            return Err(RegistryError::Duplicate(spec.name));
        }
        self.specs.push(spec.clone());
        self.tools
            .insert(spec.name.clone(), RegisteredTool { spec, tool });
        Ok(())
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with(mut self, tool: impl Tool + 'static) -> Result<Self, RegistryError> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// Descriptors in registration order.
    pub fn list_schemas(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::EchoTool;

    #[test]
    fn empty_registry_has_no_tools() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.list_schemas().is_empty());
        assert!(registry.get("calculator").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::named("echo")).unwrap();
        let err = registry.register(EchoTool::named("echo")).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn blank_names_are_rejected() {
        let err = ToolRegistry::new()
            .with(EchoTool::named("  "))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName(_)));
    }

    #[test]
    fn schemas_keep_registration_order() {
        let registry = ToolRegistry::new()
            .with(EchoTool::named("zeta"))
            .and_then(|r| r.with(EchoTool::named("alpha")))
            .and_then(|r| r.with(EchoTool::named("mid")))
            .unwrap();

        let names: Vec<&str> = registry
            .list_schemas()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
        assert_eq!(registry.names(), ["zeta", "alpha", "mid"]);
        assert_eq!(registry.get("alpha").unwrap().spec.name, "alpha");
    }
}
