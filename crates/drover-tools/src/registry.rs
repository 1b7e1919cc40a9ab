//! Tool registry — central index of all registered tools.
//!
//! Tools register once at startup; the table is immutable afterwards and
//! shared behind `Arc`. Duplicate names are a hard error. External
//! (plugin) tools go through [`ToolRegistry::register_external`], which is
//! gated by the plugin policy: disabled by default, allowlist when
//! enabled.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use drover_core::tools::{RiskLevel, ToolDefinition};

use crate::errors::ToolError;
use crate::traits::AgentTool;

/// Gate for external tool registration.
#[derive(Clone, Debug, Default)]
pub struct PluginPolicy {
    /// Whether external tools may register at all.
    pub enabled: bool,
    /// Tool names allowed when enabled.
    pub allowlist: HashSet<String>,
}

impl PluginPolicy {
    /// Build a policy from settings values.
    #[must_use]
    pub fn new(enabled: bool, allowlist: &[String]) -> Self {
        Self {
            enabled,
            allowlist: allowlist.iter().cloned().collect(),
        }
    }

    fn permits(&self, name: &str) -> bool {
        self.enabled && self.allowlist.contains(name)
    }
}

/// Central registry mapping tool names to implementations.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn AgentTool>>,
    plugins: PluginPolicy,
}

impl ToolRegistry {
    /// Create an empty registry with plugins disabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            plugins: PluginPolicy::default(),
        }
    }

    /// Create an empty registry with the given plugin policy.
    #[must_use]
    pub fn with_plugin_policy(plugins: PluginPolicy) -> Self {
        Self {
            tools: HashMap::new(),
            plugins,
        }
    }

    /// Register a builtin tool. Duplicate names are a hard error.
    pub fn register(&mut self, tool: Arc<dyn AgentTool>) -> Result<(), ToolError> {
        let name = tool.name().to_owned();
        if self.tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }
        debug!(tool = %name, "tool registered");
        let _ = self.tools.insert(name, tool);
        Ok(())
    }

    /// Register an external tool, subject to the plugin policy.
    pub fn register_external(&mut self, tool: Arc<dyn AgentTool>) -> Result<(), ToolError> {
        let name = tool.name().to_owned();
        if !self.plugins.permits(&name) {
            warn!(tool = %name, "external tool registration denied by plugin policy");
            return Err(ToolError::PluginDenied(name));
        }
        self.register(tool)
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn AgentTool>> {
        self.tools.get(name).cloned()
    }

    /// All tools sorted by name, optionally capped at a risk ceiling.
    #[must_use]
    pub fn list(&self, max_risk: Option<RiskLevel>) -> Vec<Arc<dyn AgentTool>> {
        let mut tools: Vec<Arc<dyn AgentTool>> = self
            .tools
            .values()
            .filter(|t| max_risk.map_or(true, |ceiling| t.definition().risk <= ceiling))
            .cloned()
            .collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    /// All tool descriptors, sorted by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.list(None).iter().map(|t| t.definition()).collect()
    }

    /// Chat-completion function schema list for all tools.
    #[must_use]
    pub fn openai_schema(&self) -> Value {
        Value::Array(
            self.definitions()
                .iter()
                .map(ToolDefinition::openai_schema)
                .collect(),
        )
    }

    /// Whether a tool with the given name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::Map;

    use drover_core::tools::{PrivacyScope, ToolParameterSchema, ToolResult};

    use super::*;
    use crate::traits::ToolContext;

    struct StubTool {
        tool_name: String,
        risk: RiskLevel,
    }

    impl StubTool {
        fn new(name: &str, risk: RiskLevel) -> Arc<Self> {
            Arc::new(Self {
                tool_name: name.into(),
                risk,
            })
        }
    }

    #[async_trait]
    impl AgentTool for StubTool {
        fn name(&self) -> &str {
            &self.tool_name
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.tool_name.clone(),
                description: format!("Stub {}", self.tool_name),
                risk: self.risk,
                privacy_scope: PrivacyScope::Public,
                parameters: ToolParameterSchema::default(),
            }
        }

        async fn execute(
            &self,
            _arguments: Map<String, serde_json::Value>,
            _ctx: &ToolContext,
        ) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok(serde_json::json!("ok")))
        }
    }

    #[test]
    fn register_and_get() {
        let mut reg = ToolRegistry::new();
        reg.register(StubTool::new("resolve_target", RiskLevel::ReadOnly)).unwrap();
        assert!(reg.get("resolve_target").is_some());
        assert!(reg.get("missing").is_none());
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut reg = ToolRegistry::new();
        reg.register(StubTool::new("t", RiskLevel::ReadOnly)).unwrap();
        let err = reg.register(StubTool::new("t", RiskLevel::ReadOnly)).unwrap_err();
        assert!(matches!(err, ToolError::AlreadyRegistered(_)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn list_is_sorted_by_name() {
        let mut reg = ToolRegistry::new();
        reg.register(StubTool::new("zeta", RiskLevel::ReadOnly)).unwrap();
        reg.register(StubTool::new("alpha", RiskLevel::ReadOnly)).unwrap();
        let names: Vec<String> = reg.list(None).iter().map(|t| t.name().to_owned()).collect();
        assert_eq!(names, vec!["alpha".to_owned(), "zeta".to_owned()]);
    }

    #[test]
    fn risk_ceiling_filters_list() {
        let mut reg = ToolRegistry::new();
        reg.register(StubTool::new("read", RiskLevel::ReadOnly)).unwrap();
        reg.register(StubTool::new("shell", RiskLevel::Shell)).unwrap();
        let capped = reg.list(Some(RiskLevel::Write));
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].name(), "read");
    }

    #[test]
    fn openai_schema_covers_all_tools() {
        let mut reg = ToolRegistry::new();
        reg.register(StubTool::new("a", RiskLevel::ReadOnly)).unwrap();
        reg.register(StubTool::new("b", RiskLevel::ReadOnly)).unwrap();
        let schema = reg.openai_schema();
        assert_eq!(schema.as_array().unwrap().len(), 2);
        assert_eq!(schema[0]["type"], "function");
    }

    #[test]
    fn external_registration_denied_by_default() {
        let mut reg = ToolRegistry::new();
        let err = reg
            .register_external(StubTool::new("plugin_tool", RiskLevel::ReadOnly))
            .unwrap_err();
        assert!(matches!(err, ToolError::PluginDenied(_)));
        assert!(reg.is_empty());
    }

    #[test]
    fn external_registration_requires_allowlist_entry() {
        let mut reg = ToolRegistry::with_plugin_policy(PluginPolicy::new(
            true,
            &["approved_tool".to_owned()],
        ));
        assert!(reg
            .register_external(StubTool::new("approved_tool", RiskLevel::ReadOnly))
            .is_ok());
        assert!(reg
            .register_external(StubTool::new("other_tool", RiskLevel::ReadOnly))
            .is_err());
    }
}
