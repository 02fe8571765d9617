//! Read-only-after-startup tool registry.
//!
//! Grounded in `graphweave/src/tools/registry.rs`'s `HashMap<String, Box<dyn
//! Tool>>` shape; per spec the registry never mutates during a scan, so
//! unlike the teacher's `ToolRegistryLocked` we don't need an `RwLock` —
//! registration happens once at orchestrator startup, before any agent runs.

use std::collections::HashMap;

use serde_json::Value;

use super::{Tool, ToolContext, ToolError, ToolSpec};

pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn list(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Single descriptor string concatenating every registered tool's
    /// `<name>`/`<description>`/`<parameters>` block, spliced into the
    /// system prompt.
    pub fn tools_prompt(&self) -> String {
        self.list()
            .iter()
            .map(ToolSpec::render_prompt_block)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    fn needs_context(&self, name: &str) -> bool {
        self.tools
            .get(name)
            .map(|t| t.spec().needs_context)
            .unwrap_or(false)
    }

    /// Raw invocation returning `Result`, used internally by
    /// [`super::dispatch::dispatch`]. Callers that need the spec's
    /// never-fails string contract should go through `dispatch` instead.
    pub async fn call(
        &self,
        name: &str,
        mut args: Value,
        ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let call_ctx = if self.needs_context(name) {
            if let Value::Object(ref mut map) = args {
                map.insert("__context_attached".to_string(), Value::Bool(true));
            }
            Some(ctx)
        } else {
            None
        };

        tool.call(args, call_ctx).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;
    use crate::llm::test_support::ScriptedLlm;
    use crate::provider::catalog::ProviderCatalog;
    use crate::provider::{Provider, ProviderAdapter, ProviderConfig, ProviderSpec};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn spec(&self) -> ToolSpec {
            ToolSpec::new("echo", "echoes its input").with_param("text", "string", true)
        }
        async fn call(&self, args: Value, _ctx: Option<&ToolContext>) -> Result<Value, ToolError> {
            Ok(json!({"echoed": args.get("text").cloned().unwrap_or(Value::Null)}))
        }
    }

    fn test_context() -> ToolContext {
        let spec = ProviderSpec {
            id: "nonexistent".to_string(),
            label: None,
            delay_ms: None,
            config: ProviderConfig::default(),
        };
        let catalog = ProviderCatalog::empty();
        let provider = Provider::build(spec, &catalog);
        ToolContext {
            llm: Arc::new(ScriptedLlm::new(vec![])),
            specialized_llms: Default::default(),
            history: vec![],
            agent_name: "test".to_string(),
            iteration: 0,
            folder: String::new(),
            provider_adapter: Arc::new(ProviderAdapter::with_default_client(catalog)),
            provider: Arc::new(provider),
            language: Language::En,
            registry: Arc::new(ToolRegistry::new()),
            prompts: Arc::new(crate::prompts::PromptStore::with_embedded_defaults()),
            logger: Arc::new(crate::logger::ScanLogger::new()),
        }
    }

    #[tokio::test]
    async fn call_dispatches_to_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let ctx = test_context();
        let result = registry
            .call("echo", json!({"text": "hi"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result["echoed"], "hi");
    }

    #[tokio::test]
    async fn call_unknown_tool_returns_not_found() {
        let registry = ToolRegistry::new();
        let ctx = test_context();
        let err = registry.call("nope", json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "nope"));
    }

    #[test]
    fn tools_prompt_concatenates_every_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let prompt = registry.tools_prompt();
        assert!(prompt.contains("<name>echo</name>"));
        assert!(prompt.contains("echoes its input"));
    }

    #[tokio::test]
    async fn dispatch_formats_not_found_error_verbatim() {
        let registry = ToolRegistry::new();
        let ctx = test_context();
        let formatted = super::super::dispatch(&registry, "ghost", json!({}), &ctx).await;
        assert_eq!(formatted, "Error: Tool 'ghost' not found");
    }
}
