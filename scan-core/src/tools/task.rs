//! `task`/`list_agents` tools: let a running agent recursively spawn a
//! fresh sub-[`BaseAgent`](crate::agent::BaseAgent) bound to a named
//! template and return its final text.
//!
//! Grounded in `original_source/agent-scan/tools/task/task.py`'s
//! `task()`/`list_agents()`. The recursive construction is safe from
//! infinite-future-size issues because `Tool::call` is already boxed by
//! `#[async_trait]` at the dispatch boundary — `BaseAgent::run` itself
//! stays a plain `async fn`.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agent::{BaseAgent, BaseAgentConfig};
use crate::prompts::agents;

use super::{Tool, ToolContext, ToolError, ToolSpec};

pub struct TaskTool;

#[async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &str {
        "task"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "task",
            "Recursively spawn a sub-agent from a named template to carry out an ad hoc prompt.",
        )
        .with_param("prompt", "string", true)
        .with_param("subagent_type", "string", true)
        .with_param("description", "string", false)
        .needs_context()
    }

    async fn call(&self, args: Value, ctx: Option<&ToolContext>) -> Result<Value, ToolError> {
        let ctx = ctx.ok_or_else(|| ToolError::Failed("task requires a ToolContext".to_string()))?;
        let prompt = args
            .get("prompt")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::Failed("task requires a 'prompt' argument".to_string()))?;
        let subagent_type = args
            .get("subagent_type")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::Failed("task requires a 'subagent_type' argument".to_string()))?;

        let template = agents::load_agent(subagent_type)
            .ok_or_else(|| ToolError::Failed(format!("Unknown agent template: {subagent_type}")))?;

        let config = BaseAgentConfig {
            name: template.name.clone(),
            instruction: template.body.clone(),
            llm: ctx.llm.clone(),
            specialized_llms: ctx.specialized_llms.clone(),
            log_step_id: uuid::Uuid::new_v4().to_string(),
            provider: ctx.provider.clone(),
            provider_adapter: ctx.provider_adapter.clone(),
            language: ctx.language,
            registry: ctx.registry.clone(),
            prompts: ctx.prompts.clone(),
            logger: ctx.logger.clone(),
            skip_finish_formatting: false,
        };
        let mut sub_agent = BaseAgent::new(config);
        sub_agent.set_repo_dir(ctx.folder.clone());
        sub_agent.add_user_message(prompt);

        let (result, stats) = sub_agent
            .run()
            .await
            .map_err(|e| ToolError::Failed(format!("sub-agent failed: {e}")))?;

        Ok(json!({
            "result": result,
            "subagent_type": subagent_type,
            "tool_usage_stats": stats,
        }))
    }
}

pub struct ListAgentsTool;

#[async_trait]
impl Tool for ListAgentsTool {
    fn name(&self) -> &str {
        "list_agents"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new("list_agents", "Enumerate available sub-agent templates.")
    }

    async fn call(&self, _args: Value, _ctx: Option<&ToolContext>) -> Result<Value, ToolError> {
        let templates: Vec<Value> = agents::list_agents()
            .into_iter()
            .map(|t| json!({"name": t.name, "description": t.description}))
            .collect();
        Ok(json!({"agents": templates}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;
    use crate::llm::test_support::ScriptedLlm;
    use crate::logger::ScanLogger;
    use crate::prompts::PromptStore;
    use crate::provider::catalog::ProviderCatalog;
    use crate::provider::{Provider, ProviderAdapter, ProviderConfig, ProviderSpec};
    use crate::tools::ToolRegistry;
    use std::sync::Arc;

    fn test_context(llm: Arc<dyn crate::llm::Llm>) -> ToolContext {
        let catalog = ProviderCatalog::empty();
        let spec = ProviderSpec {
            id: "nonexistent".to_string(),
            label: None,
            delay_ms: None,
            config: ProviderConfig::default(),
        };
        let provider = Provider::build(spec, &catalog);
        ToolContext {
            llm,
            specialized_llms: Default::default(),
            history: vec![],
            agent_name: "test".to_string(),
            iteration: 0,
            folder: String::new(),
            provider_adapter: Arc::new(ProviderAdapter::with_default_client(catalog)),
            provider: Arc::new(provider),
            language: Language::En,
            registry: Arc::new(ToolRegistry::new()),
            prompts: Arc::new(PromptStore::with_embedded_defaults()),
            logger: Arc::new(ScanLogger::with_sink(|_| {})),
        }
    }

    #[tokio::test]
    async fn task_spawns_sub_agent_and_returns_its_final_text() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            "<tool_name>finish</tool_name>",
            "sub-agent done",
        ]));
        let ctx = test_context(llm);
        let result = TaskTool
            .call(json!({"prompt": "probe this", "subagent_type": "general"}), Some(&ctx))
            .await
            .unwrap();
        assert_eq!(result["result"], "sub-agent done");
    }

    #[tokio::test]
    async fn task_unknown_template_is_an_error() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let ctx = test_context(llm);
        let err = TaskTool
            .call(json!({"prompt": "x", "subagent_type": "nonexistent"}), Some(&ctx))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Failed(_)));
    }

    #[tokio::test]
    async fn list_agents_returns_known_templates() {
        let result = ListAgentsTool.call(json!({}), None).await.unwrap();
        let agents = result["agents"].as_array().unwrap();
        assert!(agents.iter().any(|a| a["name"] == "general"));
    }
}
