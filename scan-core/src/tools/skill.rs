//! `search_skill`/`load_skill` tools: let the reasoning loop enumerate or
//! load a skill markdown template at runtime instead of having every
//! skill's instructions baked into its system prompt up front.
//!
//! Grounded in `original_source/agent-scan/tools/skill/skill.py`'s
//! `skill()` dispatcher, thinned to the two read-only operations spec §6
//! lists; the skill catalog itself lives in [`crate::prompts::skills`].

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::prompts::skills;

use super::{Tool, ToolContext, ToolError, ToolSpec};

pub struct SearchSkillTool;

#[async_trait]
impl Tool for SearchSkillTool {
    fn name(&self) -> &str {
        "search_skill"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "search_skill",
            "List available skill templates, optionally filtered by a name/description substring.",
        )
        .with_param("query", "string", false)
    }

    async fn call(&self, args: Value, _ctx: Option<&ToolContext>) -> Result<Value, ToolError> {
        let query = args.get("query").and_then(Value::as_str);
        let hits: Vec<Value> = skills::search_skill(query)
            .into_iter()
            .map(|s| json!({"name": s.name, "description": s.description}))
            .collect();
        Ok(json!({"skills": hits}))
    }
}

pub struct LoadSkillTool;

#[async_trait]
impl Tool for LoadSkillTool {
    fn name(&self) -> &str {
        "load_skill"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new("load_skill", "Load a skill template's full instructions by name.")
            .with_param("name", "string", true)
    }

    async fn call(&self, args: Value, _ctx: Option<&ToolContext>) -> Result<Value, ToolError> {
        let name = args
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::Failed("load_skill requires a 'name' argument".to_string()))?;

        match skills::load_skill(name) {
            Some(skill) => Ok(json!({
                "name": skill.name,
                "description": skill.description,
                "body": skill.body,
            })),
            None => Err(ToolError::Failed(format!("Unknown skill: {name}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_skill_with_no_query_lists_all() {
        let result = SearchSkillTool.call(json!({}), None).await.unwrap();
        let skills = result["skills"].as_array().unwrap();
        assert_eq!(skills.len(), skills::search_skill(None).len());
    }

    #[tokio::test]
    async fn search_skill_filters_by_query() {
        let result = SearchSkillTool
            .call(json!({"query": "injection"}), None)
            .await
            .unwrap();
        let skills = result["skills"].as_array().unwrap();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0]["name"], "indirect-injection-detection");
    }

    #[tokio::test]
    async fn load_skill_returns_body_for_known_name() {
        let result = LoadSkillTool
            .call(json!({"name": "data-leakage-detection"}), None)
            .await
            .unwrap();
        assert!(result["body"].as_str().unwrap().contains("Probe the target agent"));
    }

    #[tokio::test]
    async fn load_skill_unknown_name_is_an_error() {
        let err = LoadSkillTool
            .call(json!({"name": "nonexistent"}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Failed(_)));
    }
}
