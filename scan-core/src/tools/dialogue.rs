//! `dialogue` tool: single-turn message to the target agent under test.
//!
//! Directly grounded in
//! `original_source/agent-scan/tools/dialogue/dialogue.py`: one retry on
//! transient failures (timeout, 5xx), fixed 2s backoff, client errors
//! (`"status 400/401/403/404/422"` substrings) are never retried, and
//! exhausted retries return an `"[Error: ...]"` string rather than an
//! exception so the calling skill agent can keep reasoning (spec §5/P3).

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolContext, ToolError, ToolSpec};

const MAX_RETRIES: u32 = 1;
const RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(2);
const CLIENT_ERROR_CODES: &[&str] = &["400", "401", "403", "404", "422"];

pub struct DialogueTool;

#[async_trait]
impl Tool for DialogueTool {
    fn name(&self) -> &str {
        "dialogue"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "dialogue",
            "Send a single-turn message to the target agent via its provider and return its response.",
        )
        .with_param("prompt", "string", true)
        .needs_context()
    }

    async fn call(&self, args: Value, ctx: Option<&ToolContext>) -> Result<Value, ToolError> {
        let ctx = ctx.ok_or_else(|| ToolError::Failed("dialogue requires a ToolContext".to_string()))?;
        let prompt = args
            .get("prompt")
            .and_then(Value::as_str)
            .unwrap_or_default();

        Ok(json!(run_dialogue(ctx, prompt).await))
    }
}

async fn run_dialogue(ctx: &ToolContext, prompt: &str) -> String {
    let mut last_message = String::new();

    for attempt in 0..=MAX_RETRIES {
        let result = ctx.call_provider(prompt).await;
        if result.success {
            return result.response.output.unwrap_or_default();
        }

        last_message = result.message;
        let is_client_error = CLIENT_ERROR_CODES
            .iter()
            .any(|code| last_message.contains(&format!("status {code}")));

        if is_client_error || attempt >= MAX_RETRIES {
            break;
        }

        tokio::time::sleep(RETRY_DELAY).await;
    }

    format!("[Error: {last_message}]")
}
