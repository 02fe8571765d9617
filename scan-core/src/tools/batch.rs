//! `batch` tool: executes several tool calls as one turn.
//!
//! Grounded in `original_source/agent-scan/tools/batch/batch.py`, **not**
//! the teacher's own `loom/src/tools/batch.rs` (which runs its children
//! in parallel with a cap of 25) — spec §4.2/§5 calls for serial
//! execution with a cap of 10, "to preserve order", so the original's
//! control flow is followed here instead of the teacher's, while still
//! matching the teacher's `Tool` trait shape.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{dispatch::format_result, Tool, ToolContext, ToolError, ToolSpec};

pub const DISALLOWED_TOOLS: &[&str] = &["batch", "finish"];
pub const MAX_BATCH_SIZE: usize = 10;

pub struct BatchTool;

#[async_trait]
impl Tool for BatchTool {
    fn name(&self) -> &str {
        "batch"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new("batch", "Execute multiple tool calls serially, preserving order.")
            .with_param("tool_calls", "array", true)
            .needs_context()
    }

    async fn call(&self, args: Value, ctx: Option<&ToolContext>) -> Result<Value, ToolError> {
        let ctx = ctx.ok_or_else(|| ToolError::Failed("batch requires a ToolContext".to_string()))?;
        let Some(tool_calls) = args.get("tool_calls").and_then(Value::as_array) else {
            return Err(ToolError::Failed(
                "No tool calls provided. Provide at least one tool call.".to_string(),
            ));
        };
        if tool_calls.is_empty() {
            return Err(ToolError::Failed(
                "No tool calls provided. Provide at least one tool call.".to_string(),
            ));
        }

        let calls_to_execute = &tool_calls[..tool_calls.len().min(MAX_BATCH_SIZE)];
        let discarded = &tool_calls[tool_calls.len().min(MAX_BATCH_SIZE)..];

        let mut results = Vec::with_capacity(tool_calls.len());
        for (index, call) in calls_to_execute.iter().enumerate() {
            results.push(execute_single_call(ctx, call, index).await);
        }
        for (offset, call) in discarded.iter().enumerate() {
            let tool_name = call.get("tool").and_then(Value::as_str).unwrap_or("unknown");
            results.push(json!({
                "index": MAX_BATCH_SIZE + offset,
                "tool": tool_name,
                "success": false,
                "error": format!("Maximum of {MAX_BATCH_SIZE} tools allowed in batch"),
            }));
        }

        let successful = results
            .iter()
            .filter(|r| r.get("success").and_then(Value::as_bool).unwrap_or(false))
            .count();
        let failed = results.len() - successful;

        let output = if failed > 0 {
            format!("Executed {successful}/{} tools successfully. {failed} failed.", results.len())
        } else {
            format!("All {successful} tools executed successfully.\n\nKeep using the batch tool for optimal performance!")
        };

        Ok(json!({
            "success": failed == 0,
            "title": format!("Batch execution ({successful}/{} successful)", results.len()),
            "output": output,
            "metadata": {
                "total_calls": results.len(),
                "successful": successful,
                "failed": failed,
                "details": results,
            }
        }))
    }
}

async fn execute_single_call(ctx: &ToolContext, call: &Value, index: usize) -> Value {
    let tool_name = call.get("tool").and_then(Value::as_str).unwrap_or("").to_string();
    let parameters = call.get("parameters").cloned().unwrap_or(json!({}));

    if DISALLOWED_TOOLS.contains(&tool_name.as_str()) {
        return json!({
            "index": index,
            "tool": tool_name,
            "success": false,
            "error": format!(
                "Tool '{tool_name}' is not allowed in batch. Disallowed tools: {}",
                DISALLOWED_TOOLS.join(", ")
            ),
        });
    }

    if !ctx.registry.contains(&tool_name) {
        return json!({
            "index": index,
            "tool": tool_name,
            "success": false,
            "error": format!("Tool '{tool_name}' not found in registry"),
        });
    }

    match ctx.registry.call(&tool_name, parameters, ctx).await {
        Ok(result) => json!({
            "index": index,
            "tool": tool_name,
            "success": true,
            "result": format_result(&result),
        }),
        Err(ToolError::NotFound(name)) => json!({
            "index": index,
            "tool": tool_name,
            "success": false,
            "error": format!("Tool '{name}' not found in registry"),
        }),
        Err(ToolError::Failed(msg)) => json!({
            "index": index,
            "tool": tool_name,
            "success": false,
            "error": msg,
        }),
    }
}
