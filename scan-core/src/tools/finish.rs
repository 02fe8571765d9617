//! `finish` tool manifest stub.
//!
//! `BaseAgent::process_tool_call` intercepts `tool_name == "finish"`
//! before ever dispatching into the registry (spec §4.4 step 5), so this
//! type exists only to put a `<name>finish</name>` block into
//! `ToolRegistry::tools_prompt()`'s listing — its `call` is never reached
//! in practice.

use async_trait::async_trait;
use serde_json::Value;

use super::{Tool, ToolContext, ToolError, ToolSpec};

pub struct FinishTool;

#[async_trait]
impl Tool for FinishTool {
    fn name(&self) -> &str {
        "finish"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "finish",
            "Signal that the reasoning loop is done; triggers the final formatting round.",
        )
        .with_param("content", "string", false)
    }

    async fn call(&self, _args: Value, _ctx: Option<&ToolContext>) -> Result<Value, ToolError> {
        Err(ToolError::Failed(
            "finish is intercepted by the agent loop and never dispatched".to_string(),
        ))
    }
}
