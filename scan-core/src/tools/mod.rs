//! C2 — ToolRegistry & Dispatcher: named tools the reasoning loop can
//! invoke, with static manifests (per spec Design Notes §9's "runtime
//! reflection -> static manifests" guidance) instead of signature
//! introspection.

pub mod batch;
pub mod context;
pub mod dialogue;
pub mod dispatch;
pub mod finish;
pub mod registry;
pub mod scan;
pub mod skill;
pub mod task;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use context::ToolContext;
pub use dispatch::{dispatch, ToolError};
pub use registry::ToolRegistry;

/// A single named parameter in a [`ToolSpec`]'s manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub required: bool,
}

/// Static, build-time description of a tool: name, description, and
/// parameter manifest. Used both to build the `tools_prompt()` descriptor
/// string and, in a fuller implementation, to validate arguments before
/// dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ToolParam>,
    pub needs_context: bool,
    pub sandbox_execution: bool,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            needs_context: false,
            sandbox_execution: false,
        }
    }

    pub fn with_param(mut self, name: &str, param_type: &str, required: bool) -> Self {
        self.params.push(ToolParam {
            name: name.to_string(),
            param_type: param_type.to_string(),
            required,
        });
        self
    }

    pub fn needs_context(mut self) -> Self {
        self.needs_context = true;
        self
    }

    pub fn sandboxed(mut self) -> Self {
        self.sandbox_execution = true;
        self
    }

    /// Renders the `<name>`/`<description>`/`<parameters>` block spliced
    /// into the system prompt by `tools_prompt()`.
    pub fn render_prompt_block(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{}:{}{}", p.name, p.param_type, if p.required { " (required)" } else { "" }))
            .collect();
        format!(
            "<name>{}</name>\n<description>{}</description>\n<parameters>{}</parameters>",
            self.name,
            self.description,
            params.join(", ")
        )
    }
}

/// A tool the agent can call. Object-safe so tools can be stored behind
/// `Box<dyn Tool>` in the [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn spec(&self) -> ToolSpec;

    /// Executes the tool. `ctx` is populated only when `spec().needs_context`
    /// is set; other tools receive `None`.
    async fn call(
        &self,
        args: Value,
        ctx: Option<&ToolContext>,
    ) -> Result<Value, ToolError>;
}
