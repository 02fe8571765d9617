//! Per-agent context injected into context-needing tools before dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use crate::language::Language;
use crate::llm::Llm;
use crate::logger::ScanLogger;
use crate::message::Message;
use crate::prompts::PromptStore;
use crate::provider::{Provider, ProviderAdapter};

use super::ToolRegistry;

/// Snapshot of an agent's runtime state, handed to a tool at call time.
///
/// `history` is a snapshot, not a live reference, the way Rust's
/// ownership makes straightforward across an `async` boundary; the
/// owning [`crate::agent::BaseAgent`] remains the sole writer.
#[derive(Clone)]
pub struct ToolContext {
    pub llm: Arc<dyn Llm>,
    pub specialized_llms: HashMap<String, Arc<dyn Llm>>,
    pub history: Vec<Message>,
    pub agent_name: String,
    pub iteration: u32,
    pub folder: String,
    pub provider_adapter: Arc<ProviderAdapter>,
    pub provider: Arc<Provider>,
    pub language: Language,
    /// Shared, process-wide; lets `task`/`list_agents` spawn a sub-agent
    /// that can itself call every registered tool.
    pub registry: Arc<ToolRegistry>,
    pub prompts: Arc<PromptStore>,
    pub logger: Arc<ScanLogger>,
}

impl ToolContext {
    /// Sends `prompt` to the target agent through the shared adapter.
    /// Used by the `dialogue` tool; exposed here so tests can call it
    /// directly without going through dispatch.
    pub async fn call_provider(&self, prompt: &str) -> crate::provider::ProviderResult {
        self.provider_adapter.call(&self.provider, prompt).await
    }
}
