//! Wires the reasoning oracle (`scan_core::Llm`) onto the same
//! `ProviderAdapter`/`ProviderCatalog` machinery `scan-core` already uses
//! to talk to the *target* agent under test (spec §1: "LLM SDK client
//! internals treated as a `chat(messages) -> text` oracle" — this is the
//! one concrete implementation of that oracle a buildable binary needs).
//!
//! Flattens the message history into one prompt string the way a plain
//! completion-style HTTP call expects, since `ProviderAdapter::call`
//! takes a single `prompt: &str` rather than a structured turn list.

use std::sync::Arc;

use async_trait::async_trait;
use scan_core::message::{Message, Role};
use scan_core::{Llm, Provider, ProviderAdapter};

pub struct ProviderBackedLlm {
    adapter: Arc<ProviderAdapter>,
    provider: Arc<Provider>,
    model_name: String,
}

impl ProviderBackedLlm {
    pub fn new(adapter: Arc<ProviderAdapter>, provider: Arc<Provider>, model_name: String) -> Self {
        Self {
            adapter,
            provider,
            model_name,
        }
    }
}

fn flatten(history: &[Message]) -> String {
    let mut out = String::new();
    for message in history {
        let role = match message.role {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        out.push_str(role);
        out.push_str(": ");
        out.push_str(&message.content);
        out.push('\n');
    }
    out.push_str("Assistant:");
    out
}

#[async_trait]
impl Llm for ProviderBackedLlm {
    async fn chat(&self, history: &[Message]) -> Result<String, scan_core::llm::LlmError> {
        let prompt = flatten(history);
        let result = self.adapter.call(&self.provider, &prompt).await;
        if result.success {
            Ok(result.response.output.unwrap_or_default())
        } else {
            Err(scan_core::llm::LlmError::CallFailed(result.message))
        }
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
