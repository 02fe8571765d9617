//! The reasoning LLM oracle.
//!
//! Out of core scope per the spec ("LLM SDK client internals treated as a
//! `chat(messages) -> text` oracle"). We still need a trait seam so
//! `BaseAgent` can be driven by a fake in tests and by a real client
//! (OpenAI/Anthropic/etc, via whatever crate the embedding application
//! chooses) in production — the same seam `loom::llm::LlmClient` provides
//! for its own agent runtime.

use async_trait::async_trait;

use crate::message::Message;

/// Errors the oracle itself can surface. Distinct from [`crate::provider::ProviderError`]:
/// this is the *reasoning* model talking to itself, not the adapter
/// talking to the *target* agent under test.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm call failed: {0}")]
    CallFailed(String),
}

/// A `chat(messages) -> text` oracle.
///
/// Implementations are expected to be cheap to clone (`Arc`-wrapped) and
/// safe to share across concurrently-running `BaseAgent` instances, since
/// Stage 2 fans out several agents that each hold their own history but
/// may share one oracle.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Sends the full message history and returns the model's reply text.
    async fn chat(&self, history: &[Message]) -> Result<String, LlmError>;

    /// A short identifier used as the report's `model_name` field.
    fn model_name(&self) -> &str {
        "unknown"
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// A scripted oracle: returns the next queued response on each call,
    /// or a fixed fallback once the script is exhausted. Records every
    /// history it was called with for assertions.
    pub struct ScriptedLlm {
        script: Mutex<Vec<String>>,
        fallback: String,
        pub calls: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedLlm {
        pub fn new(script: Vec<&str>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().map(|s| s.to_string()).collect()),
                fallback: String::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Llm for ScriptedLlm {
        async fn chat(&self, history: &[Message]) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push(history.to_vec());
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                Ok(self.fallback.clone())
            } else {
                Ok(script.remove(0))
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }
}
