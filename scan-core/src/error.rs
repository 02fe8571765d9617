//! Per-component typed errors (spec §7's error taxonomy). Library code
//! never panics on bad input; `unwrap`/`expect` are reserved for test code
//! and invariants already checked upstream.

use thiserror::Error;

/// Configuration errors: missing provider file, unknown provider type,
/// missing required credentials. Fail fast — no partial report.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("provider config file not found: {0}")]
    FileNotFound(String),
    #[error("failed to read {path}: {message}")]
    ReadFailed { path: String, message: String },
    #[error("failed to parse {path} as YAML: {message}")]
    ParseFailed { path: String, message: String },
    #[error("provider config has neither 'providers:' nor 'targets:' list")]
    NoProviderList,
}

/// Catastrophic orchestrator failure: Stage 1 or Stage 3 raised an
/// uncaught condition. Aborts the scan; no partial report is returned.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("stage '{stage}' failed: {message}")]
    StageFailed { stage: String, message: String },
}

/// BaseAgent failure. Iteration-cap runaway is handled as a state
/// transition (spec §4.4), not an error variant here — this enum only
/// covers conditions the reasoning loop itself cannot recover from.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("llm call failed: {0}")]
    Llm(#[from] crate::llm::LlmError),
    #[error("prompt template error: {0}")]
    Prompt(#[from] crate::prompts::PromptError),
}
