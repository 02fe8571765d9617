//! C3 — PromptStore: loads named prompt templates and performs
//! `{placeholder}`/`${placeholder}` substitution.
//!
//! Grounded in `loom/src/prompts/load.rs`'s directory/env-override chain,
//! generalized from per-subsystem YAML to markdown-per-template-name, the
//! way `original_source/agent-scan/utils/prompt_manager.py`'s
//! `PromptManager` works (`load_template`/`format_prompt`). Default text
//! is embedded at compile time via `include_str!`, matching the teacher's
//! `embed_prompt_yaml!` macro.

pub mod agents;
pub mod skills;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use chrono::Local;
use thiserror::Error;

/// Names of the built-in templates with embedded default text.
macro_rules! embed_system_prompt {
    ($name:literal) => {
        include_str!(concat!("../../prompts/system/", $name, ".md"))
    };
}

const DEFAULTS: &[(&str, &str)] = &[
    ("system_prompt", embed_system_prompt!("system_prompt")),
    ("next_prompt", embed_system_prompt!("next_prompt")),
    ("compact", embed_system_prompt!("compact")),
    ("format_report", embed_system_prompt!("format_report")),
    ("project_summary", embed_system_prompt!("project_summary")),
    (
        "agent_security_reviewer",
        embed_system_prompt!("agent_security_reviewer"),
    ),
    (
        "data-leakage-detection",
        embed_system_prompt!("data-leakage-detection"),
    ),
    (
        "tool-abuse-detection",
        embed_system_prompt!("tool-abuse-detection"),
    ),
    (
        "indirect-injection-detection",
        embed_system_prompt!("indirect-injection-detection"),
    ),
    (
        "authorization-bypass-detection",
        embed_system_prompt!("authorization-bypass-detection"),
    ),
];

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt template '{0}' not found")]
    TemplateNotFound(String),
}

/// Loads `prompt/system/<name>.md`, cached per process. Falls back to the
/// embedded defaults above when neither an override directory nor an
/// on-disk file provides the name, so the crate is self-contained without
/// external assets at runtime.
pub struct PromptStore {
    dir: Option<PathBuf>,
    cache: RwLock<HashMap<String, String>>,
}

impl PromptStore {
    /// Uses the given directory as an override source; falls back to
    /// embedded defaults for any name not found there.
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_embedded_defaults() -> Self {
        Self::new(None)
    }

    /// `load(name) -> string`. Cached per process; missing template
    /// (neither on disk nor embedded) fails with `TemplateNotFound`.
    pub fn load(&self, name: &str) -> Result<String, PromptError> {
        if let Some(hit) = self.cache.read().unwrap().get(name) {
            return Ok(hit.clone());
        }

        let content = self
            .read_override(name)
            .or_else(|| self.embedded(name))
            .ok_or_else(|| PromptError::TemplateNotFound(name.to_string()))?;

        self.cache
            .write()
            .unwrap()
            .insert(name.to_string(), content.clone());
        Ok(content)
    }

    fn read_override(&self, name: &str) -> Option<String> {
        let dir = self.dir.as_ref()?;
        let path = dir.join(format!("{name}.md"));
        std::fs::read_to_string(path).ok()
    }

    fn embedded(&self, name: &str) -> Option<String> {
        DEFAULTS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, text)| text.to_string())
    }

    /// `format(name, vars) -> string`: load then substitute `{key}` and
    /// `${key}`. `${NOWTIME}` defaults to the current time when present
    /// and not explicitly supplied. Unknown placeholders are left
    /// untouched.
    pub fn format(&self, name: &str, vars: &[(&str, &str)]) -> Result<String, PromptError> {
        let template = self.load(name)?;
        let mut out = template;

        if out.contains("${NOWTIME}") && !vars.iter().any(|(k, _)| *k == "NOWTIME") {
            let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            out = out.replace("${NOWTIME}", &now);
        }

        for (key, value) in vars {
            out = out.replace(&format!("{{{key}}}"), value);
            out = out.replace(&format!("${{{key}}}"), value);
        }
        Ok(out)
    }
}

impl Default for PromptStore {
    fn default() -> Self {
        Self::with_embedded_defaults()
    }
}
