//! C8 — Orchestrator: wires C1-C7 together, owns the scan lifecycle, and
//! surfaces the final typed report.
//!
//! Grounded in `original_source/agent-scan/core/scanner.py`'s top-level
//! `scan()` (stage sequencing, stat accumulation, report assembly) and in
//! the teacher's own `loom::runtime`-style "build once, run many" entry
//! point: every long-lived dependency (client, semaphore, registry,
//! catalog) is constructed once in [`Orchestrator::new`] and shared via
//! `Arc` rather than rebuilt per call (spec §5).

use std::collections::HashMap;
use std::sync::Arc;

use walkdir::WalkDir;

use crate::error::OrchestratorError;
use crate::language::Language;
use crate::llm::Llm;
use crate::logger::ScanLogger;
use crate::pipeline::{ScanPipeline, ScanStage};
use crate::prompts::PromptStore;
use crate::provider::{Provider, ProviderAdapter};
use crate::report::{self, ReportMetadata};
use crate::tools::batch::BatchTool;
use crate::tools::dialogue::DialogueTool;
use crate::tools::finish::FinishTool;
use crate::tools::scan::ScanTool;
use crate::tools::skill::{LoadSkillTool, SearchSkillTool};
use crate::tools::task::{ListAgentsTool, TaskTool};
use crate::tools::ToolRegistry;
use crate::AgentSecurityReport;

/// Extensions mapped to a human-readable source language, used to guess
/// the scanned repo's dominant language for the report's `language`
/// field (spec §4.8 step 5). Not exhaustive; unknown extensions simply
/// don't vote.
const LANGUAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("rs", "Rust"),
    ("py", "Python"),
    ("ts", "TypeScript"),
    ("tsx", "TypeScript"),
    ("js", "JavaScript"),
    ("jsx", "JavaScript"),
    ("go", "Go"),
    ("java", "Java"),
    ("rb", "Ruby"),
    ("c", "C"),
    ("h", "C"),
    ("cpp", "C++"),
    ("cc", "C++"),
    ("hpp", "C++"),
    ("cs", "C#"),
    ("php", "PHP"),
    ("kt", "Kotlin"),
    ("swift", "Swift"),
];

fn merge_stats(into: &mut HashMap<String, u32>, from: HashMap<String, u32>) {
    for (tool, count) in from {
        *into.entry(tool).or_insert(0) += count;
    }
}

/// Counts source file extensions under `repo_dir` and returns the
/// best-represented language name, or `"unknown"` when `repo_dir` is
/// empty, unreadable, or has no recognized extensions.
fn detect_dominant_language(repo_dir: &str) -> String {
    if repo_dir.is_empty() {
        return "unknown".to_string();
    }
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for entry in WalkDir::new(repo_dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let ext = ext.to_lowercase();
        if let Some((_, lang)) = LANGUAGE_EXTENSIONS.iter().find(|(e, _)| *e == ext) {
            *counts.entry(lang).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(lang, _)| lang.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Builds the tool registry shared by every stage's `BaseAgent`. Static,
/// built once per scan (spec Design Notes §9: static manifests, no
/// runtime reflection).
fn build_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(DialogueTool));
    registry.register(Box::new(ScanTool));
    registry.register(Box::new(SearchSkillTool));
    registry.register(Box::new(LoadSkillTool));
    registry.register(Box::new(TaskTool));
    registry.register(Box::new(ListAgentsTool));
    registry.register(Box::new(FinishTool));
    registry.register(Box::new(BatchTool));
    registry
}

/// Entry point: owns every process-wide shared dependency and drives one
/// scan's three-stage pipeline end to end.
pub struct Orchestrator {
    pipeline: ScanPipeline,
}

impl Orchestrator {
    /// `llm` is the reasoning oracle driving every `BaseAgent`;
    /// `specialized_llms` are named alternates a template may request;
    /// `provider`/`provider_adapter` target the agent under test.
    pub fn new(
        llm: Arc<dyn Llm>,
        specialized_llms: HashMap<String, Arc<dyn Llm>>,
        provider: Provider,
        provider_adapter: ProviderAdapter,
        prompts: PromptStore,
        logger: Arc<ScanLogger>,
    ) -> Self {
        Self {
            pipeline: ScanPipeline {
                llm,
                specialized_llms,
                provider: Arc::new(provider),
                provider_adapter: Arc::new(provider_adapter),
                registry: Arc::new(build_registry()),
                prompts: Arc::new(prompts),
                logger,
            },
        }
    }

    /// `scan(repo_dir, prompt) -> AgentSecurityReport` (spec §4.8).
    pub async fn scan(&self, repo_dir: &str, prompt: &str) -> Result<AgentSecurityReport, OrchestratorError> {
        let start_time = chrono::Utc::now().timestamp();
        let mut stats: HashMap<String, u32> = HashMap::new();

        let stage1 = ScanStage::new("1", "Information Collection", "project_summary", Language::En);
        let (stage1_text, stage1_stats) = self
            .pipeline
            .execute_stage(&stage1, repo_dir, prompt, &[])
            .await
            .map_err(|e| OrchestratorError::StageFailed {
                stage: "1".to_string(),
                message: e.to_string(),
            })?;
        merge_stats(&mut stats, stage1_stats);

        let (stage2_xml, stage2_stats) = self.pipeline.run_parallel_detection(&stage1_text, repo_dir, prompt).await;
        merge_stats(&mut stats, stage2_stats);

        let stage3 = ScanStage::new("3", "Vulnerability Review", "agent_security_reviewer", Language::En);
        let context = [("Vulnerability Detection Report", stage2_xml.as_str())];
        let (stage3_text, stage3_stats) = self
            .pipeline
            .execute_stage(&stage3, repo_dir, prompt, &context)
            .await
            .map_err(|e| OrchestratorError::StageFailed {
                stage: "3".to_string(),
                message: e.to_string(),
            })?;
        merge_stats(&mut stats, stage3_stats);

        let end_time = chrono::Utc::now().timestamp();
        let language = detect_dominant_language(repo_dir);

        let provider_spec = self.pipeline.provider.spec();
        let agent_type = provider_spec
            .id
            .split(':')
            .next()
            .unwrap_or(&provider_spec.id)
            .to_string();
        let agent_name = provider_spec.label.clone().unwrap_or_else(|| provider_spec.id.clone());

        let total_dialogue_count: usize = stats.values().map(|n| *n as usize).sum();
        let metadata = ReportMetadata {
            agent_name,
            agent_type,
            model_name: self.pipeline.llm.model_name().to_string(),
            start_time,
            end_time,
            plugins: Vec::new(),
            language,
            total_dialogue_count: Some(total_dialogue_count),
        };
        let report = report::build(&stage3_text, &metadata);

        self.pipeline
            .logger
            .result_update(serde_json::to_value(&report).unwrap_or_default());

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::ScriptedLlm;
    use crate::provider::catalog::ProviderCatalog;
    use crate::provider::{ProviderConfig, ProviderSpec};

    fn orchestrator(llm: Arc<dyn Llm>) -> Orchestrator {
        let catalog = ProviderCatalog::empty();
        let spec = ProviderSpec {
            id: "nonexistent:model".to_string(),
            label: Some("Test Target".to_string()),
            delay_ms: None,
            config: ProviderConfig::default(),
        };
        let provider = Provider::build(spec, &catalog);
        Orchestrator::new(
            llm,
            HashMap::new(),
            provider,
            ProviderAdapter::with_default_client(catalog),
            PromptStore::with_embedded_defaults(),
            Arc::new(ScanLogger::with_sink(|_| {})),
        )
    }

    #[tokio::test]
    async fn scan_runs_all_three_stages_and_builds_a_report() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            "<tool_name>finish</tool_name>",
            "recon findings",
            "<vuln><title>leak</title><desc>d</desc><risk_type>ASI01</risk_type></vuln><tool_name>finish</tool_name>",
            "<vuln><title>leak</title><desc>d</desc><risk_type>ASI01</risk_type></vuln><tool_name>finish</tool_name>",
            "<vuln><title>leak</title><desc>d</desc><risk_type>ASI01</risk_type></vuln><tool_name>finish</tool_name>",
            "<vuln><title>leak</title><desc>d</desc><risk_type>ASI01</risk_type></vuln><tool_name>finish</tool_name>",
            "<tool_name>finish</tool_name>",
            "final review",
        ]));
        let orch = orchestrator(llm);
        let report = orch.scan("", "look for leaks").await.unwrap();
        assert_eq!(report.agent_type, "nonexistent");
        assert_eq!(report.agent_name, "Test Target");
        assert_eq!(report.language, "unknown");
        assert!(report.total_tests >= 1);
    }

    #[test]
    fn detect_dominant_language_returns_unknown_for_empty_repo_dir() {
        assert_eq!(detect_dominant_language(""), "unknown");
    }

    #[test]
    fn detect_dominant_language_picks_the_most_common_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join("b.rs"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join("c.py"), "pass").unwrap();
        let lang = detect_dominant_language(dir.path().to_str().unwrap());
        assert_eq!(lang, "Rust");
    }
}
