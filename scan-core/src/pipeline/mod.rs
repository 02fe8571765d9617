//! C5 — ScanPipeline: sequential stage runner plus the Stage-2 parallel
//! detection fan-out under a bounded semaphore.
//!
//! Stage 1 and Stage 3 are a single sequential `execute_stage` call each;
//! `run_parallel_detection` fans Stage 2 out across several skill workers
//! under a bounded `Semaphore`, then merges their findings back together.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use std::sync::OnceLock;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::agent::{BaseAgent, BaseAgentConfig};
use crate::error::AgentError;
use crate::language::Language;
use crate::llm::Llm;
use crate::logger::ScanLogger;
use crate::prompts::PromptStore;
use crate::provider::{Provider, ProviderAdapter};
use crate::tools::ToolRegistry;

/// The four built-in Stage-2 detection skills, in the fixed order their
/// stats and merged XML are reported in.
pub const DETECTION_SKILLS: &[&str] = &[
    "data-leakage-detection",
    "tool-abuse-detection",
    "indirect-injection-detection",
    "authorization-bypass-detection",
];

/// Hard cap on simultaneous `ProviderAdapter` calls during Stage 2 (spec
/// §5 P2) regardless of how many skill workers exist.
const STAGE2_CONCURRENCY: usize = 4;

fn vuln_block_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<vuln>.*?</vuln>").unwrap())
}

/// One stage in the pipeline: which template to load, what stage id to
/// tag its log events with, and which language to seed its opener in.
#[derive(Debug, Clone)]
pub struct ScanStage {
    pub stage_id: String,
    pub name: String,
    pub template: String,
    pub language: Language,
}

impl ScanStage {
    pub fn new(stage_id: impl Into<String>, name: impl Into<String>, template: impl Into<String>, language: Language) -> Self {
        Self {
            stage_id: stage_id.into(),
            name: name.into(),
            template: template.into(),
            language,
        }
    }
}

/// Everything `ScanPipeline` needs to construct a stage's `BaseAgent`,
/// shared across every stage and worker in one scan, process-wide and
/// immutable after initialization.
#[derive(Clone)]
pub struct ScanPipeline {
    pub llm: Arc<dyn Llm>,
    pub specialized_llms: HashMap<String, Arc<dyn Llm>>,
    pub provider: Arc<Provider>,
    pub provider_adapter: Arc<ProviderAdapter>,
    pub registry: Arc<ToolRegistry>,
    pub prompts: Arc<PromptStore>,
    pub logger: Arc<ScanLogger>,
}

impl ScanPipeline {
    /// `execute_stage(stage, repo_dir, prompt, context_data?) -> (text, stats)`.
    pub async fn execute_stage(
        &self,
        stage: &ScanStage,
        repo_dir: &str,
        prompt: &str,
        context_data: &[(&str, &str)],
    ) -> Result<(String, HashMap<String, u32>), AgentError> {
        self.execute_stage_with(stage, repo_dir, prompt, context_data, false).await
    }

    /// As [`Self::execute_stage`], but lets Stage-2 workers skip the
    /// finish-tool's extra formatting round: their output already
    /// contains `<vuln>` blocks, so the raw assistant response is the
    /// agent's final text.
    async fn execute_stage_with(
        &self,
        stage: &ScanStage,
        repo_dir: &str,
        prompt: &str,
        context_data: &[(&str, &str)],
        skip_finish_formatting: bool,
    ) -> Result<(String, HashMap<String, u32>), AgentError> {
        self.logger.new_plan_step(&stage.stage_id, &stage.name);

        let instruction = self.prompts.load(&stage.template)?;
        let config = BaseAgentConfig {
            name: format!("{} Agent", stage.name),
            instruction,
            llm: self.llm.clone(),
            specialized_llms: self.specialized_llms.clone(),
            log_step_id: stage.stage_id.clone(),
            provider: self.provider.clone(),
            provider_adapter: self.provider_adapter.clone(),
            language: stage.language,
            registry: self.registry.clone(),
            prompts: self.prompts.clone(),
            logger: self.logger.clone(),
            skip_finish_formatting,
        };
        let mut agent = BaseAgent::new(config);

        let mut user_msg = String::new();
        if !repo_dir.is_empty() {
            agent.set_repo_dir(repo_dir);
            user_msg = match stage.language {
                Language::Zh => format!("请进行{}，文件夹在 {repo_dir}\n{prompt}", stage.name),
                Language::En => format!("Please perform {}, folder at {repo_dir}\n{prompt}", stage.name),
            };
        }
        for (key, value) in context_data {
            user_msg.push_str(&format!("\n\n{key}:{value}\n\n"));
        }
        agent.add_user_message(user_msg);

        agent.run().await
    }

    /// `run_parallel_detection(recon_report, repo_dir, prompt) -> (merged_xml, stats)`.
    ///
    /// Spawns one worker per [`DETECTION_SKILLS`] entry; all workers share
    /// a single `Semaphore(4)` gating entry into their `dialogue` calls
    /// indirectly by gating the worker's whole run. Worker count equals
    /// the cap today, so this serializes nothing yet, but it bounds
    /// future growth of the skill list.
    pub async fn run_parallel_detection(
        &self,
        recon_report: &str,
        repo_dir: &str,
        prompt: &str,
    ) -> (String, HashMap<String, u32>) {
        let semaphore = Arc::new(Semaphore::new(STAGE2_CONCURRENCY));
        let mut join_set = JoinSet::new();

        for (index, skill_name) in DETECTION_SKILLS.iter().enumerate() {
            let pipeline = self.clone();
            let sem = semaphore.clone();
            let stage_id = format!("2{}", (b'a' + index as u8) as char);
            let skill_name = skill_name.to_string();
            let recon_report = recon_report.to_string();
            let repo_dir = repo_dir.to_string();
            let prompt = prompt.to_string();

            join_set.spawn(async move {
                let _permit = sem.acquire_owned().await;
                let stage = ScanStage::new(stage_id, skill_name.clone(), skill_name.clone(), Language::En);
                let context = [
                    ("Information Collection Report", recon_report.as_str()),
                    ("Assigned Skill", skill_name.as_str()),
                ];
                pipeline
                    .execute_stage_with(&stage, &repo_dir, &prompt, &context, true)
                    .await
            });
        }

        let mut blocks: Vec<String> = Vec::new();
        let mut merged_stats: HashMap<String, u32> = HashMap::new();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok((text, stats))) => {
                    for cap in vuln_block_pattern().find_iter(&text) {
                        blocks.push(cap.as_str().to_string());
                    }
                    for (tool, count) in stats {
                        *merged_stats.entry(tool).or_insert(0) += count;
                    }
                }
                Ok(Err(e)) => self.logger.error(&format!("stage 2 worker failed: {e}")),
                Err(e) => self.logger.error(&format!("stage 2 worker panicked: {e}")),
            }
        }

        let merged_xml = if blocks.is_empty() {
            "No vulnerabilities confirmed.".to_string()
        } else {
            blocks.join("\n\n")
        };
        (merged_xml, merged_stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::ScriptedLlm;
    use crate::provider::catalog::ProviderCatalog;
    use crate::provider::{ProviderConfig, ProviderSpec};

    fn pipeline(llm: Arc<dyn Llm>) -> ScanPipeline {
        let catalog = ProviderCatalog::empty();
        let spec = ProviderSpec {
            id: "nonexistent".to_string(),
            label: None,
            delay_ms: None,
            config: ProviderConfig::default(),
        };
        let provider = Provider::build(spec, &catalog);
        ScanPipeline {
            llm,
            specialized_llms: HashMap::new(),
            provider: Arc::new(provider),
            provider_adapter: Arc::new(ProviderAdapter::with_default_client(catalog)),
            registry: Arc::new(ToolRegistry::new()),
            prompts: Arc::new(PromptStore::with_embedded_defaults()),
            logger: Arc::new(ScanLogger::with_sink(|_| {})),
        }
    }

    #[tokio::test]
    async fn execute_stage_seeds_english_opener_with_repo_dir() {
        let llm = Arc::new(ScriptedLlm::new(vec!["<tool_name>finish</tool_name>", "done"]));
        let p = pipeline(llm.clone());
        let stage = ScanStage::new("1", "Information Collection", "project_summary", Language::En);
        let (text, _) = p.execute_stage(&stage, "/tmp/target", "look for leaks", &[]).await.unwrap();
        assert_eq!(text, "done");
        let first_user_turn = &llm.calls.lock().unwrap()[0];
        assert!(first_user_turn
            .iter()
            .any(|m| m.content.contains("Please perform Information Collection, folder at /tmp/target")));
    }

    #[tokio::test]
    async fn run_parallel_detection_merges_vuln_blocks_from_all_workers() {
        let script = vec!["<vuln><title>t</title><desc>d</desc><risk_type>ASI01</risk_type></vuln>"];
        let llm = Arc::new(ScriptedLlm::new(script));
        let p = pipeline(llm);
        let (merged, _) = p.run_parallel_detection("recon text", "", "prompt").await;
        assert_eq!(merged.matches("<vuln>").count(), DETECTION_SKILLS.len());
    }

    #[tokio::test]
    async fn run_parallel_detection_falls_back_when_no_blocks_found() {
        let llm = Arc::new(ScriptedLlm::new(vec!["no findings here"]));
        let p = pipeline(llm);
        let (merged, _) = p.run_parallel_detection("recon", "", "prompt").await;
        assert_eq!(merged, "No vulnerabilities confirmed.");
    }
}
