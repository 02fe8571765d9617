//! C4 — BaseAgent: the iterative reasoning loop driving one scan stage.
//!
//! An explicit `(history, iteration, state)` state machine rather than a
//! bare recursive loop: compaction is a transition instead of an
//! implicit code path, and hitting the iteration cap is reachable and
//! handled explicitly rather than guarded away.

pub mod parse;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::AgentError;
use crate::language::Language;
use crate::llm::Llm;
use crate::logger::{ScanLogger, StepStatus, ToolStatus};
use crate::message::Message;
use crate::prompts::PromptStore;
use crate::provider::{Provider, ProviderAdapter};
use crate::tools::{dispatch, ToolContext, ToolRegistry};

use parse::{clean_content, parse_tool_invocations, strip_tool_name_tag};

/// Default iteration cap.
pub const DEFAULT_MAX_ITER: u32 = 80;

const NO_TOOL_NUDGE: &str = "You didn't call any tool,please call a tool";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Ready,
    Running,
    Finished,
}

/// Everything a [`BaseAgent`] needs to exist, gathered up front so
/// construction reads as one call instead of a long field list.
pub struct BaseAgentConfig {
    pub name: String,
    pub instruction: String,
    pub llm: Arc<dyn Llm>,
    pub specialized_llms: HashMap<String, Arc<dyn Llm>>,
    pub log_step_id: String,
    pub provider: Arc<Provider>,
    pub provider_adapter: Arc<ProviderAdapter>,
    pub language: Language,
    pub registry: Arc<ToolRegistry>,
    pub prompts: Arc<PromptStore>,
    pub logger: Arc<ScanLogger>,
    /// Stage-2 detection workers set this: their output already contains
    /// `<vuln>` blocks, so `finish` should surface the raw response rather
    /// than spend an extra LLM call reformatting it.
    pub skip_finish_formatting: bool,
}

pub struct BaseAgent {
    name: String,
    instruction: String,
    llm: Arc<dyn Llm>,
    specialized_llms: HashMap<String, Arc<dyn Llm>>,
    log_step_id: String,
    provider: Arc<Provider>,
    provider_adapter: Arc<ProviderAdapter>,
    language: Language,
    registry: Arc<ToolRegistry>,
    prompts: Arc<PromptStore>,
    logger: Arc<ScanLogger>,
    skip_finish_formatting: bool,

    history: Vec<Message>,
    repo_dir: String,
    max_iter: u32,
    iter: u32,
    state: State,
    tool_usage_stats: HashMap<String, u32>,
}

impl BaseAgent {
    pub fn new(config: BaseAgentConfig) -> Self {
        Self {
            name: config.name,
            instruction: config.instruction,
            llm: config.llm,
            specialized_llms: config.specialized_llms,
            log_step_id: config.log_step_id,
            provider: config.provider,
            provider_adapter: config.provider_adapter,
            language: config.language,
            registry: config.registry,
            prompts: config.prompts,
            logger: config.logger,
            skip_finish_formatting: config.skip_finish_formatting,

            history: Vec::new(),
            repo_dir: String::new(),
            max_iter: DEFAULT_MAX_ITER,
            iter: 0,
            state: State::Init,
            tool_usage_stats: HashMap::new(),
        }
    }

    pub fn set_max_iter(&mut self, max_iter: u32) {
        self.max_iter = max_iter;
    }

    pub fn set_repo_dir(&mut self, repo_dir: impl Into<String>) {
        self.repo_dir = repo_dir.into();
    }

    pub fn add_user_message(&mut self, message: impl Into<String>) {
        self.history.push(Message::user(message));
    }

    pub fn tool_usage_stats(&self) -> &HashMap<String, u32> {
        &self.tool_usage_stats
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// `INIT -> READY`: builds and pushes the system prompt, if not
    /// already present.
    pub fn initialize(&mut self) -> Result<(), AgentError> {
        if self.history.is_empty() {
            let tools_prompt = self.registry.tools_prompt();
            let system_prompt = self.prompts.format(
                "system_prompt",
                &[
                    ("name", self.name.as_str()),
                    ("instruction", self.instruction.as_str()),
                    ("generate_tools", tools_prompt.as_str()),
                ],
            )?;
            self.history.push(Message::system(system_prompt));
        }
        self.state = State::Ready;
        Ok(())
    }

    fn next_prompt(&self) -> Result<String, AgentError> {
        let round = self.iter.to_string();
        Ok(self.prompts.format("next_prompt", &[("round", round.as_str())])?)
    }

    /// `READY -> RUNNING -> FINISHED`. Runs until the `finish` tool is
    /// invoked or the iteration cap is hit; returns the agent's final
    /// text and its per-tool call counts.
    pub async fn run(&mut self) -> Result<(String, HashMap<String, u32>), AgentError> {
        self.initialize()?;
        self.state = State::Running;

        let mut result = String::new();
        while self.state != State::Finished && self.iter < self.max_iter {
            self.logger.status_update(&self.log_step_id, "", "", StepStatus::Running);

            let response = self.llm.chat(&self.history).await?;
            self.history.push(Message::assistant(response.clone()));

            if let Some(text) = self.handle_response(&response).await? {
                result = text;
            }
            self.iter += 1;
        }

        if self.state != State::Finished {
            // Cap reached without finishing: compact once, then give up
            // with whatever text was last recorded rather than call the
            // LLM again, keeping the total LLM-call budget at `max_iter + 1`
            // where the "+1" is either this compaction call or the
            // finish-tool's formatting call.
            self.compact_history().await?;
            self.state = State::Finished;
            self.logger.status_update(&self.log_step_id, "", "", StepStatus::Completed);
        }

        Ok((result, self.tool_usage_stats.clone()))
    }

    /// Condenses `history` down to `[system, user(goal + condensed context)]`
    /// via one extra LLM call.
    async fn compact_history(&mut self) -> Result<(), AgentError> {
        if self.history.len() < 3 {
            return Ok(());
        }

        let compact_prompt = self.prompts.load("compact")?;
        let mut for_compaction = self.history[1..].to_vec();
        for_compaction.push(Message::user(compact_prompt));
        let condensed = self.llm.chat(&for_compaction).await?;

        let system_prompt = self.history[0].clone();
        let original_goal = self.history[1].content.clone();
        let user_message = format!("我希望你完成:{original_goal} \n\n有以下上下文提供你参考:\n{condensed}");
        self.history = vec![system_prompt, Message::user(user_message)];
        Ok(())
    }

    async fn handle_response(&mut self, response: &str) -> Result<Option<String>, AgentError> {
        let invocation = parse_tool_invocations(response);
        let mut description = clean_content(response);
        if description.is_empty() {
            description = match self.language {
                Language::En => "I will continue to execute".to_string(),
                Language::Zh => "我将继续执行".to_string(),
            };
        }
        self.logger
            .status_update(&self.log_step_id, &description, "", StepStatus::Running);

        match invocation {
            Some(invocation) => self.process_tool_call(invocation, response, &description).await,
            None => {
                self.handle_no_tool(&description)?;
                Ok(None)
            }
        }
    }

    async fn process_tool_call(
        &mut self,
        invocation: parse::ToolInvocation,
        raw_response: &str,
        description: &str,
    ) -> Result<Option<String>, AgentError> {
        let tool_name = invocation.tool_name;
        let tool_id = uuid::Uuid::new_v4().to_string();

        let mut params = if invocation.args.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&invocation.args).unwrap_or_default()
        };
        if !self.repo_dir.is_empty() {
            params = params.replace(&self.repo_dir, "");
        }

        self.logger.tool_used(
            &self.log_step_id,
            &tool_id,
            Some(&tool_name),
            ToolStatus::Done,
            &tool_name,
            &params,
        );
        *self.tool_usage_stats.entry(tool_name.clone()).or_insert(0) += 1;

        if tool_name == "finish" {
            self.state = State::Finished;
            let result = if self.skip_finish_formatting {
                strip_tool_name_tag(raw_response)
            } else {
                self.format_final_output().await?
            };
            self.logger
                .status_update(&self.log_step_id, description, "", StepStatus::Completed);
            self.logger.action_log(&tool_id, &tool_name, &self.log_step_id, &result);
            return Ok(Some(result));
        }

        let ctx = ToolContext {
            llm: self.llm.clone(),
            specialized_llms: self.specialized_llms.clone(),
            history: self.history.clone(),
            agent_name: self.name.clone(),
            iteration: self.iter,
            folder: self.repo_dir.clone(),
            provider_adapter: self.provider_adapter.clone(),
            provider: self.provider.clone(),
            language: self.language,
            registry: self.registry.clone(),
            prompts: self.prompts.clone(),
            logger: self.logger.clone(),
        };

        let args_value = Value::Object(invocation.args);
        let tool_result = dispatch(&self.registry, &tool_name, args_value, &ctx).await;

        let next_p = self.next_prompt()?;
        let full_message = format!("{next_p}\n---\n{tool_result}");
        self.history.push(Message::user(full_message));

        self.logger
            .status_update(&self.log_step_id, description, "", StepStatus::Completed);
        if tool_name != "read_file" {
            self.logger
                .action_log(&tool_id, &tool_name, &self.log_step_id, &format!("```\n{tool_result}\n```"));
        }

        Ok(None)
    }

    fn handle_no_tool(&mut self, description: &str) -> Result<(), AgentError> {
        let next_p = self.next_prompt()?;
        let full_message = format!("{next_p}\n\n{NO_TOOL_NUDGE}");
        self.history.push(Message::user(full_message));
        self.logger
            .status_update(&self.log_step_id, description, "", StepStatus::Completed);
        Ok(())
    }

    /// Re-prompts the LLM with `(history[1:] + format_report(instruction))`
    /// to produce the finish-tool's final formatted text.
    async fn format_final_output(&mut self) -> Result<String, AgentError> {
        let formatting_prompt = self
            .prompts
            .format("format_report", &[("output_format", &self.instruction)])?;
        let mut recent_history = self.history[1..].to_vec();
        recent_history.push(Message::user(formatting_prompt));
        Ok(self.llm.chat(&recent_history).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::ScriptedLlm;
    use crate::provider::catalog::ProviderCatalog;
    use crate::provider::{ProviderConfig, ProviderSpec};

    fn config(llm: Arc<dyn Llm>) -> BaseAgentConfig {
        let catalog = ProviderCatalog::empty();
        let spec = ProviderSpec {
            id: "nonexistent".to_string(),
            label: None,
            delay_ms: None,
            config: ProviderConfig::default(),
        };
        let provider = Provider::build(spec, &catalog);
        BaseAgentConfig {
            name: "Information Collection".to_string(),
            instruction: "gather background info".to_string(),
            llm,
            specialized_llms: HashMap::new(),
            log_step_id: "1".to_string(),
            provider: Arc::new(provider),
            provider_adapter: Arc::new(ProviderAdapter::with_default_client(catalog)),
            language: Language::En,
            registry: Arc::new(ToolRegistry::new()),
            prompts: Arc::new(PromptStore::with_embedded_defaults()),
            logger: Arc::new(ScanLogger::with_sink(|_| {})),
            skip_finish_formatting: false,
        }
    }

    #[tokio::test]
    async fn finish_tool_ends_the_loop_and_runs_formatting_round() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            "<tool_name>finish</tool_name>",
            "Final formatted report text",
        ]));
        let mut agent = BaseAgent::new(config(llm.clone()));
        agent.add_user_message("begin the scan");
        let (result, stats) = agent.run().await.unwrap();
        assert_eq!(result, "Final formatted report text");
        assert_eq!(stats.get("finish"), Some(&1));
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn skip_finish_formatting_returns_raw_assistant_text_without_extra_llm_call() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            "<vuln><title>t</title></vuln><tool_name>finish</tool_name>",
        ]));
        let mut config = config(llm.clone());
        config.skip_finish_formatting = true;
        let mut agent = BaseAgent::new(config);
        agent.add_user_message("begin");
        let (result, _) = agent.run().await.unwrap();
        assert_eq!(result, "<vuln><title>t</title></vuln>");
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn missing_invocation_nudges_and_continues() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            "just thinking, no tool call here",
            "<tool_name>finish</tool_name>",
            "done",
        ]));
        let mut agent = BaseAgent::new(config(llm.clone()));
        agent.add_user_message("begin");
        let (result, _) = agent.run().await.unwrap();
        assert_eq!(result, "done");
        let nudge_turn = &agent.history()[3];
        assert!(nudge_turn.content.contains("You didn't call any tool"));
    }

    #[tokio::test]
    async fn p4_terminates_within_max_iter_plus_one_llm_calls() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let mut agent = BaseAgent::new(config(llm.clone()));
        agent.set_max_iter(3);
        agent.add_user_message("begin");
        let (_, _) = agent.run().await.unwrap();
        assert!(llm.call_count() <= 4);
    }

    #[tokio::test]
    async fn runaway_without_finish_still_emits_terminal_status_and_some_result() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            "<tool_name>unknown_tool</tool_name>",
            "<tool_name>unknown_tool</tool_name>",
        ]));
        let mut agent = BaseAgent::new(config(llm));
        agent.set_max_iter(2);
        agent.add_user_message("begin");
        let (_, stats) = agent.run().await.unwrap();
        assert_eq!(stats.get("unknown_tool"), Some(&2));
    }

    #[tokio::test]
    async fn repo_dir_is_redacted_from_logged_tool_params_but_not_history() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            "<tool_name>read</tool_name><path>/tmp/scan-target/src/main.rs</path>",
            "<tool_name>finish</tool_name>",
            "done",
        ]));
        let lines = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink_lines = lines.clone();
        let mut config = config(llm);
        config.logger = Arc::new(ScanLogger::with_sink(move |l| sink_lines.lock().unwrap().push(l.to_string())));
        let mut agent = BaseAgent::new(config);
        agent.set_repo_dir("/tmp/scan-target");
        agent.add_user_message("begin");
        agent.run().await.unwrap();

        let tool_used_lines: Vec<String> = lines
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.contains("toolUsed"))
            .cloned()
            .collect();
        assert!(tool_used_lines.iter().any(|l| !l.contains("/tmp/scan-target")));
    }
}
