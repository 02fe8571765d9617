//! C7 — ScanLogger: a single structured-event sink the reasoning loop
//! publishes to, distinct from `tracing`'s operator-facing diagnostics.
//!
//! Directly grounded in `original_source/agent-scan/utils/aig_logger.py`:
//! each event type gets its own struct with a unix-time `timestamp`, and
//! every emission is one `{"type": ..., "content": {...}}` JSON line —
//! reproduced verbatim since an external UI already consumes this exact
//! envelope shape.

use std::sync::Mutex;

use serde::Serialize;
use serde_json::{json, Value};

fn unix_now() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Todo,
    Doing,
    Done,
}

#[derive(Debug, Serialize)]
struct NewPlanStep<'a> {
    timestamp: String,
    #[serde(rename = "stepId")]
    step_id: &'a str,
    title: &'a str,
}

#[derive(Debug, Serialize)]
struct StatusUpdate<'a> {
    timestamp: String,
    #[serde(rename = "stepId")]
    step_id: &'a str,
    brief: &'a str,
    description: &'a str,
    status: StepStatus,
}

#[derive(Debug, Serialize)]
struct ToolUsed<'a> {
    timestamp: String,
    #[serde(rename = "stepId")]
    step_id: &'a str,
    tool_id: &'a str,
    tool_name: Option<&'a str>,
    brief: &'a str,
    status: ToolStatus,
    params: &'a str,
}

#[derive(Debug, Serialize)]
struct ActionLog<'a> {
    timestamp: String,
    tool_id: &'a str,
    tool_name: &'a str,
    #[serde(rename = "stepId")]
    step_id: &'a str,
    log: &'a str,
}

#[derive(Debug, Serialize)]
struct ErrorLog<'a> {
    timestamp: String,
    msg: &'a str,
}

#[derive(Debug, Serialize)]
struct AgentMsg {
    #[serde(rename = "type")]
    event_type: &'static str,
    content: Value,
}

/// Structured event sink. Safe to call concurrently: every emission goes
/// through a single `Mutex`-guarded writer so interleaved JSON lines
/// never happen even when Stage 2 fans out several workers.
pub struct ScanLogger {
    sink: Mutex<Box<dyn FnMut(&str) + Send>>,
}

impl ScanLogger {
    /// Writes every event as one JSON line to stdout.
    pub fn new() -> Self {
        Self::with_sink(|line| println!("{line}"))
    }

    /// Custom sink, for tests and for embedding applications that want
    /// to route events elsewhere (a channel, a file, an in-memory buffer).
    pub fn with_sink(sink: impl FnMut(&str) + Send + 'static) -> Self {
        Self {
            sink: Mutex::new(Box::new(sink)),
        }
    }

    fn emit(&self, event_type: &'static str, content: Value) {
        let msg = AgentMsg { event_type, content };
        let line = serde_json::to_string(&msg).unwrap_or_default();
        (self.sink.lock().unwrap())(&line);
    }

    pub fn new_plan_step(&self, step_id: &str, title: &str) {
        self.emit(
            "newPlanStep",
            json!(NewPlanStep {
                timestamp: unix_now(),
                step_id,
                title,
            }),
        );
    }

    pub fn status_update(&self, step_id: &str, brief: &str, description: &str, status: StepStatus) {
        self.emit(
            "statusUpdate",
            json!(StatusUpdate {
                timestamp: unix_now(),
                step_id,
                brief,
                description,
                status,
            }),
        );
    }

    pub fn tool_used(
        &self,
        step_id: &str,
        tool_id: &str,
        tool_name: Option<&str>,
        status: ToolStatus,
        brief: &str,
        params: &str,
    ) {
        self.emit(
            "toolUsed",
            json!(ToolUsed {
                timestamp: unix_now(),
                step_id,
                tool_id,
                tool_name,
                brief,
                status,
                params,
            }),
        );
    }

    pub fn action_log(&self, tool_id: &str, tool_name: &str, step_id: &str, log: &str) {
        self.emit(
            "actionLog",
            json!(ActionLog {
                timestamp: unix_now(),
                tool_id,
                tool_name,
                step_id,
                log,
            }),
        );
    }

    /// Publishes the final scan result. `content` is typically the
    /// serialized [`crate::report::AgentSecurityReport`].
    pub fn result_update(&self, content: Value) {
        self.emit("resultUpdate", content);
    }

    pub fn error(&self, msg: &str) {
        self.emit("error", json!(ErrorLog { timestamp: unix_now(), msg }));
    }
}

impl Default for ScanLogger {
    fn default() -> Self {
        Self::new()
    }
}
