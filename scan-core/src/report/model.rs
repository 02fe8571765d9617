//! Typed report data model (spec §3), built once at scan end from the
//! merged review XML. Findings are immutable thereafter.

use serde::{Deserialize, Serialize};

/// Severity bucket a finding is normalized into (spec §4.6 step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::High => "High",
            Level::Medium => "Medium",
            Level::Low => "Low",
        }
    }
}

/// One turn of an attached conversation transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// One parsed, accepted `<vuln>` block after placeholder filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnerabilityFinding {
    pub id: String,
    #[serde(rename = "type")]
    pub finding_type: String,
    pub title: String,
    pub description: String,
    pub level: Level,
    pub owasp: Vec<String>,
    pub suggestion: String,
    pub conversation: Vec<ConversationTurn>,
}

/// Per-ASI-category rollup of the findings above.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwaspAsiSummary {
    pub id: String,
    pub name: String,
    pub total: usize,
    pub high_or_above: usize,
    pub max_level: Level,
    pub findings: Vec<String>,
}

/// The scanner's terminal output: `schema_version: "agent-security-report@1"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSecurityReport {
    pub schema_version: String,
    pub agent_name: String,
    pub agent_type: String,
    pub model_name: String,
    pub start_time: i64,
    pub end_time: i64,
    pub plugins: Vec<String>,
    pub score: i64,
    pub risk_type: RiskType,
    pub total_tests: usize,
    pub vulnerable_tests: usize,
    pub results: Vec<VulnerabilityFinding>,
    #[serde(rename = "owasp_agentic_2026_top10")]
    pub owasp_agentic_2026_top10: Vec<OwaspAsiSummary>,
    pub report_description: String,
    pub language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskType {
    High,
    Medium,
    Low,
}

impl RiskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskType::High => "high",
            RiskType::Medium => "medium",
            RiskType::Low => "low",
        }
    }
}

pub const SCHEMA_VERSION: &str = "agent-security-report@1";
