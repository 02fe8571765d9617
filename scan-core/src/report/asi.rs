//! OWASP Agentic Top-10 category names and `risk_type` -> ASI mapping.
//!
//! Category names and the `ASI<nn>` id format are borrowed verbatim from
//! `original_source/agent-scan/tools/scan/report.py`'s `ASI_CATEGORIES`
//! table — the superseded evaluator-driven report variant, per Design
//! Notes' "most recent, most complete" rule we take only its static
//! table, not its control flow.

use regex::Regex;
use std::sync::OnceLock;

pub const DEFAULT_ASI: &str = "ASI10";

pub fn category_name(id: &str) -> &'static str {
    match id {
        "ASI01" => "Agent Goal Hijack",
        "ASI02" => "Tool Misuse & Exploitation",
        "ASI03" => "Identity & Privilege Abuse",
        "ASI04" => "Agentic Supply Chain Vulnerabilities",
        "ASI05" => "Unexpected Code Execution",
        "ASI06" => "Memory & Context Poisoning",
        "ASI07" => "Insecure Inter-Agent Communication",
        "ASI08" => "Cascading Failures",
        "ASI09" => "Human-Agent Trust Exploitation",
        "ASI10" => "Rogue Agents",
        _ => "Unknown",
    }
}

fn asi_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)asi0?(\d+)").unwrap())
}

/// Maps a `<risk_type>` value to an `ASI<nn>` id (spec §4.6 step 6): if it
/// matches `asi0?\d+`, yield the zero-padded two-digit id; otherwise
/// default to `ASI10` (unclassified / rogue).
pub fn map_risk_type(risk_type: &str) -> String {
    if let Some(caps) = asi_pattern().captures(risk_type) {
        if let Ok(n) = caps[1].parse::<u32>() {
            if n >= 1 && n <= 10 {
                return format!("ASI{n:02}");
            }
        }
    }
    DEFAULT_ASI.to_string()
}
