//! Placeholder/example-artifact filtering (spec §4.6 step 4). Dropping a
//! `<vuln>` block here keeps a skill worker's example scaffolding (a
//! prompt template showing the *shape* of a leaked key) out of the final
//! report without needing the LLM to police itself.

use regex::Regex;
use std::sync::OnceLock;

fn sk_proj_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)sk-proj-(abc|test|demo|example|sample)\d{3,4}").unwrap())
}

fn bracket_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]\n]{1,80}\]|<[^>\n]{1,80}>|\{[^}\n]{1,80}\}").unwrap())
}

const LITERAL_NEEDLES: &[&str] = &["sk-abc123def456"];

const PHRASE_NEEDLES: &[&str] = &[
    "example api key",
    "test key",
    "dummy key",
    "placeholder key",
];

/// Returns `true` if `text` looks like a placeholder/example artifact
/// rather than a genuine, demonstrated finding.
pub fn is_placeholder(text: &str) -> bool {
    let lower = text.to_lowercase();

    if LITERAL_NEEDLES.iter().any(|n| lower.contains(n)) {
        return true;
    }
    if sk_proj_pattern().is_match(text) {
        return true;
    }
    if PHRASE_NEEDLES.iter().any(|n| lower.contains(n)) {
        return true;
    }

    let has_code_fence = text.contains("```") || text.contains('`');
    if !has_code_fence && bracket_pattern().is_match(text) {
        return true;
    }

    false
}
