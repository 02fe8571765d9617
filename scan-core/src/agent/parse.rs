//! Tool-invocation parsing out of assistant text.
//!
//! `parse_tool_invocations(response)` returns `None` for "no invocation";
//! `clean_content(response)` strips the tool markup back out to leave the
//! human-readable description. Grammar: `<tool_name>…</tool_name>` with
//! sibling `<arg-name>value</arg-name>` blocks.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

/// One parsed tool call: name plus string-valued arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub args: Map<String, Value>,
}

fn tool_name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<tool_name>\s*(.*?)\s*</tool_name>").unwrap())
}

fn arg_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<([a-zA-Z_][\w-]*)>(.*?)</\1>").unwrap())
}

const RESERVED_TAGS: &[&str] = &["tool_name"];

/// Extracts a single tool invocation from assistant output, if any.
///
/// Only the first `<tool_name>` block is honored (spec: "one invocation
/// per assistant turn is expected"); any further occurrences are ignored.
/// Sibling `<arg-name>value</arg-name>` tags anywhere in the response
/// become string-valued arguments, skipping `tool_name` itself.
pub fn parse_tool_invocations(response: &str) -> Option<ToolInvocation> {
    let caps = tool_name_pattern().captures(response)?;
    let tool_name = caps[1].trim().to_lowercase();
    if tool_name.is_empty() {
        return None;
    }

    let mut args = Map::new();
    for arg_caps in arg_pattern().captures_iter(response) {
        let tag = &arg_caps[1];
        if RESERVED_TAGS.contains(&tag.to_lowercase().as_str()) {
            continue;
        }
        args.insert(tag.to_string(), Value::String(arg_caps[2].trim().to_string()));
    }

    Some(ToolInvocation { tool_name, args })
}

/// Strips the tool-invocation markup back out of `response`, leaving the
/// assistant's human-readable narration (used as the `statusUpdate`
/// `brief`/`description` field).
pub fn clean_content(response: &str) -> String {
    let without_tool_name = tool_name_pattern().replace_all(response, "");
    let without_args = arg_pattern().replace_all(&without_tool_name, "");
    without_args.trim().to_string()
}

/// Strips only the `<tool_name>...</tool_name>` wrapper, leaving any other
/// markup (e.g. `<vuln>` blocks) untouched. Used when a worker's finish
/// call should surface its already-structured output verbatim instead of
/// going through a second formatting round.
pub fn strip_tool_name_tag(response: &str) -> String {
    tool_name_pattern().replace_all(response, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_name_and_sibling_args() {
        let response = "I'll read the file.\n<tool_name>read_file</tool_name>\n<path>src/main.rs</path>";
        let invocation = parse_tool_invocations(response).unwrap();
        assert_eq!(invocation.tool_name, "read_file");
        assert_eq!(invocation.args["path"], "src/main.rs");
    }

    #[test]
    fn tool_name_is_case_insensitive_and_lowercased() {
        let response = "<tool_name>FINISH</tool_name>";
        let invocation = parse_tool_invocations(response).unwrap();
        assert_eq!(invocation.tool_name, "finish");
    }

    #[test]
    fn no_tool_name_returns_none() {
        assert!(parse_tool_invocations("Just thinking out loud.").is_none());
    }

    #[test]
    fn clean_content_strips_markup_leaving_narration() {
        let response = "I will inspect the repo.\n<tool_name>ls</tool_name>\n<path>.</path>";
        assert_eq!(clean_content(response), "I will inspect the repo.");
    }

    #[test]
    fn clean_content_of_pure_markup_is_empty() {
        let response = "<tool_name>finish</tool_name>";
        assert_eq!(clean_content(response), "");
    }

    #[test]
    fn multiple_args_are_all_captured() {
        let response = "<tool_name>dialogue</tool_name><prompt>hi</prompt><extra>ignored-by-tool</extra>";
        let invocation = parse_tool_invocations(response).unwrap();
        assert_eq!(invocation.args.len(), 2);
        assert_eq!(invocation.args["prompt"], "hi");
    }
}
