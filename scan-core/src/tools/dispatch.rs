//! Result formatting and error shape shared by every dispatch path.
//!
//! Grounded in `original_source/agent-scan/tools/dispatcher.py`: the
//! exact error-string wording (`"Error: Tool '<name>' not found"`,
//! `"Error: <msg>"`) and the `<key>value</key>` map-serialization rule
//! are part of the LLM-facing protocol, not incidental phrasing, so they
//! are reproduced verbatim rather than reworded.

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool '{0}' not found")]
    NotFound(String),
    #[error("{0}")]
    Failed(String),
}

/// Formats a tool's raw return value the way the dispatcher hands it back
/// to the agent's history: a map becomes one `<key>value</key>` line per
/// top-level entry; anything else is string-coerced.
pub fn format_result(result: &Value) -> String {
    match result {
        Value::Object(map) => {
            let mut out = String::new();
            for (k, v) in map {
                out.push_str(&format!("<{k}>{}</{k}>\n", stringify(v)));
            }
            out
        }
        Value::String(s) => s.clone(),
        other => stringify(other),
    }
}

fn stringify(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Top-level dispatch entry point: never returns an error to the
/// caller. Unknown tools and handler failures alike become `"Error: ..."`
/// strings so the agent can keep reasoning.
pub async fn dispatch(
    registry: &super::ToolRegistry,
    tool_name: &str,
    args: Value,
    ctx: &super::ToolContext,
) -> String {
    match registry.call(tool_name, args, ctx).await {
        Ok(value) => format_result(&value),
        Err(ToolError::NotFound(name)) => format!("Error: Tool '{name}' not found"),
        Err(ToolError::Failed(msg)) => format!("Error: {msg}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn format_result_serializes_object_entries_as_xml_like_tags() {
        let result = json!({"status": "ok", "count": 3});
        let formatted = format_result(&result);
        assert!(formatted.contains("<status>ok</status>\n"));
        assert!(formatted.contains("<count>3</count>\n"));
    }

    #[test]
    fn format_result_string_coerces_non_object_values() {
        assert_eq!(format_result(&json!("hi")), "hi");
        assert_eq!(format_result(&json!(42)), "42");
    }
}
