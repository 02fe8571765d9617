//! Output extraction: `transform_response` expression evaluation plus the
//! format auto-detection fallback chain (spec §4.1).

use serde_json::Value;

/// Applies a `transform_response` expression to a decoded body, per spec:
/// strip a leading `response.`/`json.`/`data.` prefix, treat an empty or
/// trivial expression as "return the whole body stringified", otherwise
/// walk `.`/`[n]` path segments. Returns `None` on any path miss.
pub fn apply_transform(body: &Value, expression: Option<&str>) -> Option<String> {
    let expr = expression.map(str::trim).unwrap_or("");
    if expr.is_empty() || expr == "response" || expr == "data" || expr == "json" {
        return Some(stringify(body));
    }

    let stripped = ["response.", "json.", "data."]
        .iter()
        .find_map(|prefix| expr.strip_prefix(prefix))
        .unwrap_or(expr);

    let mut current = body;
    for segment in tokenize_path(stripped) {
        match segment {
            PathSegment::Key(key) => match current.get(&key) {
                Some(v) => current = v,
                None => return None,
            },
            PathSegment::Index(i) => match current.get(i) {
                Some(v) => current = v,
                None => return None,
            },
        }
    }
    Some(stringify(current))
}

enum PathSegment {
    Key(String),
    Index(usize),
}

/// Tokenizes `a.b[0].c` into `[Key(a), Key(b), Index(0), Key(c)]`.
fn tokenize_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            continue;
        }
        let mut rest = part;
        if let Some(bracket) = rest.find('[') {
            let key = &rest[..bracket];
            if !key.is_empty() {
                segments.push(PathSegment::Key(key.to_string()));
            }
            rest = &rest[bracket..];
            while let Some(end) = rest.find(']') {
                let idx_str = &rest[1..end];
                if let Ok(idx) = idx_str.parse::<usize>() {
                    segments.push(PathSegment::Index(idx));
                }
                rest = &rest[end + 1..];
                if !rest.starts_with('[') {
                    break;
                }
            }
        } else {
            segments.push(PathSegment::Key(rest.to_string()));
        }
    }
    segments
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Format auto-detection precedence chain used when no `transform_response`
/// is configured, or the configured one fails to resolve.
pub fn auto_detect(body: &Value) -> Option<String> {
    let candidates: &[&str] = &[
        "/choices/0/message/content",
        "/choices/0/text",
        "/content/0/text",
        "/candidates/0/content/parts/0/text",
        "/message/content",
        "/text",
    ];
    for pointer in candidates {
        if let Some(v) = body.pointer(pointer).and_then(Value::as_str) {
            return Some(v.to_string());
        }
    }
    if let Some(content) = body.get("content").and_then(Value::as_str) {
        return Some(content.to_string());
    }
    for key in ["response", "result", "output", "data", "generated_text"] {
        if let Some(v) = body.get(key).and_then(Value::as_str) {
            return Some(v.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transform_strips_response_prefix_and_walks_path() {
        let body = json!({"result": {"text": "hi"}});
        let out = apply_transform(&body, Some("response.result.text"));
        assert_eq!(out.as_deref(), Some("hi"));
    }

    #[test]
    fn transform_walks_array_index() {
        let body = json!({"choices": [{"message": {"content": "hi"}}]});
        let out = apply_transform(&body, Some("choices[0].message.content"));
        assert_eq!(out.as_deref(), Some("hi"));
    }

    #[test]
    fn transform_empty_expression_returns_whole_body() {
        let body = json!({"a": 1});
        let out = apply_transform(&body, None).unwrap();
        assert!(out.contains("\"a\":1"));
    }

    #[test]
    fn transform_missing_path_returns_none() {
        let body = json!({"a": 1});
        assert!(apply_transform(&body, Some("b.c")).is_none());
    }

    #[test]
    fn auto_detect_prefers_openai_shape() {
        let body = json!({"choices": [{"message": {"content": "hi"}}]});
        assert_eq!(auto_detect(&body).as_deref(), Some("hi"));
    }

    #[test]
    fn auto_detect_falls_back_to_generic_keys() {
        let body = json!({"output": "hi"});
        assert_eq!(auto_detect(&body).as_deref(), Some("hi"));
    }

    #[test]
    fn auto_detect_returns_none_when_nothing_matches() {
        let body = json!({"unrelated": 1});
        assert!(auto_detect(&body).is_none());
    }
}
