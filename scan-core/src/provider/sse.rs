//! Server-Sent Events consumption for streaming provider responses.
//!
//! `loom`'s own `openai_sse` module only *produces* SSE (server side); the
//! adapter here needs to *consume* it from an upstream provider, so this
//! follows the `stream::unfold`-over-`bytes_stream()` idiom used by the
//! `nyzhi-com-code` provider crate's `sse.rs` instead.

use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;

/// One `data:`/`event:` frame from an SSE stream.
#[derive(Debug, Clone)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Splits a raw SSE byte stream into discrete events, buffering partial
/// frames across chunks. Blank lines, `:`-comments, and `[DONE]` data
/// payloads are filtered out by the caller's accumulation loop, not here.
pub fn parse_sse_stream(
    response: reqwest::Response,
) -> BoxStream<'static, Result<SseEvent, reqwest::Error>> {
    let buf = String::new();
    stream::unfold(
        (response, buf),
        |(mut response, mut buf)| async move {
            loop {
                if let Some(idx) = buf.find("\n\n") {
                    let frame = buf[..idx].to_string();
                    buf.drain(..idx + 2);
                    if let Some(event) = parse_frame(&frame) {
                        return Some((Ok(event), (response, buf)));
                    }
                    continue;
                }
                match response.chunk().await {
                    Ok(Some(bytes)) => {
                        buf.push_str(&String::from_utf8_lossy(&bytes));
                        continue;
                    }
                    Ok(None) => {
                        if buf.trim().is_empty() {
                            return None;
                        }
                        let frame = std::mem::take(&mut buf);
                        return parse_frame(&frame).map(|event| (Ok(event), (response, buf)));
                    }
                    Err(e) => return Some((Err(e), (response, buf))),
                }
            }
        },
    )
    .boxed()
}

fn parse_frame(frame: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data_lines = Vec::new();
    for line in frame.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start().to_string());
        }
    }
    if data_lines.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data_lines.join("\n"),
    })
}

/// Style of SSE payload detected while accumulating a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseStyle {
    OpenAi,
    Anthropic,
    Dify,
    Coze,
    PlainText,
}

/// Accumulated result of draining an entire SSE stream: the reconstructed
/// text output, the style it was detected as, and any usage object seen
/// along the way.
#[derive(Debug, Clone, Default)]
pub struct Accumulated {
    pub output: String,
    pub usage: Option<Value>,
    pub session_id: Option<String>,
}

/// Folds a sequence of raw `data:` payload strings (already framed, still
/// including the literal `[DONE]` sentinel if present) into an
/// [`Accumulated`] result, per spec §4.1's SSE handling rules.
pub fn accumulate(payloads: impl IntoIterator<Item = String>) -> Accumulated {
    let mut acc = Accumulated::default();
    for payload in payloads {
        let trimmed = payload.trim();
        if trimmed.is_empty() || trimmed == "[DONE]" {
            continue;
        }
        let value: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(_) => {
                // Fallback: treat non-JSON data as literal text.
                acc.output.push_str(trimmed);
                continue;
            }
        };

        if let Some(delta) = value
            .pointer("/choices/0/delta/content")
            .and_then(Value::as_str)
        {
            acc.output.push_str(delta);
        }
        if let Some(text) = value
            .pointer("/delta/text")
            .and_then(Value::as_str)
            .filter(|_| value.get("type").and_then(Value::as_str) == Some("content_block_delta"))
        {
            acc.output.push_str(text);
        }
        if value.get("type").and_then(Value::as_str) == Some("message_delta") {
            if let Some(usage) = value.pointer("/usage") {
                acc.usage = Some(usage.clone());
            }
        }
        if let Some(answer) = value.get("answer").and_then(Value::as_str) {
            acc.output.push_str(answer);
            if let Some(conv) = value.get("conversation_id").and_then(Value::as_str) {
                acc.session_id = Some(conv.to_string());
            }
        }
        if value.get("type").and_then(Value::as_str) == Some("answer") {
            if let Some(content) = value.get("content").and_then(Value::as_str) {
                acc.output.push_str(content);
            }
        }
        if let Some(usage) = value.get("usage") {
            if acc.usage.is_none() {
                acc.usage = Some(usage.clone());
            }
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_openai_style_concatenates_deltas() {
        let payloads = vec![
            r#"{"choices":[{"delta":{"content":"Hello, "}}]}"#.to_string(),
            r#"{"choices":[{"delta":{"content":"world."}}]}"#.to_string(),
            "[DONE]".to_string(),
        ];
        let acc = accumulate(payloads);
        assert_eq!(acc.output, "Hello, world.");
    }

    #[test]
    fn accumulate_dify_style_tracks_conversation_id() {
        let payloads = vec![
            r#"{"event":"message","answer":"Hello, ","conversation_id":"conv-1"}"#.to_string(),
            r#"{"event":"message","answer":"world."}"#.to_string(),
            "[DONE]".to_string(),
        ];
        let acc = accumulate(payloads);
        assert_eq!(acc.output, "Hello, world.");
        assert_eq!(acc.session_id.as_deref(), Some("conv-1"));
    }

    #[test]
    fn accumulate_coze_style_concatenates_answer_events() {
        let payloads = vec![
            r#"{"type":"answer","content":"Hi "}"#.to_string(),
            r#"{"type":"answer","content":"there."}"#.to_string(),
        ];
        let acc = accumulate(payloads);
        assert_eq!(acc.output, "Hi there.");
    }

    #[test]
    fn accumulate_anthropic_style_captures_usage_from_message_delta() {
        let payloads = vec![
            r#"{"type":"content_block_delta","delta":{"text":"hi"}}"#.to_string(),
            r#"{"type":"message_delta","usage":{"output_tokens":5}}"#.to_string(),
        ];
        let acc = accumulate(payloads);
        assert_eq!(acc.output, "hi");
        assert_eq!(acc.usage.unwrap()["output_tokens"], 5);
    }

    #[test]
    fn accumulate_non_json_payload_is_treated_as_literal_text() {
        let acc = accumulate(vec!["plain text chunk".to_string()]);
        assert_eq!(acc.output, "plain text chunk");
    }

    #[test]
    fn parse_frame_ignores_comments_and_joins_multiline_data() {
        let frame = ": comment\nevent: message\ndata: line one\ndata: line two";
        let event = parse_frame(frame).unwrap();
        assert_eq!(event.event.as_deref(), Some("message"));
        assert_eq!(event.data, "line one\nline two");
    }

    #[test]
    fn parse_frame_without_data_returns_none() {
        assert!(parse_frame(": just a comment").is_none());
    }
}
