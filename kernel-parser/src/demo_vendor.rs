//! A minimal vendor implementation used only to exercise the
//! [`crate::EventParser`] contract in tests; not a real CLI adapter.

use kernel_types::{
    AssistantMessage, ContentBlock, ErrorReason, EventError, EventType, OutputEvent, ToolResult, Usage,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{EventParser, ParseError};

/// Parses the neutral event shapes described in §6: `system/init`,
/// `assistant`, `tool_result`, `result`, `error`.
pub struct DemoVendorParser {
    context_window: u64,
}

impl Default for DemoVendorParser {
    fn default() -> Self {
        Self { context_window: 200_000 }
    }
}

#[derive(Deserialize)]
struct RawLine {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    tool: Option<RawTool>,
    #[serde(default)]
    usage: Option<RawUsage>,
    #[serde(default)]
    total_cost_usd: Option<f64>,
    #[serde(default)]
    duration_ms: Option<u64>,
    #[serde(default)]
    is_error: Option<bool>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: Vec<RawBlock>,
    #[serde(default)]
    usage: Option<RawUsage>,
}

#[derive(Deserialize)]
struct RawBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<Value>,
}

#[derive(Deserialize)]
struct RawTool {
    id: String,
    name: String,
    #[serde(default)]
    output: Value,
}

#[derive(Deserialize, Clone, Copy)]
struct RawUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: u64,
    #[serde(default)]
    cache_creation_input_tokens: u64,
}

impl From<RawUsage> for Usage {
    fn from(raw: RawUsage) -> Self {
        Self {
            input_tokens: raw.input_tokens,
            output_tokens: raw.output_tokens,
            cache_read_input_tokens: raw.cache_read_input_tokens,
            cache_creation_input_tokens: raw.cache_creation_input_tokens,
        }
    }
}

fn classify_error(raw: &Value) -> EventError {
    match raw {
        Value::String(code) => EventError {
            code: Some(code.clone()),
            message: code.clone(),
            reason: classify_reason(code),
        },
        Value::Object(map) => {
            let code = map.get("code").and_then(Value::as_str).map(str::to_string);
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            let reason = map
                .get("reason")
                .and_then(Value::as_str)
                .map(classify_reason)
                .unwrap_or_else(|| classify_reason(&message));
            EventError { code, message, reason }
        }
        other => EventError {
            code: None,
            message: other.to_string(),
            reason: ErrorReason::Unknown,
        },
    }
}

fn classify_reason(text: &str) -> ErrorReason {
    match text {
        "invalid_request" => ErrorReason::InvalidRequest,
        "rate_limited" => ErrorReason::RateLimited,
        "context_exceeded" => ErrorReason::ContextExceeded,
        other if crate::catalog::CONTEXT_EXHAUSTED_PATTERNS.iter().any(|p| other.contains(p)) => {
            ErrorReason::ContextExceeded
        }
        _ => ErrorReason::Unknown,
    }
}

impl EventParser for DemoVendorParser {
    fn parse_event(&self, line: &[u8]) -> Result<OutputEvent, ParseError> {
        let raw: RawLine = match serde_json::from_slice(line) {
            Ok(raw) => raw,
            Err(err) => return Err(ParseError::MalformedJson(err.to_string())),
        };

        let event_type = match raw.kind.as_str() {
            "system" => EventType::System,
            "assistant" => EventType::Assistant,
            "tool_use" => EventType::ToolUse,
            "tool_result" => EventType::ToolResult,
            "result" => EventType::Result,
            "error" => EventType::Error,
            _ => {
                return Ok(OutputEvent::unknown(line.to_vec()));
            }
        };

        let message = raw.message.map(|m| AssistantMessage {
            content: m
                .content
                .into_iter()
                .filter_map(|b| match b.kind.as_str() {
                    "text" => Some(ContentBlock::Text { text: b.text.unwrap_or_default() }),
                    "tool_use" => Some(ContentBlock::ToolUse {
                        id: b.id.unwrap_or_default(),
                        name: b.name.unwrap_or_default(),
                        input: b.input.unwrap_or(Value::Null),
                    }),
                    _ => None,
                })
                .collect(),
            usage: m.usage.map(Usage::from),
        });

        let tool = raw.tool.map(|t| ToolResult {
            id: t.id,
            name: t.name,
            output: t.output,
        });

        Ok(OutputEvent {
            event_type,
            sub_type: raw.subtype,
            session_id: raw.session_id,
            work_dir: raw.cwd,
            usage: raw
                .usage
                .map(Usage::from)
                .or_else(|| message.as_ref().and_then(|m| m.usage)),
            message,
            tool,
            total_cost_usd: raw.total_cost_usd,
            duration_ms: raw.duration_ms,
            is_error: raw.is_error.unwrap_or(false),
            error: raw.error.as_ref().map(classify_error),
            raw: line.to_vec(),
        })
    }

    fn context_window_size(&self) -> u64 {
        self.context_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_system_init_and_extracts_session_ref() {
        let parser = DemoVendorParser::default();
        let line = br#"{"type":"system","subtype":"init","session_id":"sess-1","cwd":"/work"}"#;
        let event = parser.parse_event(line).unwrap();
        assert_eq!(event.event_type, EventType::System);
        assert_eq!(parser.extract_session_ref(&event), Some("sess-1".to_string()));
    }

    #[test]
    fn unknown_shape_is_tolerated() {
        let parser = DemoVendorParser::default();
        let line = br#"{"type":"future_event"}"#;
        let event = parser.parse_event(line).unwrap();
        assert_eq!(event.sub_type.as_deref(), Some("unknown"));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let parser = DemoVendorParser::default();
        let err = parser.parse_event(b"not json").unwrap_err();
        assert!(matches!(err, ParseError::MalformedJson(_)));
    }

    #[test]
    fn error_event_with_string_reason_is_classified() {
        let parser = DemoVendorParser::default();
        let line = br#"{"type":"error","error":"context_exceeded"}"#;
        let event = parser.parse_event(line).unwrap();
        assert!(parser.is_context_exhausted(&event));
    }

    #[test]
    fn error_event_with_object_payload_and_pattern_match() {
        let parser = DemoVendorParser::default();
        let line = br#"{"type":"error","error":{"code":"E1","message":"This model's maximum context length is 200000 tokens","reason":"unclassified"}}"#;
        let event = parser.parse_event(line).unwrap();
        assert!(parser.is_context_exhausted(&event));
    }
}
