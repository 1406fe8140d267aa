//! OutputEvent (§3, §6) — the parsed vendor-event boundary type between
//! the Event Parser contract and the Process Supervisor.

use serde::{Deserialize, Serialize};

/// Top-level vendor event discriminant.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// `system/init` and other system-level notices.
    System,
    /// A model turn producing text and/or tool-use blocks.
    Assistant,
    /// A tool invocation was requested by the model.
    ToolUse,
    /// A tool finished and produced output.
    ToolResult,
    /// The turn-terminal summary event.
    Result,
    /// A transport- or vendor-level error.
    Error,
}

/// Classified reason for an `error` event, used to decide retry/backoff
/// policy and whether a turn failure is retryable.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    /// The vendor rejected the request shape.
    InvalidRequest,
    /// The vendor is rate-limiting this session.
    RateLimited,
    /// The model's context window was exceeded.
    ContextExceeded,
    /// Didn't match any known pattern.
    Unknown,
}

/// Token usage reported alongside an `assistant` or `result` event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens billed for this turn.
    pub input_tokens: u64,
    /// Output tokens produced this turn.
    pub output_tokens: u64,
    /// Input tokens served from cache.
    pub cache_read_input_tokens: u64,
    /// Input tokens spent populating the cache.
    pub cache_creation_input_tokens: u64,
}

/// A content block inside an `assistant` message, per §6's neutral shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// A tool invocation request.
    ToolUse {
        /// Tool-use block ID, correlated with the matching `tool_result`.
        id: String,
        /// Tool name.
        name: String,
        /// Tool input arguments, vendor-defined shape.
        input: serde_json::Value,
    },
}

/// An assistant message: zero or more content blocks plus optional usage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// Content blocks in emission order.
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    /// Usage reported with this message, if any.
    pub usage: Option<Usage>,
}

/// A completed tool call's result, as reported by `tool_result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Correlates with the originating `tool_use` block's `id`.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Raw tool output.
    pub output: serde_json::Value,
}

/// Classified error payload for an `error` event. The vendor stream may
/// send this as a bare string code or as `{code, message, reason}`; the
/// parser normalizes both into this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventError {
    /// Vendor error code, if structured.
    pub code: Option<String>,
    /// Human-readable message.
    pub message: String,
    /// Classified reason.
    pub reason: ErrorReason,
}

/// The parsed vendor event, the boundary type between the Event Parser
/// contract (§4.H) and the Process Supervisor (§4.G).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputEvent {
    /// Top-level discriminant.
    pub event_type: EventType,
    /// Vendor-specific subtype tag (e.g. `"init"`).
    pub sub_type: Option<String>,
    /// Session identifier, present from `system/init` onward.
    pub session_id: Option<String>,
    /// Working directory reported at init.
    pub work_dir: Option<String>,
    /// Assistant message payload, present on `assistant` events.
    pub message: Option<AssistantMessage>,
    /// Tool result payload, present on `tool_result` events.
    pub tool: Option<ToolResult>,
    /// Usage reported on `assistant`/`result` events.
    pub usage: Option<Usage>,
    /// Total cost reported on a terminal `result` event.
    pub total_cost_usd: Option<f64>,
    /// Turn duration in milliseconds, reported on `result`.
    pub duration_ms: Option<u64>,
    /// Whether the terminal `result` event represents a failure.
    pub is_error: bool,
    /// Classified error payload, present on `error` events.
    pub error: Option<EventError>,
    /// Raw line bytes, kept for debugging and replay.
    #[serde(with = "raw_line")]
    pub raw: Vec<u8>,
}

impl OutputEvent {
    /// A minimally populated event for an unrecognized shape, per the
    /// parser contract's "tolerate unknown event shapes" rule.
    pub fn unknown(raw: Vec<u8>) -> Self {
        Self {
            event_type: EventType::System,
            sub_type: Some("unknown".to_string()),
            session_id: None,
            work_dir: None,
            message: None,
            tool: None,
            usage: None,
            total_cost_usd: None,
            duration_ms: None,
            is_error: false,
            error: None,
            raw,
        }
    }

    /// Whether this is the turn-terminal `result` event.
    pub fn is_terminal(&self) -> bool {
        self.event_type == EventType::Result
    }
}

mod raw_line {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&String::from_utf8_lossy(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        Ok(String::deserialize(d)?.into_bytes())
    }
}
