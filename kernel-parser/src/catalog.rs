//! Shared pattern catalog for context-exhaustion detection (§4.H).

use kernel_types::{ErrorReason, EventType, OutputEvent};

/// Textual patterns that, if found in an error message, indicate the
/// model's context window was exceeded. Vendors that don't pre-classify
/// the reason are matched against this catalog.
pub const CONTEXT_EXHAUSTED_PATTERNS: &[&str] = &[
    "Prompt is too long",
    "Context window exceeded",
    "This model's maximum context length is",
];

/// Default `is_context_exhausted` semantics: true if the event carries a
/// pre-classified `ContextExceeded` reason, or if its error message
/// matches a pattern in [`CONTEXT_EXHAUSTED_PATTERNS`].
pub fn default_is_context_exhausted(event: &OutputEvent) -> bool {
    if event.event_type != EventType::Error {
        return false;
    }
    let Some(error) = &event.error else {
        return false;
    };
    if error.reason == ErrorReason::ContextExceeded {
        return true;
    }
    CONTEXT_EXHAUSTED_PATTERNS
        .iter()
        .any(|pattern| error.message.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_types::EventError;

    fn error_event(message: &str, reason: ErrorReason) -> OutputEvent {
        OutputEvent {
            event_type: EventType::Error,
            sub_type: None,
            session_id: None,
            work_dir: None,
            message: None,
            tool: None,
            usage: None,
            total_cost_usd: None,
            duration_ms: None,
            is_error: true,
            error: Some(EventError {
                code: None,
                message: message.to_string(),
                reason,
            }),
            raw: Vec::new(),
        }
    }

    #[test]
    fn pre_classified_reason_is_detected() {
        let event = error_event("boom", ErrorReason::ContextExceeded);
        assert!(default_is_context_exhausted(&event));
    }

    #[test]
    fn pattern_match_is_detected_even_when_unclassified() {
        let event = error_event("This model's maximum context length is 200000 tokens", ErrorReason::Unknown);
        assert!(default_is_context_exhausted(&event));
    }

    #[test]
    fn unrelated_error_is_not_flagged() {
        let event = error_event("connection reset", ErrorReason::Unknown);
        assert!(!default_is_context_exhausted(&event));
    }
}
