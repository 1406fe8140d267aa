//! Event Parser contract (§4.H). Per-vendor adapters translating a
//! vendor CLI's line-delimited JSON stream into [`kernel_types::OutputEvent`]
//! are explicitly out of scope for the core; this crate defines only the
//! contract, a shared pattern catalog, and one demo/test vendor
//! implementation used to exercise it.

#![deny(missing_docs)]

pub mod catalog;
pub mod demo_vendor;

use kernel_types::OutputEvent;
use thiserror::Error;

pub use demo_vendor::DemoVendorParser;

/// Errors a vendor parser implementation can surface. Malformed JSON is
/// the only error case the contract requires; unknown event shapes must
/// be tolerated by returning a minimally populated event instead.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line was not valid JSON.
    #[error("malformed event line: {0}")]
    MalformedJson(String),
}

/// Per-vendor contract. A shared base parser provides the pattern
/// catalog and default `is_context_exhausted` semantics (see
/// [`catalog`]); vendor implementations extend rather than replace it.
pub trait EventParser: Send + Sync {
    /// Parse one line of vendor stdout. Tolerates unknown event shapes by
    /// returning a minimally populated event; malformed JSON surfaces as
    /// an error.
    fn parse_event(&self, line: &[u8]) -> Result<OutputEvent, ParseError>;

    /// The session identifier to remember, or `None` if `event` doesn't
    /// carry one.
    fn extract_session_ref(&self, event: &OutputEvent) -> Option<String> {
        event.session_id.clone()
    }

    /// Whether `event` indicates context-window overflow, via a
    /// pre-classified reason or a matching textual pattern.
    fn is_context_exhausted(&self, event: &OutputEvent) -> bool {
        catalog::default_is_context_exhausted(event)
    }

    /// Upper bound used for usage-percentage computations.
    fn context_window_size(&self) -> u64;
}
