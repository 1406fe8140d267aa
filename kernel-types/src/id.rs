//! Typed ID wrappers for process, task, and message identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed ID wrappers prevent mixing up process IDs, task IDs, etc. These are
/// plain strings underneath — no UUID enforcement, no format requirement.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new typed ID from anything that converts to `String`.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(ProcessId, "Identifier for a supervised process (\"coordinator\" or an auto-generated worker id).");
typed_id!(TaskId, "Identifier for a task assignment.");
typed_id!(SessionRef, "Opaque vendor session reference used to resume a headless process.");

/// The coordinator's well-known process ID.
pub const COORDINATOR_ID: &str = "coordinator";

/// Reserved `post_message`/`SendToProcess` routing target meaning "every active worker".
pub const ROUTE_ALL: &str = "ALL";

/// Reserved `post_message`/`SendToProcess` routing target meaning "the coordinator".
pub const ROUTE_COORDINATOR: &str = "COORDINATOR";
