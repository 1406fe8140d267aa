//! Optional content-hash deduplication middleware (§4.F).

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use kernel_types::CommandKind;

/// Rejects commands whose content-hash (derived from kind-specific
/// non-identity fields) appeared within `ttl`. Disabled by default; the
/// processor only consults this when configured with one.
pub struct Deduplicator {
    ttl: Duration,
    seen: std::sync::Mutex<VecDeque<(u64, Instant)>>,
}

impl Deduplicator {
    /// Create a deduplicator with the given time-to-live window.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: std::sync::Mutex::new(VecDeque::new()),
        }
    }

    /// Hash of the kind-specific payload, ignoring the envelope's own
    /// identity fields (id, created_at, source, priority, trace).
    pub fn content_hash(kind: &CommandKind) -> u64 {
        let encoded = format!("{kind:?}");
        let mut hasher = DefaultHasher::new();
        encoded.hash(&mut hasher);
        hasher.finish()
    }

    /// Returns `true` if `hash` was already seen within the TTL window
    /// (and should therefore be rejected), recording it either way.
    pub fn check_and_record(&self, hash: u64) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock().expect("dedup mutex poisoned");
        while let Some((_, at)) = seen.front() {
            if now.duration_since(*at) > self.ttl {
                seen.pop_front();
            } else {
                break;
            }
        }
        let is_dup = seen.iter().any(|(h, _)| *h == hash);
        seen.push_back((hash, now));
        is_dup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_types::ProcessId;
    use std::time::Duration;

    #[test]
    fn repeated_content_within_ttl_is_flagged() {
        let dedup = Deduplicator::new(Duration::from_secs(60));
        let kind = CommandKind::TransitionPhase {
            process_id: ProcessId::from("worker-1"),
            phase: "implementing".to_string(),
        };
        let hash = Deduplicator::content_hash(&kind);
        assert!(!dedup.check_and_record(hash));
        assert!(dedup.check_and_record(hash));
    }
}
