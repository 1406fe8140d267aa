//! Vendor-agnostic spawn request and command assembly (§4.G).
//!
//! Building the actual `tokio::process::Command` is vendor-specific (work
//! dir, prompt framing, allowed-tool flags all differ per CLI), so this
//! module specifies the request shape and a [`CommandBuilder`] capability
//! rather than one hard-coded vendor.

use std::collections::HashMap;
use std::path::PathBuf;

use kernel_types::{AgentType, ProcessId, Role, SessionRef};
use serde_json::Value;

/// What to do for the very first turn of a spawn vs. a resumed delivery.
#[derive(Debug, Clone)]
pub enum Turn {
    /// Fresh spawn; no prior session.
    Initial {
        /// Opaque per-workflow configuration blob passed through to the
        /// vendor's system-prompt/tool-allowlist assembly.
        workflow_config: Option<Value>,
    },
    /// Resume an existing session with a new message as the prompt. Used
    /// both for ordinary delivery and for the enforcement reminder.
    Resume {
        /// The vendor session identifier to resume.
        session_ref: SessionRef,
        /// The message to deliver as this turn's prompt.
        message: String,
    },
}

/// Everything a [`CommandBuilder`] needs to assemble one child invocation.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    /// The process identity this invocation belongs to.
    pub process_id: ProcessId,
    /// Coordinator, worker, or observer.
    pub role: Role,
    /// Specialization, informs prompt assembly.
    pub agent_type: AgentType,
    /// Initial spawn or a resumed delivery.
    pub turn: Turn,
    /// Additional environment variables, subject to `${VAR}` expansion
    /// against the supervisor's own environment at spawn time.
    pub env: HashMap<String, String>,
    /// Working directory for the child process.
    pub work_dir: Option<PathBuf>,
}

/// Builds the concrete OS command for one vendor CLI. Kept separate from
/// [`crate::spawner::ProcessSpawner`] so a deployment can swap vendors
/// without touching supervisor plumbing, per the capability-set redesign
/// (no parser/process inheritance hierarchy).
pub trait CommandBuilder: Send + Sync {
    /// Resolve the executable and assemble a ready-to-spawn command.
    fn build(&self, req: &SpawnRequest) -> std::io::Result<tokio::process::Command>;
}

/// Search order for the vendor executable: explicit configured paths
/// first, then OS `PATH` lookup.
pub fn resolve_executable(explicit: &[PathBuf], name: &str) -> std::io::Result<PathBuf> {
    for candidate in explicit {
        if candidate.is_file() {
            return Ok(candidate.clone());
        }
    }
    which(name).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("executable `{name}` not found in configured paths or PATH"),
        )
    })
}

fn which(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    let ext = if cfg!(windows) { ".exe" } else { "" };
    std::env::split_paths(&path_var).find_map(|dir| {
        let candidate = dir.join(format!("{name}{ext}"));
        candidate.is_file().then_some(candidate)
    })
}

/// Expand `${VAR}` references in `value` against `source`, leaving
/// unresolvable references untouched rather than erroring: a missing
/// variable at spawn time is a deployment concern, not a parse failure.
pub fn expand_vars(value: &str, source: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '$' && value[i..].starts_with("${") {
            if let Some(end) = value[i..].find('}') {
                let name = &value[i + 2..i + end];
                if let Some(v) = source.get(name) {
                    out.push_str(v);
                } else if let Ok(v) = std::env::var(name) {
                    out.push_str(&v);
                } else {
                    out.push_str(&value[i..i + end + 1]);
                }
                for _ in 0..end {
                    chars.next();
                }
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// A test/demo command builder: invokes a configured script with
/// deterministic arguments instead of a real vendor CLI, so the
/// supervisor's process-lifecycle plumbing can be exercised without one.
pub struct DemoCommandBuilder {
    /// Path to the executable used as a stand-in vendor CLI.
    pub executable: PathBuf,
}

impl CommandBuilder for DemoCommandBuilder {
    fn build(&self, req: &SpawnRequest) -> std::io::Result<tokio::process::Command> {
        let mut cmd = tokio::process::Command::new(&self.executable);
        cmd.arg("--process-id").arg(req.process_id.as_str());
        match &req.turn {
            Turn::Initial { .. } => {
                cmd.arg("--mode").arg("init");
            }
            Turn::Resume { session_ref, message } => {
                cmd.arg("--mode")
                    .arg("resume")
                    .arg("--session")
                    .arg(session_ref.as_str())
                    .arg("--message")
                    .arg(message);
            }
        }
        if let Some(dir) = &req.work_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &req.env {
            cmd.env(key, expand_vars(value, &req.env));
        }
        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        Ok(cmd)
    }
}

/// Names whose values must be redacted before they reach a log line.
pub fn is_sensitive_env_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    ["token", "key", "secret"].iter().any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_vars_substitutes_from_source_map() {
        let mut src = HashMap::new();
        src.insert("BEADS_DIR".to_string(), "/var/beads".to_string());
        assert_eq!(expand_vars("${BEADS_DIR}/db", &src), "/var/beads/db");
    }

    #[test]
    fn expand_vars_leaves_unresolved_reference_untouched() {
        let src = HashMap::new();
        assert_eq!(expand_vars("${NOPE}", &src), "${NOPE}");
    }

    #[test]
    fn sensitive_env_names_are_detected_case_insensitively() {
        assert!(is_sensitive_env_name("API_TOKEN"));
        assert!(is_sensitive_env_name("secret_value"));
        assert!(is_sensitive_env_name("SSH_KEY"));
        assert!(!is_sensitive_env_name("WORKDIR"));
    }
}
