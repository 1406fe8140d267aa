//! Production [`CommandBuilder`] for the configured vendor CLI (§6).
//!
//! Per-vendor argument/prompt framing is explicitly out of scope for the
//! core (§4.H), so this builder reuses the same neutral
//! `--process-id`/`--mode`/`--session`/`--message` invocation shape the
//! supervisor's own test builder establishes, generalized to resolve the
//! executable and environment from configuration instead of hard-coding
//! a demo script.

use std::collections::HashMap;
use std::process::Stdio;

use kernel_supervisor::{expand_vars, is_sensitive_env_name, resolve_executable, CommandBuilder, SpawnRequest, Turn};

use crate::config::VendorConfig;

/// Builds vendor CLI invocations from [`VendorConfig`].
pub struct VendorCommandBuilder {
    config: VendorConfig,
}

impl VendorCommandBuilder {
    /// Wrap a resolved vendor configuration.
    pub fn new(config: VendorConfig) -> Self {
        Self { config }
    }
}

impl CommandBuilder for VendorCommandBuilder {
    fn build(&self, req: &SpawnRequest) -> std::io::Result<tokio::process::Command> {
        let executable = resolve_executable(&self.config.executable_paths, &self.config.executable_name)?;
        let mut cmd = tokio::process::Command::new(&executable);
        cmd.arg("--process-id").arg(req.process_id.as_str());

        match &req.turn {
            Turn::Initial { workflow_config } => {
                cmd.arg("--mode").arg("init");
                if let Some(config) = workflow_config {
                    cmd.arg("--workflow-config").arg(config.to_string());
                }
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

        if let Some(dir) = req.work_dir.as_ref().or(self.config.work_dir.as_ref()) {
            cmd.current_dir(dir);
        }

        let mut env: HashMap<String, String> = self.config.extra_env.clone();
        env.extend(req.env.clone());
        if let Some(beads_dir) = &self.config.beads_dir {
            env.insert("BEADS_DIR".to_string(), beads_dir.display().to_string());
        }

        for (key, value) in &env {
            let expanded = expand_vars(value, &env);
            let logged = if is_sensitive_env_name(key) { "[redacted]" } else { expanded.as_str() };
            tracing::debug!(process_id = %req.process_id, env_key = %key, env_value = %logged, "setting spawn environment");
            cmd.env(key, &expanded);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_types::{AgentType, ProcessId, Role};

    #[test]
    fn build_assembles_init_invocation_with_expanded_env() {
        unsafe {
            std::env::set_var("KERNEL_TEST_HOME", "/home/kernel");
        }
        let mut config = VendorConfig {
            executable_paths: vec![std::path::PathBuf::from("/bin/true")],
            executable_name: "true".to_string(),
            extra_env: HashMap::new(),
            beads_dir: None,
            work_dir: None,
        };
        config.extra_env.insert("WORKDIR".to_string(), "${KERNEL_TEST_HOME}/work".to_string());
        let builder = VendorCommandBuilder::new(config);

        let req = SpawnRequest {
            process_id: ProcessId::from("worker-1"),
            role: Role::Worker,
            agent_type: AgentType::Generic,
            turn: Turn::Initial { workflow_config: None },
            env: HashMap::new(),
            work_dir: None,
        };

        let cmd = builder.build(&req).unwrap();
        let std_cmd = cmd.as_std();
        let envs: HashMap<_, _> = std_cmd.get_envs().map(|(k, v)| (k.to_owned(), v.map(|v| v.to_owned()))).collect();
        assert_eq!(
            envs.get(std::ffi::OsStr::new("WORKDIR")).unwrap().as_deref(),
            Some(std::ffi::OsStr::new("/home/kernel/work"))
        );
    }
}
