//! Configuration loading (§4.M), following `BrainConfig`'s
//! `from_path`/`Default` shape: a JSON file at a conventional path,
//! overridable with `--config`, with every field defaulted so an empty
//! `{}` is a legal config.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use kernel_processor::{DEFAULT_QUEUE_DEPTH, DEFAULT_SLOW_HANDLER_THRESHOLD};
use kernel_supervisor::is_sensitive_env_name;
use kernel_types::DEFAULT_QUEUE_DEPTH as DEFAULT_PER_PROCESS_QUEUE_DEPTH;
use serde::{Deserialize, Serialize};

use crate::error::KernelBinError;

/// Conventional config path used when `--config` is not passed.
pub const DEFAULT_CONFIG_PATH: &str = "kernel.json";

/// Vendor CLI spawn configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorConfig {
    /// Explicit paths to try for the vendor executable before falling
    /// back to a `PATH` lookup.
    pub executable_paths: Vec<PathBuf>,
    /// Executable name looked up on `PATH` when no configured path
    /// resolves.
    pub executable_name: String,
    /// Extra environment variables passed to every spawned process,
    /// subject to `${VAR}` expansion at spawn time.
    pub extra_env: HashMap<String, String>,
    /// Task tracker database directory, exposed to children as
    /// `BEADS_DIR` per §6.
    pub beads_dir: Option<PathBuf>,
    /// Default working directory for spawned children.
    pub work_dir: Option<PathBuf>,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            executable_paths: Vec::new(),
            executable_name: "vendor-cli".to_string(),
            extra_env: HashMap::new(),
            beads_dir: None,
            work_dir: None,
        }
    }
}

/// Nudger debounce configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NudgerConfig {
    /// Debounce window in milliseconds before a batch of coordinator
    /// nudges is flushed.
    pub debounce_ms: u64,
}

impl Default for NudgerConfig {
    fn default() -> Self {
        Self { debounce_ms: kernel_nudger::DEFAULT_DEBOUNCE.as_millis() as u64 }
    }
}

/// Top-level kernel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Bounded submission queue depth for the Command Processor.
    pub queue_depth: usize,
    /// Threshold above which the slow-handler warner logs, in seconds.
    pub slow_handler_threshold_secs: u64,
    /// Content-hash deduplication window, in seconds. `None` disables it.
    pub dedup_ttl_secs: Option<u64>,
    /// Per-process queue depth (§3 Queue Repository).
    pub per_process_queue_depth: usize,
    /// Vendor CLI spawn settings.
    pub vendor: VendorConfig,
    /// Coordinator Nudger settings.
    pub nudger: NudgerConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            slow_handler_threshold_secs: DEFAULT_SLOW_HANDLER_THRESHOLD.as_secs(),
            dedup_ttl_secs: None,
            per_process_queue_depth: DEFAULT_PER_PROCESS_QUEUE_DEPTH,
            vendor: VendorConfig::default(),
            nudger: NudgerConfig::default(),
        }
    }
}

impl KernelConfig {
    /// Load and parse a config file. Missing or malformed fields outside
    /// what's present fall back to their defaults via `#[serde(default)]`.
    pub fn from_path(path: &Path) -> Result<Self, KernelBinError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make the kernel unable to start.
    pub fn validate(&self) -> Result<(), KernelBinError> {
        if self.queue_depth == 0 {
            return Err(KernelBinError::Config("queue_depth must be non-zero".to_string()));
        }
        if self.per_process_queue_depth == 0 {
            return Err(KernelBinError::Config("per_process_queue_depth must be non-zero".to_string()));
        }
        if self.vendor.executable_name.is_empty() {
            return Err(KernelBinError::Config("vendor.executable_name must not be empty".to_string()));
        }
        Ok(())
    }

    /// `extra_env` plus `beads_dir` (as `BEADS_DIR`), with sensitive
    /// values redacted, for a single startup log line.
    pub fn redacted_env_summary(&self) -> HashMap<String, String> {
        let mut summary: HashMap<String, String> = self
            .vendor
            .extra_env
            .iter()
            .map(|(k, v)| (k.clone(), if is_sensitive_env_name(k) { "[redacted]".to_string() } else { v.clone() }))
            .collect();
        if let Some(dir) = &self.vendor.beads_dir {
            summary.insert("BEADS_DIR".to_string(), dir.display().to_string());
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(KernelConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_json_object_parses_to_defaults() {
        let config: KernelConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.queue_depth, DEFAULT_QUEUE_DEPTH);
        assert_eq!(config.vendor.executable_name, "vendor-cli");
    }

    #[test]
    fn zero_queue_depth_fails_validation() {
        let mut config = KernelConfig::default();
        config.queue_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn sensitive_env_names_are_redacted_in_summary() {
        let mut config = KernelConfig::default();
        config.vendor.extra_env.insert("API_TOKEN".to_string(), "supersecret".to_string());
        config.vendor.extra_env.insert("WORKDIR".to_string(), "/tmp/work".to_string());
        let summary = config.redacted_env_summary();
        assert_eq!(summary.get("API_TOKEN").unwrap(), "[redacted]");
        assert_eq!(summary.get("WORKDIR").unwrap(), "/tmp/work");
    }

    #[test]
    fn from_path_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel.json");
        std::fs::write(&path, r#"{"queue_depth": 50}"#).unwrap();
        let config = KernelConfig::from_path(&path).unwrap();
        assert_eq!(config.queue_depth, 50);
    }
}
