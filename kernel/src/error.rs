//! Errors surfaced while loading configuration or assembling the kernel.

use thiserror::Error;

/// Failures from config loading, validation, or subsystem assembly.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum KernelBinError {
    /// Config file could not be read.
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file was not valid JSON for the expected shape.
    #[error("parsing config: {0}")]
    Json(#[from] serde_json::Error),

    /// A config value failed validation.
    #[error("invalid config: {0}")]
    Config(String),

    /// A kernel subsystem rejected a command during startup (e.g. the
    /// initial coordinator spawn).
    #[error(transparent)]
    Kernel(#[from] kernel_types::KernelError),
}
