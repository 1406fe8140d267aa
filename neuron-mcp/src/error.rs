//! Error type for MCP serving.

/// Errors from serving a tool registry over MCP.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// Transport setup or the serving loop itself failed.
    #[error("connection failed: {0}")]
    Connection(String),
}
