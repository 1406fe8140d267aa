//! Serving entrypoint. Each spawned process gets its own MCP session
//! bound to its own process ID; how that session's stdio is physically
//! wired to the vendor subprocess (a dedicated pipe, a generated
//! per-process MCP config file pointing a vendor's `--mcp-config` at a
//! companion process) is a deployment concern outside this crate — see
//! the design notes for the chosen convention.

use std::sync::Arc;

use kernel_types::ProcessId;
use neuron_mcp::McpServer;

use crate::context::AdapterContext;
use crate::registry::build_registry;

/// Errors from serving is captured in `neuron_mcp::McpError`, returned
/// verbatim.
pub use neuron_mcp::McpError;

/// Serve the tool surface for `process_id` over the current process's
/// stdio until the client disconnects.
pub async fn serve_stdio_for_process(process_id: ProcessId, ctx: Arc<AdapterContext>) -> Result<(), McpError> {
    let registry = build_registry(process_id, ctx);
    McpServer::new(registry, "kernel", env!("CARGO_PKG_VERSION")).serve_stdio().await
}
