#![deny(missing_docs)]
//! MCP server bridging a [`ToolRegistry`](neuron_tool::ToolRegistry) with
//! the Model Context Protocol.
//!
//! [`McpServer`] wraps a [`ToolRegistry`](neuron_tool::ToolRegistry) and
//! exposes its tools via MCP over stdio.

pub mod error;
pub mod server;

pub use error::McpError;
pub use server::McpServer;
