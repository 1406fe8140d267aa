//! MCP Adapter (§4.J): translates the tool surface listed in §6 into
//! [`kernel_types::CommandKind`] submissions, bypassing the processor
//! entirely for the two read-only queries.

#![deny(missing_docs)]

pub mod context;
pub mod registry;
pub mod server;
pub mod tools;

pub use context::AdapterContext;
pub use registry::build_registry;
pub use server::serve_stdio_for_process;
