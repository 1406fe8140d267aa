//! Builds a [`ToolRegistry`] bound to one calling process's identity.

use std::sync::Arc;

use kernel_types::ProcessId;
use neuron_tool::ToolRegistry;

use crate::context::AdapterContext;
use crate::tools::build_tools;

/// Construct the full tool surface (§6) for `process_id`. Every tool
/// closure captures `process_id` at construction time rather than
/// trusting a JSON argument, so a caller cannot impersonate another
/// process by forging a field.
pub fn build_registry(process_id: ProcessId, ctx: Arc<AdapterContext>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in build_tools(process_id, ctx) {
        registry.register(tool);
    }
    registry
}
