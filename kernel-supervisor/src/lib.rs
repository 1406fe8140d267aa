//! Process Supervisor (§4.G) — owns OS subprocesses and drives their
//! per-process event loops, turning vendor turn-terminal events into
//! `ProcessTurnComplete` callbacks back into the Command Processor.

#![deny(missing_docs)]

pub mod deliverer;
pub mod headless_process;
pub mod registry;
pub mod spawn;
pub mod spawner;

pub use deliverer::MessageDeliverer;
pub use headless_process::HeadlessProcess;
pub use registry::ProcessRegistry;
pub use spawn::{expand_vars, is_sensitive_env_name, resolve_executable, CommandBuilder, DemoCommandBuilder, SpawnRequest, Turn};
pub use spawner::{ProcessSpawner, SessionRefNotifier};
