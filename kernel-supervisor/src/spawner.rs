//! `ProcessSpawner` (§4.G) — builds a vendor command, spawns it, and
//! wires the resulting `HeadlessProcess` into the registry and the
//! callback contracts (`SessionRefNotifier`, `ProcessTurnComplete`).

use std::sync::Arc;

use kernel_parser::EventParser;
use kernel_types::{
    CommandEnvelope, CommandKind, CommandSource, CommandSubmitter, KernelError, OutputEvent,
    ProcessId, SessionRef,
};
use uuid::Uuid;

use crate::headless_process::HeadlessProcess;
use crate::registry::ProcessRegistry;
use crate::spawn::{CommandBuilder, SpawnRequest};

/// Invoked exactly once per spawn, the first time the vendor stream's
/// `system/init` event yields a session identifier.
pub trait SessionRefNotifier: Send + Sync {
    /// `process_id` just captured `session_ref`.
    fn notify(&self, process_id: ProcessId, session_ref: SessionRef);
}

impl<F: Fn(ProcessId, SessionRef) + Send + Sync> SessionRefNotifier for F {
    fn notify(&self, process_id: ProcessId, session_ref: SessionRef) {
        self(process_id, session_ref)
    }
}

/// Builds vendor commands, spawns children, and registers the resulting
/// `HeadlessProcess`es. Owns the one piece of cross-cutting wiring the
/// spec calls out: a subprocess's turn-terminal event becomes a
/// `ProcessTurnComplete` command submitted back to the Command Processor.
pub struct ProcessSpawner {
    builder: Arc<dyn CommandBuilder>,
    parser: Arc<dyn EventParser>,
    registry: Arc<ProcessRegistry>,
    submitter: Arc<dyn CommandSubmitter>,
    session_notifier: Arc<dyn SessionRefNotifier>,
}

impl ProcessSpawner {
    /// Assemble a spawner from its four collaborators.
    pub fn new(
        builder: Arc<dyn CommandBuilder>,
        parser: Arc<dyn EventParser>,
        registry: Arc<ProcessRegistry>,
        submitter: Arc<dyn CommandSubmitter>,
        session_notifier: Arc<dyn SessionRefNotifier>,
    ) -> Self {
        Self {
            builder,
            parser,
            registry,
            submitter,
            session_notifier,
        }
    }

    /// Build, spawn, and register a child for `req`. On success the
    /// returned handle is already registered under `req.process_id`.
    pub async fn spawn(&self, req: SpawnRequest) -> Result<Arc<HeadlessProcess>, KernelError> {
        let process_id = req.process_id.clone();
        let mut command = self
            .builder
            .build(&req)
            .map_err(|err| KernelError::Transport(err.to_string()))?;

        let child = command
            .spawn()
            .map_err(|err| KernelError::Transport(err.to_string()))?;

        let submitter = self.submitter.clone();
        let notifier = self.session_notifier.clone();
        let on_session_ref = {
            let process_id = process_id.clone();
            move |session_ref: SessionRef| notifier.notify(process_id, session_ref)
        };
        let on_terminal = {
            let process_id = process_id.clone();
            move |terminal: Option<OutputEvent>| {
                let succeeded = terminal.as_ref().is_some_and(|e| !e.is_error);
                let error_reason = terminal
                    .as_ref()
                    .and_then(|e| e.error.as_ref())
                    .map(|e| format!("{:?}", e.reason));
                let envelope = CommandEnvelope::new(
                    CommandKind::ProcessTurnComplete {
                        process_id,
                        succeeded,
                        error_reason,
                    },
                    CommandSource::Callback,
                    Uuid::new_v4(),
                    chrono::Utc::now(),
                );
                if let Err(err) = submitter.submit(envelope) {
                    tracing::warn!(%err, "failed to submit process-turn-complete callback");
                }
            }
        };

        let process = HeadlessProcess::spawn(child, self.parser.clone(), on_session_ref, on_terminal);
        self.registry.register(process_id, process.clone()).await;
        Ok(process)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn::Turn;
    use kernel_parser::demo_vendor::DemoVendorParser;
    use std::sync::Mutex as StdMutex;

    struct ShellCommandBuilder {
        script: String,
    }

    impl CommandBuilder for ShellCommandBuilder {
        fn build(&self, _req: &SpawnRequest) -> std::io::Result<tokio::process::Command> {
            let mut cmd = tokio::process::Command::new("/bin/sh");
            cmd.arg("-c").arg(&self.script);
            cmd.stdin(std::process::Stdio::null());
            cmd.stdout(std::process::Stdio::piped());
            cmd.stderr(std::process::Stdio::piped());
            Ok(cmd)
        }
    }

    struct RecordingSubmitter {
        received: StdMutex<Vec<CommandEnvelope>>,
    }

    impl CommandSubmitter for RecordingSubmitter {
        fn submit(&self, envelope: CommandEnvelope) -> Result<(), KernelError> {
            self.received.lock().unwrap().push(envelope);
            Ok(())
        }
    }

    #[tokio::test]
    async fn terminal_result_event_submits_process_turn_complete() {
        let script = r#"echo '{"type":"system","subtype":"init","session_id":"sess-1"}'; echo '{"type":"result","is_error":false}'"#;
        let builder = Arc::new(ShellCommandBuilder { script: script.to_string() });
        let submitter = Arc::new(RecordingSubmitter { received: StdMutex::new(Vec::new()) });
        let registry = Arc::new(ProcessRegistry::new());
        let captured: Arc<StdMutex<Option<SessionRef>>> = Arc::new(StdMutex::new(None));
        let captured_clone = captured.clone();

        let spawner = ProcessSpawner::new(
            builder,
            Arc::new(DemoVendorParser::default()),
            registry.clone(),
            submitter.clone(),
            Arc::new(move |_id: ProcessId, session_ref: SessionRef| {
                *captured_clone.lock().unwrap() = Some(session_ref);
            }),
        );

        let req = SpawnRequest {
            process_id: ProcessId::from("worker-1"),
            role: kernel_types::Role::Worker,
            agent_type: kernel_types::AgentType::Generic,
            turn: Turn::Initial { workflow_config: None },
            env: Default::default(),
            work_dir: None,
        };

        let process = spawner.spawn(req).await.unwrap();
        process.wait().await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(captured.lock().unwrap().as_ref().unwrap().as_str(), "sess-1");
        let received = submitter.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        match &received[0].kind {
            CommandKind::ProcessTurnComplete { succeeded, .. } => assert!(*succeeded),
            _ => panic!("expected ProcessTurnComplete"),
        }
    }
}
