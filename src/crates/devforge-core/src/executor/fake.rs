use super::process::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::ExecutionError;
use async_trait::async_trait;
use parking_lot::Mutex;

/// Runner that answers from a script keyed by command prefix
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    script: Mutex<Vec<(String, Result<CommandOutput, ExecutionError>)>>,
    present: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Programs reported as present on PATH
    pub(crate) fn with_programs(mut self, programs: &[&str]) -> Self {
        self.present = programs.iter().map(|p| p.to_string()).collect();
        self
    }

    pub(crate) fn on(self, prefix: &str, code: i32, stdout: &str, stderr: &str) -> Self {
        self.script.lock().push((
            prefix.to_string(),
            Ok(CommandOutput {
                code: Some(code),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }),
        ));
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecutionError> {
        let line = spec.to_string();
        self.calls.lock().push(line.clone());
        self.script
            .lock()
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| Ok(CommandOutput {
                code: Some(0),
                ..Default::default()
            }))
    }

    fn exists(&self, program: &str) -> bool {
        self.present.iter().any(|p| p == program)
    }
}
