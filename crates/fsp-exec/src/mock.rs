use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fsp_core::errors::FspError;

use crate::runner::{execution_error, CommandRunner, CommandSpec, CommandSuccess};

/// Captured invocation made through a [`RecordingRunner`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    /// Command as requested by the caller.
    pub spec: CommandSpec,
    /// Working directory supplied by the caller.
    pub cwd: PathBuf,
}

type Script = dyn Fn(&RecordedCall) -> Result<(), String> + Send + Sync;

/// Test double that records every command and delegates its effect to a
/// closure. An `Err(message)` from the closure is reported as a non-zero
/// exit.
#[derive(Clone)]
pub struct RecordingRunner {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    script: Arc<Script>,
}

impl RecordingRunner {
    /// Runner whose commands all succeed without side effects.
    pub fn succeeding() -> Self {
        Self::scripted(|_| Ok(()))
    }

    /// Runner driven by `script`, which may write files under `call.cwd`.
    pub fn scripted<F>(script: F) -> Self
    where
        F: Fn(&RecordedCall) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(script),
        }
    }

    /// Snapshot of the calls made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        match self.calls.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Programs invoked so far, in order.
    pub fn programs(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|call| call.spec.program().to_string())
            .collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec, cwd: &Path) -> Result<CommandSuccess, FspError> {
        let call = RecordedCall {
            spec: spec.clone(),
            cwd: cwd.to_path_buf(),
        };
        match self.calls.lock() {
            Ok(mut guard) => guard.push(call.clone()),
            Err(poisoned) => poisoned.into_inner().push(call.clone()),
        }
        let rendered = spec.to_string();
        (self.script)(&call)
            .map(|()| CommandSuccess {
                command: rendered.clone(),
                elapsed: Duration::ZERO,
            })
            .map_err(|message| {
                execution_error("fsp_exec.exit_status", &rendered, cwd, message)
                    .with_context("status", "1")
            })
    }
}
