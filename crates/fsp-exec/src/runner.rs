use std::fmt;
use std::path::Path;
use std::process::{Command, ExitStatus};
use std::time::{Duration, Instant};

use fsp_core::errors::{ErrorInfo, FspError};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Description of an external command to execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CommandSpec {
    /// Script interpreted by a shell, for tools that need redirection or
    /// here-document syntax.
    Shell {
        /// Shell program used to interpret the script.
        shell: String,
        /// Script passed to the shell via `-c`.
        script: String,
    },
    /// Program invoked directly with an argument vector.
    Argv {
        /// Program name or path.
        program: String,
        /// Arguments passed verbatim.
        args: Vec<String>,
    },
}

impl CommandSpec {
    /// Builds a shell command interpreted by `sh`.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::shell_with("sh", script)
    }

    /// Builds a shell command interpreted by the given shell program.
    pub fn shell_with(shell: impl Into<String>, script: impl Into<String>) -> Self {
        CommandSpec::Shell {
            shell: shell.into(),
            script: script.into(),
        }
    }

    /// Builds a direct program invocation.
    pub fn argv<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::Argv {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Name of the program that ends up being spawned.
    pub fn program(&self) -> &str {
        match self {
            CommandSpec::Shell { shell, .. } => shell,
            CommandSpec::Argv { program, .. } => program,
        }
    }

    fn to_command(&self) -> Command {
        match self {
            CommandSpec::Shell { shell, script } => {
                let mut command = Command::new(shell);
                command.arg("-c").arg(script);
                command
            }
            CommandSpec::Argv { program, args } => {
                let mut command = Command::new(program);
                command.args(args);
                command
            }
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSpec::Shell { script, .. } => write!(f, "{script}"),
            CommandSpec::Argv { program, args } => {
                write!(f, "{program}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
        }
    }
}

/// Successful completion of an external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSuccess {
    /// Rendered command line, for logs and reports.
    pub command: String,
    /// Wall time spent waiting for the process.
    pub elapsed: Duration,
}

/// Executes external commands on behalf of the pipeline.
///
/// Implementations never panic on tool failure: a non-zero exit, a signal or
/// a spawn failure is returned as [`FspError::Execution`] and the caller
/// decides whether to continue.
pub trait CommandRunner: Send + Sync {
    /// Runs `spec` with `cwd` as the working directory and waits for it.
    fn run(&self, spec: &CommandSpec, cwd: &Path) -> Result<CommandSuccess, FspError>;
}

/// Runner backed by `std::process`, inheriting stdio so tool output reaches
/// the operator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec, cwd: &Path) -> Result<CommandSuccess, FspError> {
        let rendered = spec.to_string();
        info!(command = %rendered, cwd = %cwd.display(), "running command");
        let start = Instant::now();
        let status = spec
            .to_command()
            .current_dir(cwd)
            .status()
            .map_err(|err| {
                let failure = execution_error("fsp_exec.spawn", &rendered, cwd, err.to_string())
                    .with_context("program", spec.program());
                error!(command = %rendered, cwd = %cwd.display(), error = %err, "failed to spawn command");
                failure
            })?;
        let elapsed = start.elapsed();
        if status.success() {
            info!(
                command = %rendered,
                cwd = %cwd.display(),
                seconds = elapsed.as_secs_f64(),
                "command finished"
            );
            return Ok(CommandSuccess {
                command: rendered,
                elapsed,
            });
        }
        let (key, value) = describe_status(&status);
        error!(command = %rendered, cwd = %cwd.display(), %key, %value, "command failed");
        Err(execution_error(
            "fsp_exec.exit_status",
            &rendered,
            cwd,
            format!("command failed with {key} {value}"),
        )
        .with_context(key, value))
    }
}

/// Builds an [`FspError::Execution`] carrying the command and directory.
pub fn execution_error(code: &str, command: &str, cwd: &Path, message: impl Into<String>) -> FspError {
    FspError::Execution(
        ErrorInfo::new(code, message)
            .with_context("command", command)
            .with_context("cwd", cwd.display().to_string()),
    )
}

fn describe_status(status: &ExitStatus) -> (&'static str, String) {
    if let Some(code) = status.code() {
        return ("status", code.to_string());
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ("signal", signal.to_string());
        }
    }
    ("status", "unknown".to_string())
}
