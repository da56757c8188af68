//! External command execution.
//!
//! # Design
//! - Every process the reconciler touches goes through [`CommandRunner`], so
//!   workflows can be exercised without a real init system.
//! - A non-zero exit is an outcome, not an error; callers decide which steps
//!   may fail. Only a command that cannot be started is an error.

use std::process::Command;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::error::{FsOpsError, FsOpsResult};

/// Result of one finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Exit status, absent when the process was killed by a signal.
    pub status: Option<i32>,
    /// Captured standard error, lossily decoded.
    pub stderr: String,
}

impl CommandOutcome {
    /// Whether the command exited zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.status, Some(0))
    }
}

/// Runs external commands on behalf of the reconciler.
pub trait CommandRunner {
    /// Run `command` (program followed by arguments) to completion.
    ///
    /// # Errors
    ///
    /// Returns `FsOpsError::CommandSpawn` when the program cannot be started
    /// and `FsOpsError::InvalidInput` when `command` is empty.
    fn run(&self, command: &[String]) -> FsOpsResult<CommandOutcome>;
}

/// Runs commands as child processes of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, command: &[String]) -> FsOpsResult<CommandOutcome> {
        let (program, args) = split_command(command)?;
        debug!(program = %program, args = ?args, "running command");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| FsOpsError::CommandSpawn {
                program: program.clone(),
                source,
            })?;
        Ok(CommandOutcome {
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Records commands instead of running them. Commands succeed unless
/// registered with [`RecordingRunner::failing`] or [`RecordingRunner::missing`].
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Vec<String>>>,
    failures: Vec<(Vec<String>, i32)>,
    missing: Vec<String>,
}

impl RecordingRunner {
    /// Runner where every command succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `command` exit with `status`.
    #[must_use]
    pub fn failing(mut self, command: &[String], status: i32) -> Self {
        self.failures.push((command.to_vec(), status));
        self
    }

    /// Make `program` fail to start.
    #[must_use]
    pub fn missing(mut self, program: &str) -> Self {
        self.missing.push(program.to_string());
        self
    }

    /// Commands run so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &[String]) -> FsOpsResult<CommandOutcome> {
        let (program, _) = split_command(command)?;
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.to_vec());
        if self.missing.iter().any(|missing| missing == program) {
            return Err(FsOpsError::CommandSpawn {
                program: program.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        let status = self
            .failures
            .iter()
            .find(|(failing, _)| failing.as_slice() == command)
            .map_or(0, |(_, status)| *status);
        Ok(CommandOutcome {
            status: Some(status),
            stderr: String::new(),
        })
    }
}

fn split_command(command: &[String]) -> FsOpsResult<(&String, &[String])> {
    command
        .split_first()
        .ok_or_else(|| FsOpsError::InvalidInput {
            field: "command",
            reason: "empty",
            value: None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn recording_runner_records_and_fails_on_request() -> FsOpsResult<()> {
        let restart = command(&["/etc/init.d/varnish", "restart"]);
        let reload = command(&["/usr/bin/monit", "reload"]);
        let runner = RecordingRunner::new().failing(&reload, 1);

        assert!(runner.run(&restart)?.success());
        let outcome = runner.run(&reload)?;
        assert!(!outcome.success());
        assert_eq!(outcome.status, Some(1));
        assert_eq!(runner.calls(), vec![restart, reload]);
        Ok(())
    }

    #[test]
    fn recording_runner_reports_missing_programs() {
        let runner = RecordingRunner::new().missing("/usr/sbin/varnishd");
        let result = runner.run(&command(&["/usr/sbin/varnishd", "-V"]));
        assert!(matches!(result, Err(FsOpsError::CommandSpawn { .. })));
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn empty_commands_are_rejected() {
        assert!(matches!(
            SystemCommandRunner.run(&[]),
            Err(FsOpsError::InvalidInput {
                field: "command",
                ..
            })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_exit_status() -> FsOpsResult<()> {
        let outcome = SystemCommandRunner.run(&command(&["/bin/sh", "-c", "echo oops >&2; exit 3"]))?;
        assert_eq!(outcome.status, Some(3));
        assert_eq!(outcome.stderr, "oops");
        assert!(SystemCommandRunner.run(&command(&["/bin/sh", "-c", "true"]))?.success());
        Ok(())
    }
}
