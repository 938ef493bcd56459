//! Remote command execution against named machines.
//!
//! A [`RemoteSession`] runs one command string on one host and returns the
//! captured output. Sessions keep no shell state between calls: anything a
//! later command depends on (exports, `cd`, `eval $(...)`) has to be restated
//! inside the same command string.

use std::ffi::OsString;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

mod types;

pub use types::{CommandOutput, CommandRunner, ProcessCommandRunner};

/// Exit status reported by `ssh` when the connection itself failed.
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Captured output of a remote command that exited successfully.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RemoteOutput {
    /// Raw standard output.
    pub stdout: String,
    /// Raw standard error.
    pub stderr: String,
}

impl RemoteOutput {
    /// Returns stdout with surrounding whitespace removed.
    #[must_use]
    pub fn trimmed_stdout(&self) -> &str {
        self.stdout.trim()
    }
}

/// Errors raised while executing a remote command.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SessionError {
    /// Raised when the local transport program cannot be started.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the host cannot be reached (not booted, network failure).
    #[error("could not connect to {host}: {message}")]
    Connection {
        /// Logical host name.
        host: String,
        /// Transport diagnostics.
        message: String,
    },
    /// Raised when the remote command exits with a non-zero status.
    #[error("command on {host} exited with status {status_text}: {stderr}")]
    NonZeroExit {
        /// Logical host name.
        host: String,
        /// Exit status, when the transport reported one.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Captured standard error.
        stderr: String,
    },
}

/// Future returned by session operations.
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SessionError>> + Send + 'a>>;

/// Executes command strings on named remote hosts.
pub trait RemoteSession: Sync {
    /// Runs `command` on `host` as a single, independent invocation.
    ///
    /// # Security
    ///
    /// `command` is executed by the remote default shell as-is. Callers must
    /// escape any interpolated values.
    fn run<'a>(&'a self, host: &'a str, command: &'a str) -> SessionFuture<'a, RemoteOutput>;
}

/// Session that tunnels commands through the provider CLI's `ssh`
/// subcommand (`<machine-bin> ssh <host> <command>`).
#[derive(Clone, Debug)]
pub struct MachineSshSession<R: CommandRunner> {
    machine_bin: String,
    runner: R,
}

impl MachineSshSession<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    #[must_use]
    pub fn with_process_runner(machine_bin: impl Into<String>) -> Self {
        Self::new(machine_bin, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> MachineSshSession<R> {
    /// Creates a session that shells out to `machine_bin` using `runner`.
    #[must_use]
    pub fn new(machine_bin: impl Into<String>, runner: R) -> Self {
        Self {
            machine_bin: machine_bin.into(),
            runner,
        }
    }

    fn execute(&self, host: &str, command: &str) -> Result<RemoteOutput, SessionError> {
        let args = [
            OsString::from("ssh"),
            OsString::from(host),
            OsString::from(command),
        ];
        let output = self.runner.run(&self.machine_bin, &args)?;
        classify_output(host, output)
    }
}

impl<R: CommandRunner> RemoteSession for MachineSshSession<R> {
    fn run<'a>(&'a self, host: &'a str, command: &'a str) -> SessionFuture<'a, RemoteOutput> {
        Box::pin(async move { self.execute(host, command) })
    }
}

fn classify_output(host: &str, output: CommandOutput) -> Result<RemoteOutput, SessionError> {
    match output.code {
        Some(0) => Ok(RemoteOutput {
            stdout: output.stdout,
            stderr: output.stderr,
        }),
        Some(SSH_CONNECTION_FAILURE) => Err(SessionError::Connection {
            host: host.to_owned(),
            message: output.stderr.trim().to_owned(),
        }),
        _ => Err(SessionError::NonZeroExit {
            host: host.to_owned(),
            status: output.code,
            status_text: output.status_text(),
            stderr: output.stderr.trim().to_owned(),
        }),
    }
}
