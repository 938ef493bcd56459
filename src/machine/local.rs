//! Provider that runs the machine CLI on the operator's machine.

use std::ffi::OsString;

use crate::session::{CommandOutput, CommandRunner, ProcessCommandRunner};

use super::command::{self, CREATE, INSPECT, REMOVE};
use super::{
    MachineCredentials, MachineError, MachineFuture, MachineHandle, MachineInspection,
    MachineProvider,
};

/// Drives a docker-machine compatible binary through a [`CommandRunner`].
#[derive(Clone, Debug)]
pub struct LocalMachineProvider<R: CommandRunner> {
    machine_bin: String,
    runner: R,
}

impl LocalMachineProvider<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    #[must_use]
    pub fn with_process_runner(machine_bin: impl Into<String>) -> Self {
        Self::new(machine_bin, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> LocalMachineProvider<R> {
    /// Creates a provider that shells out to `machine_bin` using `runner`.
    #[must_use]
    pub fn new(machine_bin: impl Into<String>, runner: R) -> Self {
        Self {
            machine_bin: machine_bin.into(),
            runner,
        }
    }

    fn invoke(
        &self,
        operation: &str,
        name: &str,
        args: &[String],
    ) -> Result<CommandOutput, MachineError> {
        let os_args: Vec<OsString> = args.iter().map(OsString::from).collect();
        let output = self.runner.run(&self.machine_bin, &os_args)?;
        if output.is_success() {
            return Ok(output);
        }
        Err(command::provider_failure(
            &self.machine_bin,
            operation,
            name,
            output.status_text(),
            &output.stderr,
        ))
    }
}

impl<R: CommandRunner> MachineProvider for LocalMachineProvider<R> {
    fn create<'a>(
        &'a self,
        name: &'a str,
        credentials: &'a MachineCredentials,
    ) -> MachineFuture<'a, MachineHandle> {
        Box::pin(async move {
            self.invoke(CREATE, name, &command::create_args(name, credentials))?;
            Ok(MachineHandle::new(name))
        })
    }

    fn inspect<'a>(&'a self, name: &'a str) -> MachineFuture<'a, MachineInspection> {
        Box::pin(async move {
            let output = self.invoke(INSPECT, name, &command::inspect_args(name))?;
            Ok(MachineInspection::new(name, output.stdout))
        })
    }

    fn destroy<'a>(&'a self, name: &'a str) -> MachineFuture<'a, ()> {
        Box::pin(async move {
            self.invoke(REMOVE, name, &command::remove_args(name))?;
            Ok(())
        })
    }
}
