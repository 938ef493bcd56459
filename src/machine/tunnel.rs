//! Provider that runs the machine CLI on a gateway host.
//!
//! Hosts created this way belong to the gateway's CLI state: later calls for
//! them (inspect, destroy, `ssh`) must go through the same gateway.

use crate::session::{RemoteOutput, RemoteSession, SessionError};

use super::command::{self, CREATE, INSPECT, REMOVE};
use super::{
    MachineCredentials, MachineError, MachineFuture, MachineHandle, MachineInspection,
    MachineProvider,
};

/// Drives the machine CLI installed on `gateway` through a [`RemoteSession`].
#[derive(Debug)]
pub struct TunneledMachineProvider<'s, S: RemoteSession> {
    session: &'s S,
    gateway: String,
    machine_bin: String,
}

impl<'s, S: RemoteSession> TunneledMachineProvider<'s, S> {
    /// Creates a provider that executes `machine_bin` on `gateway`.
    #[must_use]
    pub fn new(session: &'s S, gateway: impl Into<String>, machine_bin: impl Into<String>) -> Self {
        Self {
            session,
            gateway: gateway.into(),
            machine_bin: machine_bin.into(),
        }
    }

    async fn invoke(
        &self,
        operation: &str,
        name: &str,
        args: &[String],
    ) -> Result<RemoteOutput, MachineError> {
        let line = command::shell_line(&self.machine_bin, args);
        match self.session.run(&self.gateway, &line).await {
            Ok(output) => Ok(output),
            Err(SessionError::NonZeroExit { stderr, .. })
                if command::missing_host(&stderr) == Some(self.gateway.as_str()) =>
            {
                Err(MachineError::Session(SessionError::Connection {
                    host: self.gateway.clone(),
                    message: stderr.trim().to_owned(),
                }))
            }
            Err(SessionError::NonZeroExit {
                status_text,
                stderr,
                ..
            }) => Err(command::provider_failure(
                &self.machine_bin,
                operation,
                name,
                status_text,
                &stderr,
            )),
            Err(other) => Err(MachineError::Session(other)),
        }
    }
}

impl<S: RemoteSession> MachineProvider for TunneledMachineProvider<'_, S> {
    fn create<'a>(
        &'a self,
        name: &'a str,
        credentials: &'a MachineCredentials,
    ) -> MachineFuture<'a, MachineHandle> {
        Box::pin(async move {
            self.invoke(CREATE, name, &command::create_args(name, credentials))
                .await?;
            Ok(MachineHandle::new(name))
        })
    }

    fn inspect<'a>(&'a self, name: &'a str) -> MachineFuture<'a, MachineInspection> {
        Box::pin(async move {
            let output = self.invoke(INSPECT, name, &command::inspect_args(name)).await?;
            Ok(MachineInspection::new(name, output.stdout))
        })
    }

    fn destroy<'a>(&'a self, name: &'a str) -> MachineFuture<'a, ()> {
        Box::pin(async move {
            self.invoke(REMOVE, name, &command::remove_args(name)).await?;
            Ok(())
        })
    }
}
