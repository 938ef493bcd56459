//! Machine provider abstraction for creating, inspecting and destroying
//! cloud hosts.
//!
//! Providers are driven through a docker-machine compatible CLI. The same
//! command vocabulary is used whether the CLI runs on the operator's machine
//! ([`LocalMachineProvider`]) or on a gateway host reached through a
//! [`RemoteSession`](crate::session::RemoteSession)
//! ([`TunneledMachineProvider`]).

use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::session::SessionError;

mod command;
mod local;
mod tunnel;

pub use local::LocalMachineProvider;
pub use tunnel::TunneledMachineProvider;

/// Identifies a provisioned host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MachineHandle {
    /// Logical name, unique within a run.
    pub name: String,
    /// Public address, absent until the host has been inspected.
    pub address: Option<IpAddr>,
}

impl MachineHandle {
    /// Creates a handle for a host whose address is not yet known.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
        }
    }

    /// Records the address reported by a later inspection.
    #[must_use]
    pub const fn with_address(mut self, address: IpAddr) -> Self {
        self.address = Some(address);
        self
    }
}

/// Provider account details used when creating a machine.
#[derive(Clone, Eq, PartialEq)]
pub struct MachineCredentials {
    /// Provider driver name (for example `digitalocean`).
    pub driver: String,
    /// API token for the provider account.
    pub access_token: String,
    /// Optional region slug.
    pub region: Option<String>,
    /// Optional machine size slug.
    pub size: Option<String>,
}

impl MachineCredentials {
    /// Creates credentials for `driver` authenticated by `access_token`.
    #[must_use]
    pub fn new(driver: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            access_token: access_token.into(),
            region: None,
            size: None,
        }
    }

    /// Sets the optional region.
    #[must_use]
    pub fn region(mut self, value: Option<String>) -> Self {
        self.region = value;
        self
    }

    /// Sets the optional machine size.
    #[must_use]
    pub fn size(mut self, value: Option<String>) -> Self {
        self.size = value;
        self
    }
}

impl fmt::Debug for MachineCredentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MachineCredentials")
            .field("driver", &self.driver)
            .field("access_token", &"<redacted>")
            .field("region", &self.region)
            .field("size", &self.size)
            .finish()
    }
}

/// Raw inspection document returned by the provider for one host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MachineInspection {
    name: String,
    raw: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectDocument {
    driver: InspectDriver,
}

#[derive(Deserialize)]
struct InspectDriver {
    #[serde(rename = "IPAddress", default)]
    ip_address: Option<String>,
}

impl MachineInspection {
    /// Wraps the raw inspection output for host `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw: raw.into(),
        }
    }

    /// Extracts the public address from the inspection document.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::MalformedOutput`] when the document is not
    /// valid JSON, carries no address, or the address does not parse.
    pub fn address(&self) -> Result<IpAddr, MachineError> {
        let document: InspectDocument =
            serde_json::from_str(self.raw.trim()).map_err(|err| self.malformed(err.to_string()))?;
        let value = document
            .driver
            .ip_address
            .map(|ip| ip.trim().to_owned())
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| self.malformed(String::from("no IP address reported")))?;
        IpAddr::from_str(&value)
            .map_err(|err| self.malformed(format!("invalid IP address `{value}`: {err}")))
    }

    fn malformed(&self, message: String) -> MachineError {
        MachineError::MalformedOutput {
            name: self.name.clone(),
            message,
        }
    }
}

/// Errors raised by machine providers.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MachineError {
    /// Raised when the provider has no machine with the given name.
    #[error("machine {name} does not exist")]
    NotFound {
        /// Logical machine name.
        name: String,
    },
    /// Raised when a call succeeded but its output cannot be used.
    #[error("unusable output for machine {name}: {message}")]
    MalformedOutput {
        /// Logical machine name.
        name: String,
        /// Parser diagnostics.
        message: String,
    },
    /// Raised when the provider CLI exits with a non-zero status.
    #[error("{program} {operation} {name} exited with status {status_text}: {stderr}")]
    Provider {
        /// Provider CLI binary.
        program: String,
        /// Subcommand that failed (`create`, `inspect`, `rm`).
        operation: String,
        /// Logical machine name.
        name: String,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Captured standard error.
        stderr: String,
    },
    /// Raised when the provider CLI could not be executed at all.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Future returned by provider operations.
pub type MachineFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, MachineError>> + Send + 'a>>;

/// Capability for managing named machines under a provider account.
pub trait MachineProvider: Sync {
    /// Creates machine `name`. Not idempotent: a second call for the same
    /// name without an intervening [`MachineProvider::destroy`] fails.
    fn create<'a>(
        &'a self,
        name: &'a str,
        credentials: &'a MachineCredentials,
    ) -> MachineFuture<'a, MachineHandle>;

    /// Fetches the raw inspection document for machine `name`.
    fn inspect<'a>(&'a self, name: &'a str) -> MachineFuture<'a, MachineInspection>;

    /// Destroys machine `name`.
    fn destroy<'a>(&'a self, name: &'a str) -> MachineFuture<'a, ()>;

    /// Inspects machine `name` and parses its public address.
    fn address<'a>(&'a self, name: &'a str) -> MachineFuture<'a, IpAddr> {
        Box::pin(async move { self.inspect(name).await?.address() })
    }
}
