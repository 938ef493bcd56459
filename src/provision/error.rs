//! Error types for the provisioning workflow.

use thiserror::Error;

use crate::config::ConfigError;
use crate::console::PromptError;
use crate::machine::MachineError;
use crate::session::SessionError;

use super::ProvisionStep;

/// Failure of a single step attempt.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StepError {
    /// Raised by machine lifecycle calls.
    #[error(transparent)]
    Machine(#[from] MachineError),
    /// Raised by remote command execution.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Errors that halt the provisioning workflow.
///
/// Both variants carry the hosts created before the failure. The workflow
/// never rolls back, so these hosts remain billed until torn down.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// Raised when a step exhausts its attempts.
    #[error("step {step} failed after {attempts} attempt(s): {source}")]
    Step {
        /// Failing step.
        step: ProvisionStep,
        /// Attempts made before giving up.
        attempts: u32,
        /// Error of the final attempt.
        #[source]
        source: StepError,
        /// Hosts created before the failure.
        residual_hosts: Vec<String>,
    },
    /// Raised when a step succeeded but its output cannot be used.
    #[error("step {step} returned unusable output: {source}")]
    MalformedOutput {
        /// Failing step.
        step: ProvisionStep,
        /// Parser diagnostics.
        #[source]
        source: MachineError,
        /// Hosts created before the failure.
        residual_hosts: Vec<String>,
    },
}

impl ProvisionError {
    /// Returns the step that halted the workflow.
    #[must_use]
    pub const fn step(&self) -> ProvisionStep {
        match self {
            Self::Step { step, .. } | Self::MalformedOutput { step, .. } => *step,
        }
    }

    /// Returns the hosts left behind by the halted workflow.
    #[must_use]
    pub fn residual_hosts(&self) -> &[String] {
        match self {
            Self::Step { residual_hosts, .. } | Self::MalformedOutput { residual_hosts, .. } => {
                residual_hosts
            }
        }
    }
}

/// Errors raised while assembling a [`super::ProvisionRequest`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RequestError {
    /// Raised when configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Raised when the operator could not be prompted.
    #[error("prompt failed: {0}")]
    Prompt(#[from] PromptError),
    /// Raised when the domain is not a valid DNS name.
    #[error("invalid domain `{domain}`: {reason}")]
    InvalidDomain {
        /// Value supplied by the operator.
        domain: String,
        /// Rule that was violated.
        reason: &'static str,
    },
    /// Raised when a host name is not usable as a machine name.
    #[error("invalid host name `{name}`: {reason}")]
    InvalidHostName {
        /// Value supplied by configuration.
        name: String,
        /// Rule that was violated.
        reason: &'static str,
    },
    /// Raised when both hosts share a name.
    #[error("control and swarm hosts must have distinct names (both are `{name}`)")]
    DuplicateHostName {
        /// The shared name.
        name: String,
    },
    /// Raised when no access token was configured or entered.
    #[error("provider access token must not be empty: set BOSUN_ACCESS_TOKEN or access_token in bosun.toml")]
    MissingToken,
}
