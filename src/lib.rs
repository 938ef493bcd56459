//! Core library for the Bosun provisioning tool.
//!
//! Bosun brings up a two-host container swarm through a docker-machine
//! compatible provider CLI. The control host is created locally; the swarm
//! host is created, inspected and joined exclusively through commands run on
//! the control host. Every step is retried under its own policy and the
//! workflow halts, without rollback, on the first step that exhausts it.

pub mod config;
pub mod console;
pub mod machine;
pub mod provision;
pub mod retry;
pub mod session;
pub mod template;
pub mod test_support;

pub use config::{ConfigError, DEFAULT_MACHINE_DOWNLOAD_URL, ProvisionConfig};
pub use console::{
    ProgressReporter, PromptError, Prompter, SilentReporter, TerminalPrompter, TerminalReporter,
};
pub use machine::{
    LocalMachineProvider, MachineCredentials, MachineError, MachineHandle, MachineInspection,
    MachineProvider, TunneledMachineProvider,
};
pub use provision::{
    CleanupFailure, CleanupSummary, DnsRecord, DnsRecordKind, ProvisionError,
    ProvisionOrchestrator, ProvisionOutcome, ProvisionRequest, ProvisionStep, RequestError,
    StepError,
};
pub use retry::{RetryAttempt, RetryError, RetryPolicy};
pub use session::{
    CommandOutput, CommandRunner, MachineSshSession, ProcessCommandRunner, RemoteOutput,
    RemoteSession, SessionError,
};
pub use template::{ConfigTemplate, DeploymentDescriptor, TemplateError};
