//! Command-line interface definitions for the `bosun` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `bosun` binary.
#[derive(Debug, Parser)]
#[command(
    name = "bosun",
    about = "Bring up a two-host container swarm through a docker-machine compatible provider",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Create both hosts, form the swarm and deploy the stack.
    #[command(
        name = "provision",
        about = "Create both hosts, form the swarm and deploy the stack"
    )]
    Provision(ProvisionCommand),
    /// Destroy the swarm host and then the control host.
    #[command(
        name = "teardown",
        about = "Destroy the swarm host and then the control host"
    )]
    Teardown(TeardownCommand),
}

/// Arguments for the `bosun provision` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ProvisionCommand {
    /// Domain served by the deployment. Overrides `BOSUN_DOMAIN`; prompted
    /// for when neither is set.
    #[arg(long, value_name = "DOMAIN")]
    pub(crate) domain: Option<String>,
    /// Skip the confirmation prompt.
    #[arg(long, short = 'y')]
    pub(crate) yes: bool,
    /// Suppress progress output.
    #[arg(long, short = 'q')]
    pub(crate) quiet: bool,
}

/// Arguments for the `bosun teardown` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct TeardownCommand {
    /// Skip the confirmation prompt.
    #[arg(long, short = 'y')]
    pub(crate) yes: bool,
}
