//! Binary entry point for the Bosun CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use bosun::provision::validate_host_name;
use bosun::{
    CleanupSummary, ConfigError, ConfigTemplate, LocalMachineProvider, MachineSshSession,
    ProcessCommandRunner, ProgressReporter, PromptError, Prompter, ProvisionConfig,
    ProvisionError, ProvisionOrchestrator, ProvisionOutcome, ProvisionRequest, RequestError,
    SilentReporter, TerminalPrompter, TerminalReporter,
};

mod cli;

use cli::{Cli, ProvisionCommand, TeardownCommand};

type Orchestrator<R> = ProvisionOrchestrator<
    LocalMachineProvider<ProcessCommandRunner>,
    MachineSshSession<ProcessCommandRunner>,
    R,
>;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Request(#[from] RequestError),
    #[error("prompt failed: {0}")]
    Prompt(#[from] PromptError),
    #[error("provisioning failed: {0}")]
    Provision(#[from] ProvisionError),
    #[error("teardown could not destroy {count} host(s)")]
    Teardown { count: usize },
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
    #[error("aborted by operator")]
    Aborted,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BOSUN_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Provision(command) => exec_provision(command).await,
        Cli::Teardown(command) => exec_teardown(&command).await,
    }
}

async fn exec_provision(args: ProvisionCommand) -> Result<(), CliError> {
    let mut config = ProvisionConfig::load_without_cli_args()?;
    if args.domain.is_some() {
        config.domain = args.domain;
    }
    let prompter = TerminalPrompter;
    let request = ProvisionRequest::resolve(&config, &prompter)?;

    let assume_yes = args.yes || config.assume_yes;
    if !assume_yes && !prompter.confirm(&provision_prompt(&request), false)? {
        return Err(CliError::Aborted);
    }

    let template = config.template()?;
    let outcome = if args.quiet {
        build_orchestrator(&config, template, SilentReporter)?
            .execute(&request)
            .await?
    } else {
        build_orchestrator(&config, template, TerminalReporter::new())?
            .execute(&request)
            .await?
    };

    write_outcome(io::stdout().lock(), &outcome)?;
    Ok(())
}

async fn exec_teardown(args: &TeardownCommand) -> Result<(), CliError> {
    let config = ProvisionConfig::load_without_cli_args()?;
    config.validate()?;
    validate_host_name(&config.control_host)?;
    validate_host_name(&config.swarm_host)?;

    let assume_yes = args.yes || config.assume_yes;
    let prompt = format!(
        "Destroy `{}` and then `{}`?",
        config.swarm_host, config.control_host
    );
    if !assume_yes && !TerminalPrompter.confirm(&prompt, false)? {
        return Err(CliError::Aborted);
    }

    let template = ConfigTemplate::builtin(config.network.clone());
    let orchestrator = build_orchestrator(&config, template, TerminalReporter::new())?;
    let summary = orchestrator
        .cleanup_all(&config.control_host, &config.swarm_host)
        .await;

    write_cleanup(io::stdout().lock(), &summary)?;
    if summary.is_clean() {
        Ok(())
    } else {
        Err(CliError::Teardown {
            count: summary.remaining(),
        })
    }
}

fn build_orchestrator<R: ProgressReporter>(
    config: &ProvisionConfig,
    template: ConfigTemplate,
    reporter: R,
) -> Result<Orchestrator<R>, CliError> {
    let provider = LocalMachineProvider::with_process_runner(config.machine_bin.clone());
    let session = MachineSshSession::with_process_runner(config.machine_bin.clone());
    Ok(ProvisionOrchestrator::new(provider, session, template, reporter)
        .with_retry_policy(config.retry_policy()?))
}

fn provision_prompt(request: &ProvisionRequest) -> String {
    format!(
        "Create `{}` and `{}` with driver `{}` and deploy {}?",
        request.control_host, request.swarm_host, request.credentials.driver, request.domain
    )
}

fn write_outcome(mut target: impl Write, outcome: &ProvisionOutcome) -> io::Result<()> {
    for host in [&outcome.control_host, &outcome.swarm_host] {
        let address = host
            .address
            .map_or_else(|| String::from("unknown"), |ip| ip.to_string());
        writeln!(target, "{}\t{address}", host.name)?;
    }
    writeln!(target)?;
    writeln!(target, "Publish these DNS records:")?;
    for record in &outcome.dns_records {
        writeln!(target, "{}\t{}\t{}", record.name, record.kind, record.target)?;
    }
    Ok(())
}

fn write_cleanup(mut target: impl Write, summary: &CleanupSummary) -> io::Result<()> {
    for host in &summary.destroyed {
        writeln!(target, "destroyed {host}")?;
    }
    for host in &summary.missing {
        writeln!(target, "already absent {host}")?;
    }
    for failure in &summary.failed {
        writeln!(target, "failed {}: {}", failure.host, failure.message)?;
    }
    for host in &summary.skipped {
        writeln!(target, "kept {host}")?;
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
    if let CliError::Provision(provision) = err {
        let residual = provision.residual_hosts();
        if !residual.is_empty() {
            writeln!(
                target,
                "hosts left running: {} (remove them with `bosun teardown`)",
                residual.join(", ")
            )
            .ok();
        }
    }
}
