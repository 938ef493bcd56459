//! Two-host provisioning workflow.
//!
//! [`ProvisionOrchestrator::execute`] runs the fixed sequence of
//! [`ProvisionStep`]s strictly in order. Each step is wrapped in its own
//! [`RetryPolicy`]; a step that exhausts its attempts halts the workflow and
//! nothing is rolled back. The swarm host is created, inspected and joined
//! exclusively through commands run on the control host.

use std::fmt::{self, Display};
use std::future::{Future, Ready, ready};
use std::net::IpAddr;

use crate::console::ProgressReporter;
use crate::machine::{
    MachineError, MachineHandle, MachineInspection, MachineProvider, TunneledMachineProvider,
};
use crate::retry::{RetryAttempt, RetryError, RetryPolicy};
use crate::session::{RemoteOutput, RemoteSession};
use crate::template::ConfigTemplate;

mod commands;
mod error;
mod request;
mod step;

pub use commands::REMOTE_MACHINE_BIN;
pub use error::{ProvisionError, RequestError, StepError};
pub use request::{ProvisionRequest, validate_domain, validate_host_name};
pub use step::ProvisionStep;

/// Kind of DNS record the operator should publish.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DnsRecordKind {
    /// Address record.
    A,
    /// Alias record.
    Cname,
}

impl fmt::Display for DnsRecordKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::A => "A",
            Self::Cname => "CNAME",
        })
    }
}

/// DNS record to publish once provisioning succeeds.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DnsRecord {
    /// Record name.
    pub name: String,
    /// Record type.
    pub kind: DnsRecordKind,
    /// Address or alias target.
    pub target: String,
}

/// Records pointing `domain` at both hosts plus a `www` alias.
#[must_use]
pub fn dns_records(domain: &str, control: IpAddr, swarm: IpAddr) -> Vec<DnsRecord> {
    vec![
        DnsRecord {
            name: domain.to_owned(),
            kind: DnsRecordKind::A,
            target: control.to_string(),
        },
        DnsRecord {
            name: domain.to_owned(),
            kind: DnsRecordKind::A,
            target: swarm.to_string(),
        },
        DnsRecord {
            name: format!("www.{domain}"),
            kind: DnsRecordKind::Cname,
            target: domain.to_owned(),
        },
    ]
}

/// Result of a completed provisioning run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionOutcome {
    /// Control host with its address.
    pub control_host: MachineHandle,
    /// Swarm host with its address.
    pub swarm_host: MachineHandle,
    /// Records the operator must publish.
    pub dns_records: Vec<DnsRecord>,
}

/// Host that teardown could not destroy.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CleanupFailure {
    /// Host name.
    pub host: String,
    /// Rendered error.
    pub message: String,
}

/// Result of a best-effort teardown.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CleanupSummary {
    /// Hosts destroyed by this teardown.
    pub destroyed: Vec<String>,
    /// Hosts the provider reported as already absent.
    pub missing: Vec<String>,
    /// Hosts whose destruction failed.
    pub failed: Vec<CleanupFailure>,
    /// Hosts left running because destroying them would strand another host.
    pub skipped: Vec<String>,
}

impl CleanupSummary {
    /// Returns `true` when every host is gone.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    /// Number of hosts that may still be running.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.failed.len() + self.skipped.len()
    }

    fn record(&mut self, host: &str, result: Result<(), MachineError>) {
        match result {
            Ok(()) => self.destroyed.push(host.to_owned()),
            Err(MachineError::NotFound { .. }) => self.missing.push(host.to_owned()),
            Err(err) => self.failed.push(CleanupFailure {
                host: host.to_owned(),
                message: err.to_string(),
            }),
        }
    }
}

fn no_compensation(_attempt: RetryAttempt) -> Ready<Result<(), MachineError>> {
    ready(Ok(()))
}

/// Runs the provisioning workflow against injected capabilities.
#[derive(Debug)]
pub struct ProvisionOrchestrator<P, S, R> {
    provider: P,
    session: S,
    template: ConfigTemplate,
    reporter: R,
    retry: RetryPolicy,
}

impl<P, S, R> ProvisionOrchestrator<P, S, R>
where
    P: MachineProvider,
    S: RemoteSession,
    R: ProgressReporter,
{
    /// Creates an orchestrator using the default retry policy.
    #[must_use]
    pub fn new(provider: P, session: S, template: ConfigTemplate, reporter: R) -> Self {
        Self {
            provider,
            session,
            template,
            reporter,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the policy applied to repeatable steps.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs every step in order and returns both hosts with the DNS records
    /// to publish.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] naming the failing step and the hosts
    /// created before it.
    pub async fn execute(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        let control = request.control_host.as_str();
        let swarm = request.swarm_host.as_str();
        let credentials = &request.credentials;
        let provider = &self.provider;
        let reporter = &self.reporter;
        let mut created: Vec<String> = Vec::new();

        self.run_step(
            ProvisionStep::CreateControlHost,
            &created,
            move || provider.create(control, credentials),
            move |_| {
                reporter.warn(&format!("destroying {control} before retrying"));
                provider.destroy(control)
            },
        )
        .await?;
        created.push(control.to_owned());

        let control_address = self
            .address_step(ProvisionStep::AddressControlHost, provider, control, &created)
            .await?;

        self.run_remote(
            ProvisionStep::InstallTooling,
            control,
            &commands::install_tooling(&request.machine_download_url),
            &created,
        )
        .await?;

        let tunnel = TunneledMachineProvider::new(&self.session, control, REMOTE_MACHINE_BIN);
        let gateway = &tunnel;
        self.run_step(
            ProvisionStep::CreateSwarmHost,
            &created,
            move || gateway.create(swarm, credentials),
            move |_| {
                reporter.warn(&format!("destroying {swarm} before retrying"));
                gateway.destroy(swarm)
            },
        )
        .await?;
        created.push(swarm.to_owned());

        let swarm_address = self
            .address_step(ProvisionStep::AddressSwarmHost, gateway, swarm, &created)
            .await?;

        self.run_remote(
            ProvisionStep::InitCluster,
            control,
            &commands::init_cluster(control_address, swarm),
            &created,
        )
        .await?;
        self.run_remote(
            ProvisionStep::CreateNetwork,
            control,
            &commands::create_network(&request.network),
            &created,
        )
        .await?;
        self.run_remote(
            ProvisionStep::DeployListener,
            control,
            &commands::deploy_listener(&request.network),
            &created,
        )
        .await?;
        self.run_remote(
            ProvisionStep::DeployProxy,
            control,
            &commands::deploy_proxy(&request.network),
            &created,
        )
        .await?;

        let descriptor = self
            .template
            .render(&request.domain, &swarm_address.to_string());
        self.run_remote(
            ProvisionStep::WriteDescriptor,
            control,
            &commands::write_descriptor(&request.descriptor_path, &descriptor.document),
            &created,
        )
        .await?;
        self.run_remote(
            ProvisionStep::StartStack,
            control,
            &commands::start_stack(&request.descriptor_path, &request.stack_name),
            &created,
        )
        .await?;
        self.run_remote(
            ProvisionStep::Migrate,
            control,
            &commands::exec_in_app(&request.stack_name, &request.migrate_command),
            &created,
        )
        .await?;
        self.run_remote(
            ProvisionStep::Seed,
            control,
            &commands::exec_in_app(&request.stack_name, &request.seed_command),
            &created,
        )
        .await?;

        tracing::info!(%control_address, %swarm_address, "provisioning complete");
        Ok(ProvisionOutcome {
            control_host: MachineHandle::new(control).with_address(control_address),
            swarm_host: MachineHandle::new(swarm).with_address(swarm_address),
            dns_records: dns_records(&request.domain, control_address, swarm_address),
        })
    }

    /// Destroys the swarm host (through the control host) and then the
    /// control host.
    ///
    /// The swarm host is only reachable through the control host, so the
    /// control host is kept when the swarm host could not be confirmed gone.
    pub async fn cleanup_all(&self, control: &str, swarm: &str) -> CleanupSummary {
        let mut summary = CleanupSummary::default();
        let tunnel = TunneledMachineProvider::new(&self.session, control, REMOTE_MACHINE_BIN);

        self.reporter.step(&format!("destroy {swarm}"));
        let swarm_result = tunnel.destroy(swarm).await;
        self.report_cleanup(swarm, &swarm_result);
        let swarm_gone = matches!(swarm_result, Ok(()) | Err(MachineError::NotFound { .. }));
        summary.record(swarm, swarm_result);
        if !swarm_gone {
            tracing::warn!(host = control, swarm, "keeping control host while swarm host remains");
            self.reporter.failure(
                &format!("destroy {control}"),
                &format!("skipped: {swarm} is only reachable through {control}"),
            );
            summary.skipped.push(control.to_owned());
            return summary;
        }

        self.reporter.step(&format!("destroy {control}"));
        let result = self.provider.destroy(control).await;
        self.report_cleanup(control, &result);
        summary.record(control, result);

        summary
    }

    fn report_cleanup(&self, host: &str, result: &Result<(), MachineError>) {
        match result {
            Ok(()) => {
                tracing::info!(host, "host destroyed");
                self.reporter.success(&format!("destroyed {host}"));
            }
            Err(MachineError::NotFound { .. }) => {
                tracing::info!(host, "host already absent");
                self.reporter.success(&format!("{host} already absent"));
            }
            Err(err) => {
                tracing::warn!(host, error = %err, "failed to destroy host");
                self.reporter.failure(&format!("destroy {host}"), &err.to_string());
            }
        }
    }

    async fn address_step<M: MachineProvider>(
        &self,
        step: ProvisionStep,
        machines: &M,
        name: &str,
        created: &[String],
    ) -> Result<IpAddr, ProvisionError> {
        let inspection: MachineInspection = self
            .run_step(step, created, move || machines.inspect(name), no_compensation)
            .await?;
        inspection.address().map_err(|source| {
            self.reporter.failure(step.label(), &source.to_string());
            tracing::error!(step = step.label(), error = %source, "unusable inspection output");
            ProvisionError::MalformedOutput {
                step,
                source,
                residual_hosts: created.to_vec(),
            }
        })
    }

    async fn run_remote(
        &self,
        step: ProvisionStep,
        host: &str,
        command: &str,
        created: &[String],
    ) -> Result<RemoteOutput, ProvisionError> {
        let session = &self.session;
        self.run_step(
            step,
            created,
            move || session.run(host, command),
            no_compensation,
        )
        .await
    }

    async fn run_step<T, E, A, Fut, C, CFut>(
        &self,
        step: ProvisionStep,
        created: &[String],
        action: A,
        mut compensation: C,
    ) -> Result<T, ProvisionError>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display + Into<StepError>,
        C: FnMut(RetryAttempt) -> CFut,
        CFut: Future<Output = Result<(), MachineError>>,
    {
        let label = step.label();
        let reporter = &self.reporter;
        reporter.step(label);
        tracing::info!(step = label, "starting step");

        let on_failure = move |attempt: RetryAttempt| {
            tracing::warn!(
                step = label,
                attempt = attempt.attempt,
                max_attempts = attempt.max_attempts,
                error = %attempt.last_error,
                "step attempt failed; retrying"
            );
            reporter.warn(&format!(
                "{label}: attempt {}/{} failed: {}",
                attempt.attempt, attempt.max_attempts, attempt.last_error
            ));
            compensation(attempt)
        };

        match step
            .retry_policy(self.retry)
            .execute_with_compensation(action, on_failure)
            .await
        {
            Ok(value) => {
                reporter.success(label);
                tracing::info!(step = label, "step completed");
                Ok(value)
            }
            Err(RetryError::Exhausted { attempts, source }) => {
                let cause: StepError = source.into();
                reporter.failure(label, &cause.to_string());
                tracing::error!(step = label, attempts, error = %cause, "step failed");
                Err(ProvisionError::Step {
                    step,
                    attempts,
                    source: cause,
                    residual_hosts: created.to_vec(),
                })
            }
        }
    }
}
