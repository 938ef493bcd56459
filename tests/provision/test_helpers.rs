//! Shared fixtures for provisioning BDD scenarios.

use bosun::test_support::{
    CallLog, RecordingReporter, ScriptedPrompter, ScriptedProvider, ScriptedSession,
    sample_config,
};
use bosun::{
    CleanupSummary, ConfigTemplate, ProvisionConfig, ProvisionOrchestrator, ProvisionRequest,
};
use rstest::fixture;

pub const CONTROL_IP: &str = "203.0.113.10";
pub const SWARM_IP: &str = "203.0.113.20";

pub type ScriptedOrchestrator =
    ProvisionOrchestrator<ScriptedProvider, ScriptedSession, RecordingReporter>;

#[derive(Clone, Debug)]
pub struct ProvisionContext {
    pub log: CallLog,
    pub provider: ScriptedProvider,
    pub session: ScriptedSession,
    pub reporter: RecordingReporter,
    pub request: ProvisionRequest,
    pub outcome: Option<ProvisionResult>,
    pub cleanup: Option<CleanupSummary>,
}

impl ProvisionContext {
    pub fn orchestrator(&self) -> ScriptedOrchestrator {
        ProvisionOrchestrator::new(
            self.provider.clone(),
            self.session.clone(),
            ConfigTemplate::builtin(self.request.network.clone()),
            self.reporter.clone(),
        )
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionFailure {
    pub step: String,
    pub residual_hosts: Vec<String>,
    pub message: String,
}

#[derive(Clone, Debug)]
pub enum ProvisionResult {
    Success(bosun::ProvisionOutcome),
    Failure(ProvisionFailure),
}

#[fixture]
pub fn provision_context() -> ProvisionContext {
    let config = ProvisionConfig {
        domain: Some(String::from("example.com")),
        access_token: Some(String::from("token")),
        region: Some(String::from("lon1")),
        ..sample_config()
    };
    let request = ProvisionRequest::resolve(&config, &ScriptedPrompter::new())
        .unwrap_or_else(|err| panic!("request fixture should resolve: {err}"));

    let log = CallLog::new();
    ProvisionContext {
        provider: ScriptedProvider::new(log.clone()),
        session: ScriptedSession::new(log.clone()),
        reporter: RecordingReporter::new(),
        log,
        request,
        outcome: None,
        cleanup: None,
    }
}

/// Splits a comma-separated list of host names from a feature file.
pub fn host_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}
