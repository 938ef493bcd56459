//! BDD step definitions for the provisioning workflow.

use bosun::DnsRecordKind;
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{
    CONTROL_IP, ProvisionContext, ProvisionFailure, ProvisionResult, SWARM_IP, host_list,
};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn failure(provision_context: &ProvisionContext) -> Result<&ProvisionFailure, StepError> {
    match provision_context.outcome.as_ref() {
        Some(ProvisionResult::Failure(failure)) => Ok(failure),
        Some(ProvisionResult::Success(outcome)) => Err(StepError::Assertion(format!(
            "expected failure, got success: {outcome:?}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[given("a scripted provider with both hosts reachable")]
fn both_hosts_reachable(provision_context: ProvisionContext) -> ProvisionContext {
    provision_context.provider.set_address("control", CONTROL_IP);
    provision_context
        .session
        .set_tunneled_address("control", "swarm", SWARM_IP);
    provision_context
}

#[given("control host creation fails \"{times}\" times")]
fn control_creation_fails(provision_context: ProvisionContext, times: u32) -> ProvisionContext {
    provision_context.provider.fail_create("control", times);
    provision_context
}

#[given("remote command \"{needle}\" fails \"{times}\" times")]
fn remote_command_fails(
    provision_context: ProvisionContext,
    needle: String,
    times: u32,
) -> ProvisionContext {
    provision_context.session.fail("control", &needle, times);
    provision_context
}

#[when("I provision the deployment")]
fn provision(mut provision_context: ProvisionContext) -> Result<ProvisionContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let orchestrator = provision_context.orchestrator();
    let request = provision_context.request.clone();

    let result = runtime.block_on(async move { orchestrator.execute(&request).await });
    provision_context.outcome = Some(match result {
        Ok(outcome) => ProvisionResult::Success(outcome),
        Err(err) => ProvisionResult::Failure(ProvisionFailure {
            step: err.step().label().to_owned(),
            residual_hosts: err.residual_hosts().to_vec(),
            message: err.to_string(),
        }),
    });
    Ok(provision_context)
}

#[when("I tear down the deployment")]
fn tear_down(mut provision_context: ProvisionContext) -> Result<ProvisionContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let orchestrator = provision_context.orchestrator();
    let control = provision_context.request.control_host.clone();
    let swarm = provision_context.request.swarm_host.clone();

    let summary =
        runtime.block_on(async move { orchestrator.cleanup_all(&control, &swarm).await });
    provision_context.cleanup = Some(summary);
    Ok(provision_context)
}

#[then("provisioning succeeds")]
fn provisioning_succeeds(provision_context: &ProvisionContext) -> Result<(), StepError> {
    match provision_context.outcome.as_ref() {
        Some(ProvisionResult::Success(_)) => Ok(()),
        Some(ProvisionResult::Failure(failure)) => Err(StepError::Assertion(format!(
            "expected success, got failure: {}",
            failure.message
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("provisioning fails at step \"{step}\"")]
fn provisioning_fails_at(
    provision_context: &ProvisionContext,
    step: String,
) -> Result<(), StepError> {
    let failure = failure(provision_context)?;
    if failure.step == step {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected failure at {step}, got {}: {}",
            failure.step, failure.message
        )))
    }
}

#[then("the swarm host is created through the control host")]
fn swarm_created_through_control(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let log = &provision_context.log;
    if log.count("create swarm") > 0 {
        return Err(StepError::Assertion(String::from(
            "swarm host must not be created by the local provider",
        )));
    }
    match log.position("run control: docker-machine create") {
        Some(_) => Ok(()),
        None => Err(StepError::Assertion(format!(
            "expected a tunnelled create, got {:?}",
            log.entries()
        ))),
    }
}

#[then("the DNS records point at both hosts")]
fn dns_records_point_at_hosts(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let Some(ProvisionResult::Success(outcome)) = provision_context.outcome.as_ref() else {
        return Err(StepError::Assertion(String::from("expected success")));
    };
    let targets: Vec<&str> = outcome
        .dns_records
        .iter()
        .filter(|record| record.kind == DnsRecordKind::A)
        .map(|record| record.target.as_str())
        .collect();
    let has_alias = outcome
        .dns_records
        .iter()
        .any(|record| record.kind == DnsRecordKind::Cname && record.name == "www.example.com");
    if targets == [CONTROL_IP, SWARM_IP] && has_alias {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "unexpected records: {:?}",
            outcome.dns_records
        )))
    }
}

#[then("the control host was created \"{times}\" times")]
fn control_created_times(
    provision_context: &ProvisionContext,
    times: usize,
) -> Result<(), StepError> {
    let creates = provision_context.log.count("create control");
    if creates == times {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {times} creates, got {creates}"
        )))
    }
}

#[then("no host is left running")]
fn no_residual_hosts(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let failure = failure(provision_context)?;
    if failure.residual_hosts.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no residual hosts, got {:?}",
            failure.residual_hosts
        )))
    }
}

#[then("the hosts left running are \"{hosts}\"")]
fn residual_hosts(provision_context: &ProvisionContext, hosts: String) -> Result<(), StepError> {
    let failure = failure(provision_context)?;
    let expected = host_list(&hosts);
    if failure.residual_hosts == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected residual hosts {expected:?}, got {:?}",
            failure.residual_hosts
        )))
    }
}

#[then("the swarm host is never touched")]
fn swarm_untouched(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let entries = provision_context.log.entries();
    if entries.iter().any(|entry| entry.contains("swarm")) {
        Err(StepError::Assertion(format!(
            "swarm host should not be touched: {entries:?}"
        )))
    } else {
        Ok(())
    }
}

#[then("the half-created control host was destroyed before the retry")]
fn control_compensated(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let entries = provision_context.log.entries();
    let prefix: Vec<&str> = entries.iter().take(3).map(String::as_str).collect();
    if prefix == ["create control", "destroy control", "create control"] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected create, destroy, create; got {entries:?}"
        )))
    }
}

#[then("remote command \"{needle}\" never ran")]
fn remote_command_never_ran(
    provision_context: &ProvisionContext,
    needle: String,
) -> Result<(), StepError> {
    let runs = provision_context.log.count(&needle);
    if runs == 0 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected `{needle}` not to run, ran {runs} time(s)"
        )))
    }
}

#[then("teardown destroyed \"{hosts}\"")]
fn teardown_destroyed(
    provision_context: &ProvisionContext,
    hosts: String,
) -> Result<(), StepError> {
    let Some(summary) = provision_context.cleanup.as_ref() else {
        return Err(StepError::Assertion(String::from("missing teardown summary")));
    };
    let expected = host_list(&hosts);
    if summary.destroyed == expected && summary.is_clean() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {expected:?} destroyed, got {summary:?}"
        )))
    }
}

#[then("teardown failed on \"{failed}\" and kept \"{kept}\"")]
fn teardown_kept(
    provision_context: &ProvisionContext,
    failed: String,
    kept: String,
) -> Result<(), StepError> {
    let Some(summary) = provision_context.cleanup.as_ref() else {
        return Err(StepError::Assertion(String::from("missing teardown summary")));
    };
    let failed_hosts: Vec<&str> = summary
        .failed
        .iter()
        .map(|failure| failure.host.as_str())
        .collect();
    if failed_hosts == [failed.as_str()] && summary.skipped == [kept.as_str()] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {failed} failed and {kept} kept, got {summary:?}"
        )))
    }
}
