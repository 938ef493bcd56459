//! BDD scenarios for the provisioning workflow.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ProvisionContext, provision_context};

#[scenario(
    path = "tests/features/provision.feature",
    name = "Provision both hosts in order"
)]
fn scenario_full_run(provision_context: ProvisionContext) {
    drop(provision_context);
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Give up on the control host after exhausting attempts"
)]
fn scenario_control_host_exhausted(provision_context: ProvisionContext) {
    drop(provision_context);
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Recover the control host after a transient failure"
)]
fn scenario_control_host_recovers(provision_context: ProvisionContext) {
    drop(provision_context);
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Halt without retrying when tooling installation fails"
)]
fn scenario_tooling_failure(provision_context: ProvisionContext) {
    drop(provision_context);
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Skip seeding when the migration fails"
)]
fn scenario_migration_failure(provision_context: ProvisionContext) {
    drop(provision_context);
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Tear down both hosts swarm first"
)]
fn scenario_teardown(provision_context: ProvisionContext) {
    drop(provision_context);
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Keep the control host when the swarm host cannot be destroyed"
)]
fn scenario_teardown_keeps_gateway(provision_context: ProvisionContext) {
    drop(provision_context);
}
