//! Named workflow steps and their retry budgets.

use std::fmt;

use crate::retry::RetryPolicy;

/// One unit of the provisioning workflow, in execution order.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ProvisionStep {
    /// Create the control host through the local provider.
    CreateControlHost,
    /// Inspect the control host for its public address.
    AddressControlHost,
    /// Install the provider CLI on the control host.
    InstallTooling,
    /// Create the swarm host through the control host.
    CreateSwarmHost,
    /// Inspect the swarm host through the control host.
    AddressSwarmHost,
    /// Initialise the swarm on the control host and join the swarm host.
    InitCluster,
    /// Create the attachable overlay network.
    CreateNetwork,
    /// Start the swarm listener service.
    DeployListener,
    /// Start the reverse proxy service.
    DeployProxy,
    /// Write the rendered deployment descriptor to the control host.
    WriteDescriptor,
    /// Deploy the application stack from the descriptor.
    StartStack,
    /// Run schema migrations inside the application container.
    Migrate,
    /// Seed data inside the application container.
    Seed,
}

impl ProvisionStep {
    /// Every step in execution order.
    pub const ALL: [Self; 13] = [
        Self::CreateControlHost,
        Self::AddressControlHost,
        Self::InstallTooling,
        Self::CreateSwarmHost,
        Self::AddressSwarmHost,
        Self::InitCluster,
        Self::CreateNetwork,
        Self::DeployListener,
        Self::DeployProxy,
        Self::WriteDescriptor,
        Self::StartStack,
        Self::Migrate,
        Self::Seed,
    ];

    /// Stable kebab-case label used in logs and operator output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CreateControlHost => "create-control-host",
            Self::AddressControlHost => "address-control-host",
            Self::InstallTooling => "install-tooling",
            Self::CreateSwarmHost => "create-swarm-host",
            Self::AddressSwarmHost => "address-swarm-host",
            Self::InitCluster => "init-cluster",
            Self::CreateNetwork => "create-network",
            Self::DeployListener => "deploy-listener",
            Self::DeployProxy => "deploy-proxy",
            Self::WriteDescriptor => "write-descriptor",
            Self::StartStack => "start-stack",
            Self::Migrate => "migrate",
            Self::Seed => "seed",
        }
    }

    /// Whether a failed attempt may be repeated. Tooling installation,
    /// cluster initialisation, migration and seeding run once.
    #[must_use]
    pub const fn is_repeatable(self) -> bool {
        !matches!(
            self,
            Self::InstallTooling | Self::InitCluster | Self::Migrate | Self::Seed
        )
    }

    /// Returns the policy for this step given the configured policy.
    #[must_use]
    pub const fn retry_policy(self, configured: RetryPolicy) -> RetryPolicy {
        if self.is_repeatable() {
            configured
        } else {
            RetryPolicy::single()
        }
    }
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}
