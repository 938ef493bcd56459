//! Validated inputs for one provisioning run.

use crate::config::ProvisionConfig;
use crate::console::Prompter;
use crate::machine::MachineCredentials;

use super::RequestError;

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Everything the orchestrator needs for one run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionRequest {
    /// Public domain served by the deployment (lower-cased).
    pub domain: String,
    /// Name of the control host.
    pub control_host: String,
    /// Name of the swarm host.
    pub swarm_host: String,
    /// Provider account used for both hosts.
    pub credentials: MachineCredentials,
    /// Overlay network shared by proxy and stack.
    pub network: String,
    /// Stack name for `docker stack deploy`.
    pub stack_name: String,
    /// Remote path of the deployment descriptor.
    pub descriptor_path: String,
    /// Download URL of the provider CLI installed on the control host.
    pub machine_download_url: String,
    /// Migration command run inside the application container.
    pub migrate_command: String,
    /// Seed command run inside the application container.
    pub seed_command: String,
}

impl ProvisionRequest {
    /// Builds a request from configuration, prompting for a missing domain
    /// or access token.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] when configuration is invalid, prompting
    /// fails, or any supplied value fails validation.
    pub fn resolve(
        config: &ProvisionConfig,
        prompter: &impl Prompter,
    ) -> Result<Self, RequestError> {
        config.validate()?;

        let raw_domain = match config.domain.as_deref() {
            Some(value) if !value.trim().is_empty() => value.to_owned(),
            _ => prompter.input("Domain to deploy")?,
        };
        let domain = validate_domain(&raw_domain)?;

        validate_host_name(&config.control_host)?;
        validate_host_name(&config.swarm_host)?;
        if config.control_host == config.swarm_host {
            return Err(RequestError::DuplicateHostName {
                name: config.control_host.clone(),
            });
        }

        let token = match config.access_token.as_deref() {
            Some(value) if !value.trim().is_empty() => value.to_owned(),
            _ => prompter.password("Provider access token")?,
        };
        let access_token = token.trim();
        if access_token.is_empty() {
            return Err(RequestError::MissingToken);
        }

        let credentials = MachineCredentials::new(config.driver.clone(), access_token)
            .region(config.region.clone())
            .size(config.size.clone());

        Ok(Self {
            domain,
            control_host: config.control_host.clone(),
            swarm_host: config.swarm_host.clone(),
            credentials,
            network: config.network.clone(),
            stack_name: config.stack_name.clone(),
            descriptor_path: config.descriptor_path.clone(),
            machine_download_url: config.machine_download_url.clone(),
            migrate_command: config.migrate_command.clone(),
            seed_command: config.seed_command.clone(),
        })
    }
}

/// Checks `raw` against DNS hostname rules and returns it lower-cased.
///
/// # Errors
///
/// Returns [`RequestError::InvalidDomain`] naming the violated rule.
pub fn validate_domain(raw: &str) -> Result<String, RequestError> {
    let domain = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    let invalid = |reason| RequestError::InvalidDomain {
        domain: raw.to_owned(),
        reason,
    };

    if domain.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if domain.len() > MAX_DOMAIN_LEN {
        return Err(invalid("must be at most 253 characters"));
    }
    if !domain.contains('.') {
        return Err(invalid("must contain at least two labels"));
    }
    for label in domain.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(invalid("labels must be 1 to 63 characters"));
        }
        if !label
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
        {
            return Err(invalid("labels may only contain letters, digits and hyphens"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid("labels must not start or end with a hyphen"));
        }
    }
    Ok(domain)
}

/// Checks that `name` is usable as a machine name.
///
/// # Errors
///
/// Returns [`RequestError::InvalidHostName`] naming the violated rule.
pub fn validate_host_name(name: &str) -> Result<(), RequestError> {
    let invalid = |reason| RequestError::InvalidHostName {
        name: name.to_owned(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.len() > MAX_LABEL_LEN {
        return Err(invalid("must be at most 63 characters"));
    }
    if !name
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
    {
        return Err(invalid("may only contain lowercase letters, digits and hyphens"));
    }
    if name.starts_with('-') {
        return Err(invalid("must not start with a hyphen"));
    }
    Ok(())
}
