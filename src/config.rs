//! Configuration loading via `ortho-config`.

use std::num::NonZeroU32;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::retry::RetryPolicy;
use crate::template::{ConfigTemplate, TemplateError};

/// Release binary installed on the control host so it can manage the swarm
/// host.
pub const DEFAULT_MACHINE_DOWNLOAD_URL: &str = "https://github.com/docker/machine/releases/download/v0.16.2/docker-machine-Linux-x86_64";

/// Provisioning settings merged from defaults, configuration files and
/// environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "BOSUN",
    discovery(
        app_name = "bosun",
        env_var = "BOSUN_CONFIG_PATH",
        config_file_name = "bosun.toml",
        dotfile_name = ".bosun.toml",
        project_file_name = "bosun.toml"
    )
)]
pub struct ProvisionConfig {
    /// Provider CLI executable. Must speak the docker-machine command set.
    #[ortho_config(default = "docker-machine".to_owned())]
    pub machine_bin: String,
    /// Provider driver passed to `create --driver`.
    #[ortho_config(default = "digitalocean".to_owned())]
    pub driver: String,
    /// Provider API token. Prompted for when absent.
    pub access_token: Option<String>,
    /// Provider region slug.
    pub region: Option<String>,
    /// Provider machine size slug.
    pub size: Option<String>,
    /// Public domain served by the deployment. Prompted for when absent.
    pub domain: Option<String>,
    /// Name of the control host (host A).
    #[ortho_config(default = "control".to_owned())]
    pub control_host: String,
    /// Name of the swarm host (host B), created through the control host.
    #[ortho_config(default = "swarm".to_owned())]
    pub swarm_host: String,
    /// Overlay network shared by the proxy and the application stack.
    #[ortho_config(default = "proxy".to_owned())]
    pub network: String,
    /// Stack name passed to `docker stack deploy`.
    #[ortho_config(default = "app".to_owned())]
    pub stack_name: String,
    /// Where the rendered descriptor is written on the control host.
    #[ortho_config(default = "/root/docker-stack.yml".to_owned())]
    pub descriptor_path: String,
    /// Local template file replacing the built-in stack template. Supports
    /// tilde expansion.
    pub template_file: Option<String>,
    /// URL of the provider CLI binary installed on the control host.
    #[ortho_config(default = DEFAULT_MACHINE_DOWNLOAD_URL.to_owned())]
    pub machine_download_url: String,
    /// Command run inside the application container to migrate the schema.
    #[ortho_config(default = "npm run migrate".to_owned())]
    pub migrate_command: String,
    /// Command run inside the application container to seed data.
    #[ortho_config(default = "npm run seed".to_owned())]
    pub seed_command: String,
    /// Attempt budget for retried steps.
    #[ortho_config(default = 5)]
    pub max_attempts: u32,
    /// Skips the confirmation prompt.
    #[ortho_config(default = false)]
    pub assume_yes: bool,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl ProvisionConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to bosun.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("bosun")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and TOML key that supply each field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is blank
    /// and [`ConfigError::InvalidAttempts`] when `max_attempts` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (
                &self.machine_bin,
                FieldMetadata::new("provider CLI binary", "BOSUN_MACHINE_BIN", "machine_bin"),
            ),
            (
                &self.driver,
                FieldMetadata::new("provider driver", "BOSUN_DRIVER", "driver"),
            ),
            (
                &self.control_host,
                FieldMetadata::new("control host name", "BOSUN_CONTROL_HOST", "control_host"),
            ),
            (
                &self.swarm_host,
                FieldMetadata::new("swarm host name", "BOSUN_SWARM_HOST", "swarm_host"),
            ),
            (
                &self.network,
                FieldMetadata::new("overlay network name", "BOSUN_NETWORK", "network"),
            ),
            (
                &self.stack_name,
                FieldMetadata::new("stack name", "BOSUN_STACK_NAME", "stack_name"),
            ),
            (
                &self.descriptor_path,
                FieldMetadata::new(
                    "remote descriptor path",
                    "BOSUN_DESCRIPTOR_PATH",
                    "descriptor_path",
                ),
            ),
            (
                &self.machine_download_url,
                FieldMetadata::new(
                    "provider CLI download URL",
                    "BOSUN_MACHINE_DOWNLOAD_URL",
                    "machine_download_url",
                ),
            ),
            (
                &self.migrate_command,
                FieldMetadata::new("migration command", "BOSUN_MIGRATE_COMMAND", "migrate_command"),
            ),
            (
                &self.seed_command,
                FieldMetadata::new("seed command", "BOSUN_SEED_COMMAND", "seed_command"),
            ),
        ];
        for (value, metadata) in &required {
            Self::require_field(value, metadata)?;
        }
        self.attempts().map(|_| ())
    }

    fn attempts(&self) -> Result<NonZeroU32, ConfigError> {
        NonZeroU32::new(self.max_attempts).ok_or(ConfigError::InvalidAttempts)
    }

    /// Returns the retry policy for steps that may be repeated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAttempts`] when `max_attempts` is zero.
    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        self.attempts().map(RetryPolicy::new)
    }

    /// Builds the descriptor template: the configured file when present,
    /// otherwise the built-in stack template.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Template`] when the template file is unusable.
    pub fn template(&self) -> Result<ConfigTemplate, ConfigError> {
        match &self.template_file {
            Some(path) => {
                ConfigTemplate::from_file(path, self.network.clone()).map_err(ConfigError::from)
            }
            None => Ok(ConfigTemplate::builtin(self.network.clone())),
        }
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates `max_attempts` was set to zero.
    #[error("max_attempts must be at least 1: set BOSUN_MAX_ATTEMPTS or max_attempts in bosun.toml")]
    InvalidAttempts,
    /// Surfaces template file problems.
    #[error("invalid descriptor template: {0}")]
    Template(#[from] TemplateError),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
