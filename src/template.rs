//! Deployment descriptor templating.
//!
//! Rendering is split in two: [`generate_secret`] draws fresh randomness and
//! [`ConfigTemplate::render_document`] is a pure substitution, so the output
//! of a render is deterministic once the secret is fixed.

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use rand::RngCore;
use thiserror::Error;

/// Number of random bytes in a generated secret.
pub const SECRET_BYTES: usize = 256;

const DOMAIN_PLACEHOLDER: &str = "{{domain}}";
const PEER_PLACEHOLDER: &str = "{{peer_address}}";
const SECRET_PLACEHOLDER: &str = "{{secret}}";
const NETWORK_PLACEHOLDER: &str = "{{network}}";

const BUILTIN_TEMPLATE: &str = r#"version: "3.7"

services:
  app:
    image: node:lts-alpine
    command: npm start
    environment:
      - NODE_ENV=production
      - APP_DOMAIN={{domain}}
      - APP_SECRET={{secret}}
      - DATABASE_URL=postgres://app@{{peer_address}}:5432/app
    networks:
      - {{network}}
    deploy:
      replicas: 1
      labels:
        - com.df.notify=true
        - com.df.serviceDomain={{domain}},www.{{domain}}
        - com.df.port=3000
      placement:
        constraints:
          - node.role == manager

  db:
    image: postgres:12-alpine
    environment:
      - POSTGRES_USER=app
      - POSTGRES_DB=app
      - POSTGRES_HOST_AUTH_METHOD=trust
    ports:
      - target: 5432
        published: 5432
        mode: host
    volumes:
      - db-data:/var/lib/postgresql/data
    deploy:
      placement:
        constraints:
          - node.role == worker

networks:
  {{network}}:
    external: true

volumes:
  db-data:
"#;

/// Errors raised while loading a descriptor template.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum TemplateError {
    /// Raised when the configured template path is blank.
    #[error("template file path must not be empty")]
    EmptyPath,
    /// Raised when the template file cannot be read.
    #[error("failed to read template file {path}: {message}")]
    Read {
        /// Path after tilde expansion.
        path: String,
        /// Underlying I/O error.
        message: String,
    },
    /// Raised when the template lacks the secret placeholder.
    #[error("template {origin} does not contain the {{{{secret}}}} placeholder")]
    MissingSecret {
        /// Where the template came from.
        origin: String,
    },
}

/// Rendered deployment descriptor and the secret embedded in it.
#[derive(Clone, Eq, PartialEq)]
pub struct DeploymentDescriptor {
    /// Rendered document text.
    pub document: String,
    /// Hex-encoded secret substituted into the document.
    pub secret: String,
}

impl std::fmt::Debug for DeploymentDescriptor {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("DeploymentDescriptor")
            .field("document_len", &self.document.len())
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Generates a fresh secret: [`SECRET_BYTES`] bytes from the thread-local
/// CSPRNG, hex-encoded.
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0_u8; SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Template for the stack file written to the control host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigTemplate {
    source: String,
    network: String,
}

impl ConfigTemplate {
    /// Returns the built-in stack template attached to `network`.
    #[must_use]
    pub fn builtin(network: impl Into<String>) -> Self {
        Self {
            source: BUILTIN_TEMPLATE.to_owned(),
            network: network.into(),
        }
    }

    /// Wraps template text supplied by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingSecret`] when `source` has no secret
    /// placeholder.
    pub fn from_source(
        source: impl Into<String>,
        network: impl Into<String>,
    ) -> Result<Self, TemplateError> {
        let text = source.into();
        if !text.contains(SECRET_PLACEHOLDER) {
            return Err(TemplateError::MissingSecret {
                origin: String::from("<inline>"),
            });
        }
        Ok(Self {
            source: text,
            network: network.into(),
        })
    }

    /// Loads a template from `path`, expanding a leading `~/`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the path is blank, unreadable, or the
    /// file lacks the secret placeholder.
    pub fn from_file(path: &str, network: impl Into<String>) -> Result<Self, TemplateError> {
        if path.trim().is_empty() {
            return Err(TemplateError::EmptyPath);
        }
        let expanded = expand_tilde(path);
        let text = read_to_string_ambient(&expanded).map_err(|message| TemplateError::Read {
            path: expanded.clone(),
            message,
        })?;
        Self::from_source(text, network)
            .map_err(|_| TemplateError::MissingSecret { origin: expanded })
    }

    /// Returns the unrendered template text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Substitutes the runtime values into the template.
    #[must_use]
    pub fn render_document(&self, domain: &str, peer_address: &str, secret: &str) -> String {
        self.source
            .replace(NETWORK_PLACEHOLDER, &self.network)
            .replace(DOMAIN_PLACEHOLDER, domain)
            .replace(PEER_PLACEHOLDER, peer_address)
            .replace(SECRET_PLACEHOLDER, secret)
    }

    /// Renders the document with a freshly generated secret.
    #[must_use]
    pub fn render(&self, domain: &str, peer_address: &str) -> DeploymentDescriptor {
        let secret = generate_secret();
        DeploymentDescriptor {
            document: self.render_document(domain, peer_address, &secret),
            secret,
        }
    }
}

fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

fn read_to_string_ambient(path: &str) -> Result<String, String> {
    let file_path = Utf8Path::new(path);
    let (dir_path, file_name) = match (file_path.parent(), file_path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_str().is_empty() => (parent, name),
        (_, Some(name)) => (Utf8Path::new("."), name),
        (_, None) => return Err(format!("path has no file name: {file_path}")),
    };
    let dir = Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_name).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use rstest::{fixture, rstest};
    use tempfile::NamedTempFile;

    #[fixture]
    fn template() -> ConfigTemplate {
        ConfigTemplate::builtin("proxy")
    }

    #[test]
    fn secret_is_512_hex_characters() {
        let secret = generate_secret();
        assert_eq!(secret.len(), SECRET_BYTES * 2);
        assert!(secret.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn secrets_are_unique_across_calls() {
        assert_ne!(generate_secret(), generate_secret());
    }

    #[rstest]
    fn render_document_substitutes_every_placeholder(template: ConfigTemplate) {
        let document = template.render_document("example.com", "10.0.0.2", "s3cr3t");

        assert!(document.contains("APP_DOMAIN=example.com"));
        assert!(document.contains("com.df.serviceDomain=example.com,www.example.com"));
        assert!(document.contains("postgres://app@10.0.0.2:5432/app"));
        assert!(document.contains("APP_SECRET=s3cr3t"));
        assert!(document.contains("  proxy:\n    external: true"));
        assert!(!document.contains("{{"), "unrendered placeholder in {document}");
    }

    #[rstest]
    fn renders_differ_only_in_secret(template: ConfigTemplate) {
        let first = template.render("example.com", "10.0.0.2");
        let second = template.render("example.com", "10.0.0.2");

        assert_ne!(first.secret, second.secret);
        assert_ne!(first.document, second.document);
        assert_eq!(
            first.document.replace(&first.secret, "<secret>"),
            second.document.replace(&second.secret, "<secret>")
        );
        assert!(first.document.contains(&first.secret));
    }

    #[test]
    fn from_source_requires_secret_placeholder() {
        let err = ConfigTemplate::from_source("domain: {{domain}}", "proxy")
            .expect_err("template without secret should be rejected");
        assert!(matches!(err, TemplateError::MissingSecret { .. }));
    }

    #[test]
    fn from_file_reads_custom_template() {
        let mut file = NamedTempFile::new().expect("create temp file");
        write!(file, "key: {{{{secret}}}}\nhost: {{{{domain}}}}\n").expect("write template");
        let path = file.path().to_str().expect("utf-8 temp path");

        let template = ConfigTemplate::from_file(path, "proxy").expect("load template");
        let document = template.render_document("example.org", "10.0.0.9", "abc");

        assert_eq!(document, "key: abc\nhost: example.org\n");
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn from_file_rejects_blank_path(#[case] path: &str) {
        assert_eq!(
            ConfigTemplate::from_file(path, "proxy"),
            Err(TemplateError::EmptyPath)
        );
    }

    #[test]
    fn from_file_reports_missing_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("absent.yml");
        let err = ConfigTemplate::from_file(path.to_str().expect("utf-8 path"), "proxy")
            .expect_err("missing file should fail");
        assert!(matches!(err, TemplateError::Read { .. }));
    }
}
