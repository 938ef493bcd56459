//! Argument vectors for the provider CLI, shared by local and tunnelled
//! providers.

use shell_escape::unix::escape;

use super::{MachineCredentials, MachineError};

pub(super) const CREATE: &str = "create";
pub(super) const INSPECT: &str = "inspect";
pub(super) const REMOVE: &str = "rm";

pub(super) fn create_args(name: &str, credentials: &MachineCredentials) -> Vec<String> {
    let driver = credentials.driver.as_str();
    let mut args = vec![
        String::from(CREATE),
        String::from("--driver"),
        driver.to_owned(),
        format!("--{driver}-access-token"),
        credentials.access_token.clone(),
    ];
    if let Some(region) = &credentials.region {
        args.push(format!("--{driver}-region"));
        args.push(region.clone());
    }
    if let Some(size) = &credentials.size {
        args.push(format!("--{driver}-size"));
        args.push(size.clone());
    }
    args.push(name.to_owned());
    args
}

pub(super) fn inspect_args(name: &str) -> Vec<String> {
    vec![String::from(INSPECT), name.to_owned()]
}

pub(super) fn remove_args(name: &str) -> Vec<String> {
    vec![String::from(REMOVE), String::from("-y"), name.to_owned()]
}

/// Renders `program args...` as a single shell-escaped command line.
pub(super) fn shell_line(program: &str, args: &[String]) -> String {
    let mut line = escape(program.into()).into_owned();
    for arg in args {
        line.push(' ');
        line.push_str(escape(arg.as_str().into()).as_ref());
    }
    line
}

/// Host named by a `Host does not exist: "<name>"` diagnostic.
pub(super) fn missing_host(stderr: &str) -> Option<&str> {
    let (_, rest) = stderr.split_once("does not exist: \"")?;
    rest.split_once('"').map(|(name, _)| name)
}

pub(super) fn provider_failure(
    program: &str,
    operation: &str,
    name: &str,
    status_text: String,
    stderr: &str,
) -> MachineError {
    if missing_host(stderr) == Some(name) {
        return MachineError::NotFound {
            name: name.to_owned(),
        };
    }
    MachineError::Provider {
        program: program.to_owned(),
        operation: operation.to_owned(),
        name: name.to_owned(),
        status_text,
        stderr: stderr.trim().to_owned(),
    }
}
