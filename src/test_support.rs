//! Test support utilities shared across unit and integration tests.
//!
//! The doubles share a [`CallLog`] so tests can assert the global order of
//! calls across the provider and the remote session.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::config::{DEFAULT_MACHINE_DOWNLOAD_URL, ProvisionConfig};
use crate::console::{ProgressReporter, PromptError, Prompter};
use crate::machine::{
    MachineCredentials, MachineError, MachineFuture, MachineHandle, MachineInspection,
    MachineProvider,
};
use crate::session::{
    CommandOutput, CommandRunner, RemoteOutput, RemoteSession, SessionError, SessionFuture,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Returns a configuration holding the documented defaults, with no domain
/// or access token.
#[must_use]
pub fn sample_config() -> ProvisionConfig {
    ProvisionConfig {
        machine_bin: String::from("docker-machine"),
        driver: String::from("digitalocean"),
        access_token: None,
        region: None,
        size: None,
        domain: None,
        control_host: String::from("control"),
        swarm_host: String::from("swarm"),
        network: String::from("proxy"),
        stack_name: String::from("app"),
        descriptor_path: String::from("/root/docker-stack.yml"),
        template_file: None,
        machine_download_url: String::from(DEFAULT_MACHINE_DOWNLOAD_URL),
        migrate_command: String::from("npm run migrate"),
        seed_command: String::from("npm run seed"),
        max_attempts: 5,
        assume_yes: false,
    }
}

/// Produces a minimal JSON payload matching `docker-machine inspect`.
#[must_use]
pub fn json_inspection(name: &str, ip_address: &str) -> String {
    format!(
        "{{\"ConfigVersion\":3,\"Driver\":{{\"IPAddress\":\"{ip_address}\",\"MachineName\":\"{name}\"}},\"DriverName\":\"digitalocean\",\"Name\":\"{name}\"}}"
    )
}

/// Ordered record of calls shared between doubles.
#[derive(Clone, Debug, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn record(&self, entry: impl Into<String>) {
        lock(&self.entries).push(entry.into());
    }

    /// Returns a snapshot of all entries.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        lock(&self.entries).clone()
    }

    /// Returns the index of the first entry containing `needle`.
    #[must_use]
    pub fn position(&self, needle: &str) -> Option<usize> {
        lock(&self.entries)
            .iter()
            .position(|entry| entry.contains(needle))
    }

    /// Counts entries containing `needle`.
    #[must_use]
    pub fn count(&self, needle: &str) -> usize {
        lock(&self.entries)
            .iter()
            .filter(|entry| entry.contains(needle))
            .count()
    }
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        lock(&self.invocations).clone()
    }

    /// Pushes a successful exit status with the given stdout.
    pub fn push_success(&self, stdout: impl Into<String>) {
        self.push_output(Some(0), stdout, "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32, stderr: impl Into<String>) {
        self.push_output(Some(code), "", stderr);
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        lock(&self.responses).push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SessionError> {
        lock(&self.invocations).push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        lock(&self.responses)
            .pop_front()
            .ok_or_else(|| SessionError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

#[derive(Debug, Default)]
struct ProviderState {
    create_failures: BTreeMap<String, u32>,
    inspect_failures: BTreeMap<String, u32>,
    destroy_failures: BTreeSet<String>,
    inspections: BTreeMap<String, String>,
    live: BTreeSet<String>,
}

fn take_failure(failures: &mut BTreeMap<String, u32>, name: &str) -> bool {
    match failures.get_mut(name) {
        Some(remaining) if *remaining > 0 => {
            *remaining -= 1;
            true
        }
        _ => false,
    }
}

fn simulated(operation: &str, name: &str) -> MachineError {
    MachineError::Provider {
        program: String::from("docker-machine"),
        operation: operation.to_owned(),
        name: name.to_owned(),
        status_text: String::from("1"),
        stderr: String::from("simulated failure"),
    }
}

/// In-memory machine provider that records `create <name>`,
/// `inspect <name>` and `destroy <name>` in a [`CallLog`].
///
/// Like the real provider, `create` fails for a name that already exists.
#[derive(Clone, Debug, Default)]
pub struct ScriptedProvider {
    log: CallLog,
    state: Arc<Mutex<ProviderState>>,
}

impl ScriptedProvider {
    /// Creates a provider writing to `log`.
    #[must_use]
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            state: Arc::default(),
        }
    }

    /// Makes `inspect(name)` report `ip_address`.
    pub fn set_address(&self, name: &str, ip_address: &str) {
        self.set_inspection(name, json_inspection(name, ip_address));
    }

    /// Makes `inspect(name)` return `raw` verbatim.
    pub fn set_inspection(&self, name: &str, raw: impl Into<String>) {
        lock(&self.state)
            .inspections
            .insert(name.to_owned(), raw.into());
    }

    /// Fails the next `times` calls to `create(name)`.
    pub fn fail_create(&self, name: &str, times: u32) {
        lock(&self.state)
            .create_failures
            .insert(name.to_owned(), times);
    }

    /// Fails the next `times` calls to `inspect(name)`.
    pub fn fail_inspect(&self, name: &str, times: u32) {
        lock(&self.state)
            .inspect_failures
            .insert(name.to_owned(), times);
    }

    /// Fails every call to `destroy(name)`.
    pub fn fail_destroy(&self, name: &str) {
        lock(&self.state).destroy_failures.insert(name.to_owned());
    }

    /// Returns `true` when `name` currently exists.
    #[must_use]
    pub fn is_live(&self, name: &str) -> bool {
        lock(&self.state).live.contains(name)
    }

    fn create_now(&self, name: &str) -> Result<MachineHandle, MachineError> {
        self.log.record(format!("create {name}"));
        let mut state = lock(&self.state);
        let failed = take_failure(&mut state.create_failures, name);
        if state.live.contains(name) {
            return Err(MachineError::Provider {
                program: String::from("docker-machine"),
                operation: String::from("create"),
                name: name.to_owned(),
                status_text: String::from("1"),
                stderr: format!("Host already exists: \"{name}\""),
            });
        }
        // A failed create still leaves a half-built host behind.
        state.live.insert(name.to_owned());
        if failed {
            return Err(simulated("create", name));
        }
        Ok(MachineHandle::new(name))
    }

    fn inspect_now(&self, name: &str) -> Result<MachineInspection, MachineError> {
        self.log.record(format!("inspect {name}"));
        let mut state = lock(&self.state);
        if take_failure(&mut state.inspect_failures, name) {
            return Err(simulated("inspect", name));
        }
        if !state.live.contains(name) {
            return Err(MachineError::NotFound {
                name: name.to_owned(),
            });
        }
        let raw = state
            .inspections
            .get(name)
            .cloned()
            .unwrap_or_else(|| json_inspection(name, ""));
        Ok(MachineInspection::new(name, raw))
    }

    fn destroy_now(&self, name: &str) -> Result<(), MachineError> {
        self.log.record(format!("destroy {name}"));
        let mut state = lock(&self.state);
        if state.destroy_failures.contains(name) {
            return Err(simulated("rm", name));
        }
        if state.live.remove(name) {
            Ok(())
        } else {
            Err(MachineError::NotFound {
                name: name.to_owned(),
            })
        }
    }
}

impl MachineProvider for ScriptedProvider {
    fn create<'a>(
        &'a self,
        name: &'a str,
        _credentials: &'a MachineCredentials,
    ) -> MachineFuture<'a, MachineHandle> {
        Box::pin(async move { self.create_now(name) })
    }

    fn inspect<'a>(&'a self, name: &'a str) -> MachineFuture<'a, MachineInspection> {
        Box::pin(async move { self.inspect_now(name) })
    }

    fn destroy<'a>(&'a self, name: &'a str) -> MachineFuture<'a, ()> {
        Box::pin(async move { self.destroy_now(name) })
    }
}

#[derive(Clone, Debug)]
struct SessionRule {
    host: String,
    needle: String,
    remaining: Option<u32>,
    outcome: Result<RemoteOutput, SessionError>,
}

/// Remote session that records `run <host>: <command>` in a [`CallLog`]
/// and answers from rules matched on host and a command substring.
///
/// Rules are checked in insertion order; a rule with a finite count stops
/// matching once used up. Unmatched commands succeed with empty output.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSession {
    log: CallLog,
    rules: Arc<Mutex<Vec<SessionRule>>>,
}

impl ScriptedSession {
    /// Creates a session writing to `log`.
    #[must_use]
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            rules: Arc::default(),
        }
    }

    fn push_rule(
        &self,
        host: &str,
        needle: &str,
        remaining: Option<u32>,
        outcome: Result<RemoteOutput, SessionError>,
    ) {
        lock(&self.rules).push(SessionRule {
            host: host.to_owned(),
            needle: needle.to_owned(),
            remaining,
            outcome,
        });
    }

    /// Answers matching commands with `stdout`.
    pub fn respond(&self, host: &str, needle: &str, stdout: impl Into<String>) {
        self.push_rule(
            host,
            needle,
            None,
            Ok(RemoteOutput {
                stdout: stdout.into(),
                stderr: String::new(),
            }),
        );
    }

    /// Fails the next `times` matching commands with a non-zero exit.
    pub fn fail(&self, host: &str, needle: &str, times: u32) {
        self.fail_with_stderr(host, needle, times, "simulated failure");
    }

    /// Fails the next `times` matching commands with the given stderr.
    pub fn fail_with_stderr(&self, host: &str, needle: &str, times: u32, stderr: &str) {
        self.push_rule(
            host,
            needle,
            Some(times),
            Err(SessionError::NonZeroExit {
                host: host.to_owned(),
                status: Some(1),
                status_text: String::from("1"),
                stderr: stderr.to_owned(),
            }),
        );
    }

    /// Makes the provider CLI on `gateway` report `ip_address` for `name`.
    pub fn set_tunneled_address(&self, gateway: &str, name: &str, ip_address: &str) {
        self.respond(gateway, &format!("inspect {name}"), json_inspection(name, ip_address));
    }

    fn answer(&self, host: &str, command: &str) -> Result<RemoteOutput, SessionError> {
        self.log.record(format!("run {host}: {command}"));
        let mut rules = lock(&self.rules);
        let matched = rules.iter_mut().find(|rule| {
            rule.host == host && command.contains(&rule.needle) && rule.remaining != Some(0)
        });
        matched.map_or_else(
            || Ok(RemoteOutput::default()),
            |rule| {
                if let Some(remaining) = rule.remaining.as_mut() {
                    *remaining -= 1;
                }
                rule.outcome.clone()
            },
        )
    }
}

impl RemoteSession for ScriptedSession {
    fn run<'a>(&'a self, host: &'a str, command: &'a str) -> SessionFuture<'a, RemoteOutput> {
        Box::pin(async move { self.answer(host, command) })
    }
}

/// Prompter answering from queued values and recording every prompt.
#[derive(Clone, Debug, Default)]
pub struct ScriptedPrompter {
    answers: Arc<Mutex<VecDeque<String>>>,
    confirmation: Arc<Mutex<Option<bool>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedPrompter {
    /// Creates a prompter with no answers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an answer for the next `input` or `password` prompt.
    pub fn push_answer(&self, answer: impl Into<String>) {
        lock(&self.answers).push_back(answer.into());
    }

    /// Sets the answer to `confirm` prompts.
    pub fn set_confirmation(&self, answer: bool) {
        *lock(&self.confirmation) = Some(answer);
    }

    /// Returns every prompt shown so far.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    fn next_answer(&self, prompt: &str) -> Result<String, PromptError> {
        lock(&self.prompts).push(prompt.to_owned());
        lock(&self.answers)
            .pop_front()
            .ok_or_else(|| PromptError::Unanswered {
                prompt: prompt.to_owned(),
            })
    }
}

impl Prompter for ScriptedPrompter {
    fn input(&self, prompt: &str) -> Result<String, PromptError> {
        self.next_answer(prompt)
    }

    fn password(&self, prompt: &str) -> Result<String, PromptError> {
        self.next_answer(prompt)
    }

    fn confirm(&self, prompt: &str, _default: bool) -> Result<bool, PromptError> {
        lock(&self.prompts).push(prompt.to_owned());
        lock(&self.confirmation).ok_or_else(|| PromptError::Unanswered {
            prompt: prompt.to_owned(),
        })
    }
}

/// Reporter recording events as `step <label>`, `success <label>`,
/// `warn <message>` and `failure <label>: <message>`.
#[derive(Clone, Debug, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    /// Creates an empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all events.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        lock(&self.events).clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, label: &str) {
        lock(&self.events).push(format!("step {label}"));
    }

    fn success(&self, label: &str) {
        lock(&self.events).push(format!("success {label}"));
    }

    fn warn(&self, message: &str) {
        lock(&self.events).push(format!("warn {message}"));
    }

    fn failure(&self, label: &str, message: &str) {
        lock(&self.events).push(format!("failure {label}: {message}"));
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and cleans up variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
