//! Operator-facing progress reporting and interactive prompts.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use dialoguer::{Confirm, Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

/// Receives progress events while a workflow runs.
pub trait ProgressReporter: Sync {
    /// A step has started.
    fn step(&self, label: &str);
    /// The current step completed.
    fn success(&self, label: &str);
    /// A non-fatal problem worth surfacing to the operator.
    fn warn(&self, message: &str);
    /// The current step failed and the workflow is halting.
    fn failure(&self, label: &str, message: &str);
}

/// Reporter that renders a spinner per step on stderr.
#[derive(Debug, Default)]
pub struct TerminalReporter {
    active: Mutex<Option<ProgressBar>>,
}

impl TerminalReporter {
    /// Creates a reporter with no active spinner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn take_active(&self) -> Option<ProgressBar> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

fn spinner(label: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(label.to_owned());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

impl ProgressReporter for TerminalReporter {
    fn step(&self, label: &str) {
        let bar = spinner(label);
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(bar);
        if let Some(stale) = previous {
            stale.finish_and_clear();
        }
    }

    fn success(&self, label: &str) {
        if let Some(bar) = self.take_active() {
            bar.finish_with_message(format!("✓ {label}"));
        }
    }

    fn warn(&self, message: &str) {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.as_ref() {
            Some(bar) => bar.println(format!("! {message}")),
            None => {
                writeln!(io::stderr(), "! {message}").ok();
            }
        }
    }

    fn failure(&self, label: &str, message: &str) {
        if let Some(bar) = self.take_active() {
            bar.abandon_with_message(format!("✗ {label}: {message}"));
        } else {
            writeln!(io::stderr(), "✗ {label}: {message}").ok();
        }
    }
}

/// Reporter that discards every event, used for `--quiet`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn step(&self, _label: &str) {}
    fn success(&self, _label: &str) {}
    fn warn(&self, _message: &str) {}
    fn failure(&self, _label: &str, _message: &str) {}
}

/// Errors raised while asking the operator for input.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum PromptError {
    /// Raised when the terminal interaction fails (for example, no TTY).
    #[error("prompt `{prompt}` failed: {message}")]
    Interaction {
        /// Prompt text shown to the operator.
        prompt: String,
        /// Underlying terminal error.
        message: String,
    },
    /// Raised when a non-interactive prompter has no answer queued.
    #[error("no answer available for prompt `{prompt}`")]
    Unanswered {
        /// Prompt text shown to the operator.
        prompt: String,
    },
}

/// Asks the operator for values that configuration did not supply.
pub trait Prompter {
    /// Reads a line of visible text.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] when no answer can be obtained.
    fn input(&self, prompt: &str) -> Result<String, PromptError>;

    /// Reads a secret without echoing it.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] when no answer can be obtained.
    fn password(&self, prompt: &str) -> Result<String, PromptError>;

    /// Asks a yes/no question.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] when no answer can be obtained.
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, PromptError>;
}

/// Prompter backed by the controlling terminal.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalPrompter;

fn interaction(prompt: &str, err: &dialoguer::Error) -> PromptError {
    PromptError::Interaction {
        prompt: prompt.to_owned(),
        message: err.to_string(),
    }
}

impl Prompter for TerminalPrompter {
    fn input(&self, prompt: &str) -> Result<String, PromptError> {
        Input::<String>::new()
            .with_prompt(prompt)
            .interact_text()
            .map_err(|err| interaction(prompt, &err))
    }

    fn password(&self, prompt: &str) -> Result<String, PromptError> {
        Password::new()
            .with_prompt(prompt)
            .interact()
            .map_err(|err| interaction(prompt, &err))
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, PromptError> {
        Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
            .map_err(|err| interaction(prompt, &err))
    }
}
