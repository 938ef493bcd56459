//! Bounded retry with optional per-failure compensation.
//!
//! Attempts run back to back without delay. When an attempt fails and more
//! attempts remain, the compensation action (if any) runs first so the next
//! attempt starts from a clean slate. Compensation never runs after the final
//! attempt: whatever the last attempt left behind is reported to the caller.

use std::fmt::Display;
use std::future::Future;
use std::num::NonZeroU32;

use thiserror::Error;

/// Attempt count used when no explicit value is configured.
pub const DEFAULT_MAX_ATTEMPTS: NonZeroU32 = match NonZeroU32::new(5) {
    Some(value) => value,
    None => NonZeroU32::MIN,
};

/// Maximum number of tries for one action.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    max_attempts: NonZeroU32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

/// Context handed to the compensation action after a failed attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryAttempt {
    /// One-based number of the attempt that just failed.
    pub attempt: u32,
    /// Total attempts allowed by the policy.
    pub max_attempts: u32,
    /// Rendered error of the failed attempt.
    pub last_error: String,
}

/// Error returned when every attempt failed.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RetryError<E> {
    /// All attempts were used; carries the error of the final attempt.
    #[error("gave up after {attempts} attempt(s): {source}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Error raised by the final attempt.
        #[source]
        source: E,
    },
}

impl<E> RetryError<E> {
    /// Returns how many attempts were made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Returns the error of the final attempt.
    #[must_use]
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { source, .. } => source,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` tries.
    #[must_use]
    pub const fn new(max_attempts: NonZeroU32) -> Self {
        Self { max_attempts }
    }

    /// Policy for actions that must not be repeated.
    #[must_use]
    pub const fn single() -> Self {
        Self::new(NonZeroU32::MIN)
    }

    /// Returns the configured attempt count.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts.get()
    }

    /// Runs `action` until it succeeds or the attempt budget is spent.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Exhausted`] carrying the final attempt's error.
    pub async fn execute<T, E, A, Fut>(&self, action: A) -> Result<T, RetryError<E>>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute_with_compensation(action, |_| async { Ok::<(), E>(()) })
            .await
    }

    /// Runs `action` like [`RetryPolicy::execute`], invoking `on_failure`
    /// after each failed attempt that will be followed by another one.
    ///
    /// Compensation failures are logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Exhausted`] carrying the final attempt's error.
    pub async fn execute_with_compensation<T, E, CE, A, Fut, C, CFut>(
        &self,
        mut action: A,
        mut on_failure: C,
    ) -> Result<T, RetryError<E>>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        C: FnMut(RetryAttempt) -> CFut,
        CFut: Future<Output = Result<(), CE>>,
        CE: Display,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;
        loop {
            let err = match action().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempt >= max_attempts {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: err,
                });
            }

            tracing::debug!(attempt, max_attempts, error = %err, "attempt failed; retrying");
            let context = RetryAttempt {
                attempt,
                max_attempts,
                last_error: err.to_string(),
            };
            if let Err(compensation_err) = on_failure(context).await {
                tracing::warn!(
                    attempt,
                    error = %compensation_err,
                    "compensation failed; continuing with next attempt"
                );
            }
            attempt += 1;
        }
    }
}
