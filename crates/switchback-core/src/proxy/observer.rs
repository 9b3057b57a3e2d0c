//! Invocation observation and logging
//!
//! The invocation core reports every step of a call through the
//! [`RetryObserver`] trait. [`TracingObserver`] is installed by default and
//! logs with the `tracing` crate.

use crate::failure::FailureKind;
use crate::policy::FailReason;
use crate::provider::{FailoverOutcome, Generation};
use std::error::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Which method of which interface an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    /// Interface name
    pub interface: &'static str,
    /// Method name
    pub method: &'static str,
}

/// Observer for invocation events
///
/// # Example
///
/// ```rust
/// use std::error::Error;
/// use std::time::Duration;
/// use switchback_core::failure::FailureKind;
/// use switchback_core::policy::FailReason;
/// use switchback_core::provider::{FailoverOutcome, Generation};
/// use switchback_core::proxy::{CallSite, RetryObserver};
///
/// struct FailoverAlarm;
///
/// impl RetryObserver for FailoverAlarm {
///     fn on_attempt_start(&self, _site: CallSite, _attempt: u32, _generation: Generation) {}
///
///     fn on_retry(
///         &self,
///         _site: CallSite,
///         _attempt: u32,
///         _failure: FailureKind,
///         _error: &dyn Error,
///         _delay: Duration,
///     ) {
///     }
///
///     fn on_failover(
///         &self,
///         site: CallSite,
///         _attempt: u32,
///         _failure: FailureKind,
///         _error: &dyn Error,
///         outcome: FailoverOutcome,
///         _delay: Duration,
///         _expected: bool,
///     ) {
///         if outcome.switched() {
///             eprintln!("{} switched endpoints", site.interface);
///         }
///     }
///
///     fn on_success(&self, _site: CallSite, _attempt: u32, _elapsed: Duration) {}
///
///     fn on_fail(
///         &self,
///         _site: CallSite,
///         _attempt: u32,
///         _failure: FailureKind,
///         _error: &dyn Error,
///         _reason: FailReason,
///     ) {
///     }
/// }
/// ```
pub trait RetryObserver: Send + Sync {
    /// An attempt is about to run against the endpoint of `generation`
    ///
    /// `attempt` is 1-indexed within the current call.
    fn on_attempt_start(&self, site: CallSite, attempt: u32, generation: Generation);

    /// The attempt failed and the same endpoint will be tried again after `delay`
    fn on_retry(
        &self,
        site: CallSite,
        attempt: u32,
        failure: FailureKind,
        error: &dyn Error,
        delay: Duration,
    );

    /// The attempt failed and a failover was requested
    ///
    /// `expected` is set for the first failover of a handle that has not yet
    /// completed a call: finding the standby first is normal at start-up.
    #[allow(clippy::too_many_arguments)]
    fn on_failover(
        &self,
        site: CallSite,
        attempt: u32,
        failure: FailureKind,
        error: &dyn Error,
        outcome: FailoverOutcome,
        delay: Duration,
        expected: bool,
    );

    /// The call returned a value
    fn on_success(&self, site: CallSite, attempt: u32, elapsed: Duration);

    /// The policy gave up and the failure goes back to the caller
    fn on_fail(
        &self,
        site: CallSite,
        attempt: u32,
        failure: FailureKind,
        error: &dyn Error,
        reason: FailReason,
    );
}

/// An observer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_start(&self, _site: CallSite, _attempt: u32, _generation: Generation) {}

    fn on_retry(
        &self,
        _site: CallSite,
        _attempt: u32,
        _failure: FailureKind,
        _error: &dyn Error,
        _delay: Duration,
    ) {
    }

    fn on_failover(
        &self,
        _site: CallSite,
        _attempt: u32,
        _failure: FailureKind,
        _error: &dyn Error,
        _outcome: FailoverOutcome,
        _delay: Duration,
        _expected: bool,
    ) {
    }

    fn on_success(&self, _site: CallSite, _attempt: u32, _elapsed: Duration) {}

    fn on_fail(
        &self,
        _site: CallSite,
        _attempt: u32,
        _failure: FailureKind,
        _error: &dyn Error,
        _reason: FailReason,
    ) {
    }
}

/// An observer that logs invocation events using the `tracing` crate
///
/// # Log Levels
///
/// - `on_attempt_start`: TRACE
/// - `on_retry`: WARN
/// - `on_failover`: DEBUG when expected, INFO otherwise
/// - `on_success`: DEBUG (first attempt) or INFO (after retries)
/// - `on_fail`: DEBUG for non-retryable policies, ERROR once a budget ran out
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, site: CallSite, attempt: u32, generation: Generation) {
        tracing::trace!(
            interface = site.interface,
            method = site.method,
            attempt = attempt,
            generation = %generation,
            "starting attempt"
        );
    }

    fn on_retry(
        &self,
        site: CallSite,
        attempt: u32,
        failure: FailureKind,
        error: &dyn Error,
        delay: Duration,
    ) {
        tracing::warn!(
            interface = site.interface,
            method = site.method,
            attempt = attempt,
            failure = %failure,
            error = %error,
            delay_ms = millis(delay),
            "attempt failed, retrying same endpoint"
        );
    }

    fn on_failover(
        &self,
        site: CallSite,
        attempt: u32,
        failure: FailureKind,
        error: &dyn Error,
        outcome: FailoverOutcome,
        delay: Duration,
        expected: bool,
    ) {
        if expected {
            tracing::debug!(
                interface = site.interface,
                method = site.method,
                attempt = attempt,
                failure = %failure,
                error = %error,
                generation = %outcome.current(),
                delay_ms = millis(delay),
                "first endpoint unavailable, failing over"
            );
        } else {
            tracing::info!(
                interface = site.interface,
                method = site.method,
                attempt = attempt,
                failure = %failure,
                error = %error,
                generation = %outcome.current(),
                delay_ms = millis(delay),
                "attempt failed, failing over"
            );
        }
    }

    fn on_success(&self, site: CallSite, attempt: u32, elapsed: Duration) {
        if attempt > 1 {
            tracing::info!(
                interface = site.interface,
                method = site.method,
                attempt = attempt,
                total_duration_ms = millis(elapsed),
                "succeeded after retry"
            );
        } else {
            tracing::debug!(
                interface = site.interface,
                method = site.method,
                duration_ms = millis(elapsed),
                "succeeded on first attempt"
            );
        }
    }

    fn on_fail(
        &self,
        site: CallSite,
        attempt: u32,
        failure: FailureKind,
        error: &dyn Error,
        reason: FailReason,
    ) {
        match reason {
            FailReason::RetriesExhausted | FailReason::FailoversExhausted => {
                tracing::error!(
                    interface = site.interface,
                    method = site.method,
                    attempts = attempt,
                    failure = %failure,
                    error = %error,
                    reason = %reason,
                    "giving up"
                );
            }
            _ => {
                tracing::debug!(
                    interface = site.interface,
                    method = site.method,
                    attempts = attempt,
                    failure = %failure,
                    error = %error,
                    reason = %reason,
                    "not retrying"
                );
            }
        }
    }
}

/// An observer that counts invocation events
///
/// Useful for testing and metrics collection.
#[derive(Debug, Default)]
pub struct StatsObserver {
    /// Attempt start events
    pub attempt_starts: AtomicU32,
    /// Same-endpoint retries
    pub retries: AtomicU32,
    /// Failover requests, won or lost
    pub failovers: AtomicU32,
    /// Failover requests that performed the switch
    pub switches: AtomicU32,
    /// Successful calls
    pub successes: AtomicU32,
    /// Failures propagated to the caller
    pub fails: AtomicU32,
}

impl StatsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempt_starts(&self) -> u32 {
        self.attempt_starts.load(Ordering::SeqCst)
    }

    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::SeqCst)
    }

    pub fn failovers(&self) -> u32 {
        self.failovers.load(Ordering::SeqCst)
    }

    pub fn switches(&self) -> u32 {
        self.switches.load(Ordering::SeqCst)
    }

    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn fails(&self) -> u32 {
        self.fails.load(Ordering::SeqCst)
    }
}

impl RetryObserver for StatsObserver {
    fn on_attempt_start(&self, _site: CallSite, _attempt: u32, _generation: Generation) {
        self.attempt_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_retry(
        &self,
        _site: CallSite,
        _attempt: u32,
        _failure: FailureKind,
        _error: &dyn Error,
        _delay: Duration,
    ) {
        self.retries.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failover(
        &self,
        _site: CallSite,
        _attempt: u32,
        _failure: FailureKind,
        _error: &dyn Error,
        outcome: FailoverOutcome,
        _delay: Duration,
        _expected: bool,
    ) {
        self.failovers.fetch_add(1, Ordering::SeqCst);
        if outcome.switched() {
            self.switches.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_success(&self, _site: CallSite, _attempt: u32, _elapsed: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_fail(
        &self,
        _site: CallSite,
        _attempt: u32,
        _failure: FailureKind,
        _error: &dyn Error,
        _reason: FailReason,
    ) {
        self.fails.fetch_add(1, Ordering::SeqCst);
    }
}

impl<O: RetryObserver + ?Sized> RetryObserver for std::sync::Arc<O> {
    fn on_attempt_start(&self, site: CallSite, attempt: u32, generation: Generation) {
        (**self).on_attempt_start(site, attempt, generation)
    }

    fn on_retry(
        &self,
        site: CallSite,
        attempt: u32,
        failure: FailureKind,
        error: &dyn Error,
        delay: Duration,
    ) {
        (**self).on_retry(site, attempt, failure, error, delay)
    }

    fn on_failover(
        &self,
        site: CallSite,
        attempt: u32,
        failure: FailureKind,
        error: &dyn Error,
        outcome: FailoverOutcome,
        delay: Duration,
        expected: bool,
    ) {
        (**self).on_failover(site, attempt, failure, error, outcome, delay, expected)
    }

    fn on_success(&self, site: CallSite, attempt: u32, elapsed: Duration) {
        (**self).on_success(site, attempt, elapsed)
    }

    fn on_fail(
        &self,
        site: CallSite,
        attempt: u32,
        failure: FailureKind,
        error: &dyn Error,
        reason: FailReason,
    ) {
        (**self).on_fail(site, attempt, failure, error, reason)
    }
}

impl<O: RetryObserver + ?Sized> RetryObserver for Box<O> {
    fn on_attempt_start(&self, site: CallSite, attempt: u32, generation: Generation) {
        (**self).on_attempt_start(site, attempt, generation)
    }

    fn on_retry(
        &self,
        site: CallSite,
        attempt: u32,
        failure: FailureKind,
        error: &dyn Error,
        delay: Duration,
    ) {
        (**self).on_retry(site, attempt, failure, error, delay)
    }

    fn on_failover(
        &self,
        site: CallSite,
        attempt: u32,
        failure: FailureKind,
        error: &dyn Error,
        outcome: FailoverOutcome,
        delay: Duration,
        expected: bool,
    ) {
        (**self).on_failover(site, attempt, failure, error, outcome, delay, expected)
    }

    fn on_success(&self, site: CallSite, attempt: u32, elapsed: Duration) {
        (**self).on_success(site, attempt, elapsed)
    }

    fn on_fail(
        &self,
        site: CallSite,
        attempt: u32,
        failure: FailureKind,
        error: &dyn Error,
        reason: FailReason,
    ) {
        (**self).on_fail(site, attempt, failure, error, reason)
    }
}
