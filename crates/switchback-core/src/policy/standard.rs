//! Ready-made retry policies
//!
//! Every policy here is stateless. Composite behaviour (capping failovers,
//! dispatching by failure kind, falling back once a budget runs out) is
//! built by wrapping one policy in another.

use super::action::{FailReason, RetryAction, RetryContext, RetryPolicy};
use super::backoff::Backoff;
use crate::failure::{FailureKind, TransportKind};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Never retries; the first failure goes straight back to the caller
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetry;

impl RetryPolicy for NeverRetry {
    fn decide(
        &self,
        _failure: FailureKind,
        _context: RetryContext,
        _idempotent: bool,
    ) -> RetryAction {
        RetryAction::Fail(FailReason::NotRetryable)
    }
}

/// A single attempt whose failure propagates immediately
///
/// Behaves exactly like [`NeverRetry`]; use it where the single attempt is the
/// point, e.g. as the fallback of [`FailoverOnNetworkException`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TryOnceThenFail;

impl RetryPolicy for TryOnceThenFail {
    fn decide(
        &self,
        _failure: FailureKind,
        _context: RetryContext,
        _idempotent: bool,
    ) -> RetryAction {
        RetryAction::Fail(FailReason::NotRetryable)
    }
}

/// Retries the current endpoint up to `max_retries` times with a fixed pause
#[derive(Debug, Clone, Copy)]
pub struct RetryUpToMaximumCount {
    max_retries: u32,
    sleep: Duration,
}

impl RetryUpToMaximumCount {
    pub fn new(max_retries: u32, sleep: Duration) -> Self {
        Self { max_retries, sleep }
    }
}

impl RetryPolicy for RetryUpToMaximumCount {
    fn decide(
        &self,
        failure: FailureKind,
        context: RetryContext,
        _idempotent: bool,
    ) -> RetryAction {
        if failure == FailureKind::NonRecoverable {
            return RetryAction::Fail(FailReason::NonRecoverable);
        }
        if context.retries >= self.max_retries {
            return RetryAction::Fail(FailReason::RetriesExhausted);
        }
        RetryAction::retry_after(self.sleep)
    }
}

/// Retries the current endpoint until it stops failing
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryForever {
    sleep: Duration,
}

impl RetryForever {
    pub fn new(sleep: Duration) -> Self {
        Self { sleep }
    }
}

impl RetryPolicy for RetryForever {
    fn decide(
        &self,
        failure: FailureKind,
        _context: RetryContext,
        _idempotent: bool,
    ) -> RetryAction {
        if failure == FailureKind::NonRecoverable {
            return RetryAction::Fail(FailReason::NonRecoverable);
        }
        RetryAction::retry_after(self.sleep)
    }
}

/// Retries the current endpoint with capped exponential backoff
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoffRetry {
    max_retries: u32,
    backoff: Backoff,
}

impl ExponentialBackoffRetry {
    pub fn new(max_retries: u32, backoff: Backoff) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }
}

impl RetryPolicy for ExponentialBackoffRetry {
    fn decide(
        &self,
        failure: FailureKind,
        context: RetryContext,
        _idempotent: bool,
    ) -> RetryAction {
        if failure == FailureKind::NonRecoverable {
            return RetryAction::Fail(FailReason::NonRecoverable);
        }
        if context.retries >= self.max_retries {
            return RetryAction::Fail(FailReason::RetriesExhausted);
        }
        RetryAction::retry_after(self.backoff.retry_delay(context.retries))
    }
}

/// The production failover policy
///
/// - Once `max_failovers` failovers have happened, every failure fails.
/// - Non-recoverable failures fail immediately.
/// - A standby indication always fails over.
/// - A transport failure fails over only for idempotent methods or when its
///   [`TransportKind`] is allow-listed; otherwise replaying the call could
///   apply its side effect twice, so it fails.
/// - A recoverable failure is retried on the same endpoint while
///   `max_retries` allows; after that the fallback policy decides.
///
/// The first failover is immediate; later ones wait
/// `min(cap, base * 2^failovers)`.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use switchback_core::failure::{FailureKind, TransportKind};
/// use switchback_core::policy::{
///     FailoverOnNetworkException, RetryAction, RetryContext, RetryPolicy,
/// };
///
/// let policy = FailoverOnNetworkException::new(15)
///     .with_delays(Duration::from_millis(500), Duration::from_secs(15));
///
/// let action = policy.decide(
///     FailureKind::Transport(TransportKind::Timeout),
///     RetryContext::default(),
///     true,
/// );
/// assert_eq!(action, RetryAction::FailoverThenRetry);
/// ```
#[derive(Clone)]
pub struct FailoverOnNetworkException {
    fallback: Arc<dyn RetryPolicy>,
    max_failovers: u32,
    max_retries: u32,
    backoff: Backoff,
    transport_allow_list: Vec<TransportKind>,
}

impl FailoverOnNetworkException {
    /// Fail over up to `max_failovers` times with no delays and no plain retries
    pub fn new(max_failovers: u32) -> Self {
        Self {
            fallback: Arc::new(TryOnceThenFail),
            max_failovers,
            max_retries: 0,
            backoff: Backoff::none(),
            transport_allow_list: Vec::new(),
        }
    }

    /// Policy deciding once the plain retry budget is spent
    pub fn with_fallback(mut self, fallback: impl RetryPolicy + 'static) -> Self {
        self.fallback = Arc::new(fallback);
        self
    }

    /// Plain retries allowed for recoverable failures
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Backoff base and cap for retries and failovers
    pub fn with_delays(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff = Backoff {
            base,
            cap,
            jitter: self.backoff.jitter,
        };
        self
    }

    /// Enable or disable backoff jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.backoff.jitter = jitter;
        self
    }

    /// Fail over on this transport failure even for non-idempotent methods
    pub fn allow_transport(mut self, kind: TransportKind) -> Self {
        if !self.transport_allow_list.contains(&kind) {
            self.transport_allow_list.push(kind);
        }
        self
    }

    pub fn max_failovers(&self) -> u32 {
        self.max_failovers
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    pub fn transport_allow_list(&self) -> &[TransportKind] {
        &self.transport_allow_list
    }
}

impl RetryPolicy for FailoverOnNetworkException {
    fn decide(&self, failure: FailureKind, context: RetryContext, idempotent: bool) -> RetryAction {
        if context.failovers >= self.max_failovers {
            return RetryAction::Fail(FailReason::FailoversExhausted);
        }

        match failure {
            FailureKind::NonRecoverable => RetryAction::Fail(FailReason::NonRecoverable),
            FailureKind::StandbyIndication => {
                RetryAction::failover_after(self.backoff.failover_delay(context.failovers))
            }
            FailureKind::Transport(kind) => {
                if idempotent || self.transport_allow_list.contains(&kind) {
                    RetryAction::failover_after(self.backoff.failover_delay(context.failovers))
                } else {
                    RetryAction::Fail(FailReason::NotIdempotent)
                }
            }
            FailureKind::Recoverable => {
                if context.retries < self.max_retries {
                    RetryAction::retry_after(self.backoff.retry_delay(context.retries))
                } else {
                    self.fallback.decide(failure, context, idempotent)
                }
            }
        }
    }
}

impl fmt::Debug for FailoverOnNetworkException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailoverOnNetworkException")
            .field("max_failovers", &self.max_failovers)
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("transport_allow_list", &self.transport_allow_list)
            .finish_non_exhaustive()
    }
}

/// Picks a policy by failure kind, with a default for unlisted kinds
#[derive(Clone)]
pub struct ByFailureKind {
    default: Arc<dyn RetryPolicy>,
    policies: HashMap<FailureKind, Arc<dyn RetryPolicy>>,
}

impl ByFailureKind {
    pub fn new(default: impl RetryPolicy + 'static) -> Self {
        Self {
            default: Arc::new(default),
            policies: HashMap::new(),
        }
    }

    /// Use `policy` for failures of exactly `kind`
    pub fn with(mut self, kind: FailureKind, policy: impl RetryPolicy + 'static) -> Self {
        self.policies.insert(kind, Arc::new(policy));
        self
    }
}

impl RetryPolicy for ByFailureKind {
    fn decide(&self, failure: FailureKind, context: RetryContext, idempotent: bool) -> RetryAction {
        self.policies
            .get(&failure)
            .unwrap_or(&self.default)
            .decide(failure, context, idempotent)
    }
}

/// Caps the failovers another policy may request
#[derive(Debug, Clone, Copy)]
pub struct MaxFailovers<P> {
    inner: P,
    max_failovers: u32,
}

impl<P: RetryPolicy> MaxFailovers<P> {
    pub fn new(inner: P, max_failovers: u32) -> Self {
        Self {
            inner,
            max_failovers,
        }
    }
}

impl<P: RetryPolicy> RetryPolicy for MaxFailovers<P> {
    fn decide(&self, failure: FailureKind, context: RetryContext, idempotent: bool) -> RetryAction {
        let action = self.inner.decide(failure, context, idempotent);
        if action.is_failover() && context.failovers >= self.max_failovers {
            return RetryAction::Fail(FailReason::FailoversExhausted);
        }
        action
    }
}

/// Single attempt, failure propagated unchanged
pub fn never_retry() -> NeverRetry {
    NeverRetry
}

/// Single attempt, failure propagated unchanged
pub fn try_once_then_fail() -> TryOnceThenFail {
    TryOnceThenFail
}

/// Retry up to `max_retries` times, pausing `sleep` between attempts
pub fn retry_up_to_maximum_count(max_retries: u32, sleep: Duration) -> RetryUpToMaximumCount {
    RetryUpToMaximumCount::new(max_retries, sleep)
}

/// Fail over on network failures up to `max_failovers` times, without delays
pub fn failover_on_network_exception(max_failovers: u32) -> FailoverOnNetworkException {
    FailoverOnNetworkException::new(max_failovers)
}

/// Fail over on network failures with a fallback and backoff delays
pub fn failover_on_network_exception_with(
    fallback: impl RetryPolicy + 'static,
    max_failovers: u32,
    delay_base: Duration,
    delay_cap: Duration,
) -> FailoverOnNetworkException {
    FailoverOnNetworkException::new(max_failovers)
        .with_fallback(fallback)
        .with_delays(delay_base, delay_cap)
}
