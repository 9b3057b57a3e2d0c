//! Retry decisions and the policy contract

use crate::failure::FailureKind;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Counters a policy bases its decision on
///
/// Owned by one [`RetryProxy`](crate::proxy::RetryProxy) handle; every new
/// handle starts at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryContext {
    /// Plain retries performed so far
    pub retries: u32,
    /// Failovers performed so far
    pub failovers: u32,
}

impl RetryContext {
    /// Create a context with the given counters
    pub fn new(retries: u32, failovers: u32) -> Self {
        Self { retries, failovers }
    }
}

/// Why a policy gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    /// The policy never retries
    NotRetryable,
    /// The plain retry budget is spent
    RetriesExhausted,
    /// The failover budget is spent
    FailoversExhausted,
    /// A transport failure hit a method that is not safe to replay
    NotIdempotent,
    /// The failure is non-recoverable
    NonRecoverable,
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            FailReason::NotRetryable => "policy does not retry",
            FailReason::RetriesExhausted => "retry budget exhausted",
            FailReason::FailoversExhausted => "failover budget exhausted",
            FailReason::NotIdempotent => {
                "method is not idempotent and it is unknown whether the endpoint applied it"
            }
            FailReason::NonRecoverable => "failure is not recoverable",
        };
        f.write_str(reason)
    }
}

/// What the invocation core does next after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Return the failure to the caller
    Fail(FailReason),
    /// Try the current endpoint again right away
    Retry,
    /// Try the current endpoint again after a pause
    RetryAfterDelay(Duration),
    /// Switch endpoints and try again right away
    FailoverThenRetry,
    /// Switch endpoints and try again after a pause
    FailoverThenRetryAfterDelay(Duration),
}

impl RetryAction {
    /// Retry, with a pause unless `delay` is zero
    pub fn retry_after(delay: Duration) -> Self {
        if delay.is_zero() {
            RetryAction::Retry
        } else {
            RetryAction::RetryAfterDelay(delay)
        }
    }

    /// Fail over, with a pause unless `delay` is zero
    pub fn failover_after(delay: Duration) -> Self {
        if delay.is_zero() {
            RetryAction::FailoverThenRetry
        } else {
            RetryAction::FailoverThenRetryAfterDelay(delay)
        }
    }

    /// The pause before the next attempt
    pub fn delay(&self) -> Duration {
        match self {
            RetryAction::RetryAfterDelay(delay)
            | RetryAction::FailoverThenRetryAfterDelay(delay) => *delay,
            _ => Duration::ZERO,
        }
    }

    /// Whether the failure goes back to the caller
    pub fn is_fail(&self) -> bool {
        matches!(self, RetryAction::Fail(_))
    }

    /// Whether the endpoint is switched before the next attempt
    pub fn is_failover(&self) -> bool {
        matches!(
            self,
            RetryAction::FailoverThenRetry | RetryAction::FailoverThenRetryAfterDelay(_)
        )
    }
}

/// Decides what happens after a failed attempt
///
/// Policies are pure: everything they need arrives as arguments, so one
/// policy value may be shared by any number of handles and tasks.
///
/// # Example
///
/// ```rust
/// use switchback_core::failure::FailureKind;
/// use switchback_core::policy::{FailReason, RetryAction, RetryContext, RetryPolicy};
///
/// /// Fail over once on any failure, then give up.
/// struct FailoverOnce;
///
/// impl RetryPolicy for FailoverOnce {
///     fn decide(
///         &self,
///         _failure: FailureKind,
///         context: RetryContext,
///         _idempotent: bool,
///     ) -> RetryAction {
///         if context.failovers < 1 {
///             RetryAction::FailoverThenRetry
///         } else {
///             RetryAction::Fail(FailReason::FailoversExhausted)
///         }
///     }
/// }
/// ```
pub trait RetryPolicy: Send + Sync {
    /// Decide the next step for a failure of kind `failure`
    fn decide(&self, failure: FailureKind, context: RetryContext, idempotent: bool) -> RetryAction;
}

impl<P: RetryPolicy + ?Sized> RetryPolicy for Arc<P> {
    fn decide(&self, failure: FailureKind, context: RetryContext, idempotent: bool) -> RetryAction {
        (**self).decide(failure, context, idempotent)
    }
}

impl<P: RetryPolicy + ?Sized> RetryPolicy for Box<P> {
    fn decide(&self, failure: FailureKind, context: RetryContext, idempotent: bool) -> RetryAction {
        (**self).decide(failure, context, idempotent)
    }
}
