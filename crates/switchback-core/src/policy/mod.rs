//! Retry and failover policies
//!
//! A policy looks at one failed attempt (its
//! [`FailureKind`](crate::failure::FailureKind), the handle's
//! [`RetryContext`] and the method's idempotency tag) and answers with a
//! [`RetryAction`]. Policies hold no per-call state.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use switchback_core::failure::FailureKind;
//! use switchback_core::policy::{self, RetryAction, RetryContext, RetryPolicy};
//!
//! let policy = policy::failover_on_network_exception_with(
//!     policy::try_once_then_fail(),
//!     15,
//!     Duration::from_millis(500),
//!     Duration::from_secs(15),
//! );
//!
//! let first = policy.decide(FailureKind::StandbyIndication, RetryContext::new(0, 0), false);
//! assert_eq!(first, RetryAction::FailoverThenRetry);
//!
//! let second = policy.decide(FailureKind::StandbyIndication, RetryContext::new(0, 1), false);
//! assert_eq!(second, RetryAction::FailoverThenRetryAfterDelay(Duration::from_secs(1)));
//! ```

mod action;
mod backoff;
mod standard;

pub use action::{FailReason, RetryAction, RetryContext, RetryPolicy};
pub use backoff::{calculate_delay, Backoff};
pub use standard::{
    failover_on_network_exception, failover_on_network_exception_with, never_retry,
    retry_up_to_maximum_count, try_once_then_fail, ByFailureKind, ExponentialBackoffRetry,
    FailoverOnNetworkException, MaxFailovers, NeverRetry, RetryForever, RetryUpToMaximumCount,
    TryOnceThenFail,
};
