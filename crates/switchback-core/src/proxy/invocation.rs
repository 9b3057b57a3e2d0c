//! The invocation core
//!
//! One loop per call: read the active endpoint, run the attempt, and on
//! failure let the policy choose between giving up, retrying the same endpoint
//! and failing over. The failure handed back to the caller is always the value
//! the last attempt produced.

use super::observer::CallSite;
use super::RetryProxy;
use crate::failure::Classify;
use crate::interface::{MethodDescriptor, RemoteInterface};
use crate::policy::{RetryAction, RetryContext};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

/// Lifetime of the retry and failover counters a policy sees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CounterScope {
    /// Counters accumulate over every call made through the handle
    #[default]
    Handle,
    /// Each call starts from zero
    Invocation,
}

/// Retry and failover counters packed into one word
///
/// Retries live in the high half and failovers in the low half, so a decision
/// and the counter it consumes can be claimed with one compare-and-swap.
#[derive(Debug, Default)]
pub(super) struct Counters {
    packed: AtomicU64,
}

fn pack(context: RetryContext) -> u64 {
    (u64::from(context.retries) << 32) | u64::from(context.failovers)
}

fn unpack(packed: u64) -> RetryContext {
    RetryContext::new((packed >> 32) as u32, packed as u32)
}

impl Counters {
    pub(super) fn snapshot(&self) -> RetryContext {
        unpack(self.packed.load(Ordering::SeqCst))
    }

    /// Claim the counter `action` consumes, provided no other caller has
    /// moved the counters away from `decided_on` in the meantime
    fn try_claim(&self, decided_on: RetryContext, action: RetryAction) -> bool {
        let mut next = decided_on;
        match action {
            RetryAction::Fail(_) => return true,
            RetryAction::Retry | RetryAction::RetryAfterDelay(_) => {
                next.retries = next.retries.saturating_add(1);
            }
            RetryAction::FailoverThenRetry | RetryAction::FailoverThenRetryAfterDelay(_) => {
                next.failovers = next.failovers.saturating_add(1);
            }
        }
        self.packed
            .compare_exchange(pack(decided_on), pack(next), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl<T: RemoteInterface + ?Sized> RetryProxy<T> {
    /// Run `call` against the active endpoint under the method's policy
    ///
    /// `call` receives the endpoint for each attempt and may be invoked any
    /// number of times. On failure the original error value is returned
    /// unchanged.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use switchback_core::failure::RemoteError;
    /// use switchback_core::interface::{InterfaceDescriptor, MethodDescriptor, RemoteInterface};
    /// use switchback_core::policy;
    /// use switchback_core::provider::RotatingFailoverProvider;
    /// use switchback_core::proxy::RetryProxy;
    ///
    /// pub trait Clock: Send + Sync {
    ///     fn now(&self) -> Result<u64, RemoteError>;
    /// }
    ///
    /// const NOW: MethodDescriptor = MethodDescriptor::idempotent("now");
    /// static CLOCK: InterfaceDescriptor = InterfaceDescriptor {
    ///     name: "Clock",
    ///     methods: &[NOW],
    /// };
    ///
    /// impl RemoteInterface for dyn Clock {
    ///     fn descriptor() -> &'static InterfaceDescriptor {
    ///         &CLOCK
    ///     }
    /// }
    ///
    /// struct Down;
    /// impl Clock for Down {
    ///     fn now(&self) -> Result<u64, RemoteError> {
    ///         Err(RemoteError::standby("down"))
    ///     }
    /// }
    ///
    /// struct Up;
    /// impl Clock for Up {
    ///     fn now(&self) -> Result<u64, RemoteError> {
    ///         Ok(42)
    ///     }
    /// }
    ///
    /// # tokio_test();
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn tokio_test() {
    /// let down: Arc<dyn Clock> = Arc::new(Down);
    /// let up: Arc<dyn Clock> = Arc::new(Up);
    /// let provider = RotatingFailoverProvider::pair(down, up);
    /// let proxy: RetryProxy<dyn Clock> =
    ///     switchback_core::wrap(provider, policy::failover_on_network_exception(1));
    ///
    /// let now = proxy.invoke(&NOW, |clock| async move { clock.now() }).await;
    /// assert_eq!(now.ok(), Some(42));
    /// # }
    /// ```
    pub async fn invoke<R, E, F, Fut>(
        &self,
        method: &MethodDescriptor,
        mut call: F,
    ) -> Result<R, E>
    where
        F: FnMut(Arc<T>) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: Classify + Error,
    {
        let site = CallSite {
            interface: self.interface().name,
            method: method.name,
        };
        let policy = self.policy_for(method.name);

        let fresh = Counters::default();
        let counters = match self.counter_scope {
            CounterScope::Handle => &self.counters,
            CounterScope::Invocation => &fresh,
        };

        let start = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            let active = self.provider.current();
            self.observer
                .on_attempt_start(site, attempt, active.generation);

            let err = match call(Arc::clone(&active.target)).await {
                Ok(value) => {
                    self.made_successful_call.store(true, Ordering::SeqCst);
                    self.observer.on_success(site, attempt, start.elapsed());
                    return Ok(value);
                }
                Err(err) => err,
            };

            let failure = err.classify();
            // Concurrent callers share the counters; decide again if one of
            // them consumed a retry or failover since our snapshot.
            let (action, context) = loop {
                let context = counters.snapshot();
                let action = policy.decide(failure, context, method.idempotent);
                if counters.try_claim(context, action) {
                    break (action, context);
                }
            };

            match action {
                RetryAction::Fail(reason) => {
                    self.observer.on_fail(site, attempt, failure, &err, reason);
                    return Err(err);
                }
                RetryAction::Retry | RetryAction::RetryAfterDelay(_) => {
                    self.observer
                        .on_retry(site, attempt, failure, &err, action.delay());
                }
                RetryAction::FailoverThenRetry | RetryAction::FailoverThenRetryAfterDelay(_) => {
                    let outcome = self.provider.perform_failover(active.generation);
                    let expected = context.failovers == 0
                        && !self.made_successful_call.load(Ordering::SeqCst);
                    self.observer.on_failover(
                        site,
                        attempt,
                        failure,
                        &err,
                        outcome,
                        action.delay(),
                        expected,
                    );
                }
            }

            drop(err);
            let delay = action.delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}
