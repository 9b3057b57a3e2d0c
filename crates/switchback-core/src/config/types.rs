//! Configuration types
//!
//! Every field has a default, so an empty document yields the production
//! failover policy with its usual budgets.

use crate::error::{Error, Result};
use crate::failure::TransportKind;
use crate::policy::{
    Backoff, ExponentialBackoffRetry, FailoverOnNetworkException, NeverRetry, RetryForever,
    RetryPolicy, RetryUpToMaximumCount, TryOnceThenFail,
};
use crate::proxy::CounterScope;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Policies and counter scope for one handle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FailoverConfig {
    /// Policy for methods without an override
    #[serde(default)]
    pub default: PolicyConfig,

    /// Per-method overrides, keyed by method name
    #[serde(default)]
    pub methods: HashMap<String, PolicyConfig>,

    /// Whether counters accumulate per handle or per call
    #[serde(default)]
    pub counter_scope: CounterScope,
}

impl FailoverConfig {
    /// Check every policy in the document
    pub fn validate(&self) -> Result<()> {
        self.default.validate()?;
        for (method, policy) in &self.methods {
            policy.validate().map_err(|e| match e {
                Error::InvalidConfig { message } => {
                    Error::invalid_config(format!("method {method}: {message}"))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

/// Which standard policy to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    NeverRetry,
    TryOnceThenFail,
    RetryUpToMaximumCount,
    RetryForever,
    ExponentialBackoff,
    #[default]
    FailoverOnNetworkException,
}

/// Parameters of one policy
///
/// Fields a policy kind does not use are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolicyConfig {
    #[serde(default)]
    pub policy: PolicyKind,

    /// Failovers allowed per handle (or per call, see `counter-scope`)
    #[serde(default = "default_max_failovers")]
    pub max_failovers: u32,

    /// Same-endpoint retries allowed
    #[serde(default)]
    pub max_retries: u32,

    /// Backoff base in milliseconds
    #[serde(default = "default_delay_base_ms")]
    pub delay_base_ms: u64,

    /// Backoff cap in milliseconds
    #[serde(default = "default_delay_cap_ms")]
    pub delay_cap_ms: u64,

    /// Fixed pause for `retry-up-to-maximum-count` and `retry-forever`
    #[serde(default)]
    pub sleep_ms: u64,

    /// Add up to 25% random variation to backoff delays
    #[serde(default)]
    pub jitter: bool,

    /// Transport failures that fail over even for non-idempotent methods
    #[serde(default)]
    pub transport_allow_list: Vec<TransportKind>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::default(),
            max_failovers: default_max_failovers(),
            max_retries: 0,
            delay_base_ms: default_delay_base_ms(),
            delay_cap_ms: default_delay_cap_ms(),
            sleep_ms: 0,
            jitter: false,
            transport_allow_list: Vec::new(),
        }
    }
}

fn default_max_failovers() -> u32 {
    15
}

fn default_delay_base_ms() -> u64 {
    500
}

fn default_delay_cap_ms() -> u64 {
    15_000
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.delay_cap_ms < self.delay_base_ms {
            return Err(Error::invalid_config(format!(
                "delay-cap-ms ({}) must not be below delay-base-ms ({})",
                self.delay_cap_ms, self.delay_base_ms
            )));
        }
        Ok(())
    }

    fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.delay_base_ms),
            Duration::from_millis(self.delay_cap_ms),
        )
        .with_jitter(self.jitter)
    }

    /// Validate and build the described policy
    pub fn build(&self) -> Result<Arc<dyn RetryPolicy>> {
        self.validate()?;

        let sleep = Duration::from_millis(self.sleep_ms);
        let policy: Arc<dyn RetryPolicy> = match self.policy {
            PolicyKind::NeverRetry => Arc::new(NeverRetry),
            PolicyKind::TryOnceThenFail => Arc::new(TryOnceThenFail),
            PolicyKind::RetryUpToMaximumCount => {
                Arc::new(RetryUpToMaximumCount::new(self.max_retries, sleep))
            }
            PolicyKind::RetryForever => Arc::new(RetryForever::new(sleep)),
            PolicyKind::ExponentialBackoff => {
                Arc::new(ExponentialBackoffRetry::new(self.max_retries, self.backoff()))
            }
            PolicyKind::FailoverOnNetworkException => {
                let backoff = self.backoff();
                let policy = self.transport_allow_list.iter().fold(
                    FailoverOnNetworkException::new(self.max_failovers)
                        .with_max_retries(self.max_retries)
                        .with_delays(backoff.base, backoff.cap)
                        .with_jitter(backoff.jitter),
                    |policy, kind| policy.allow_transport(*kind),
                );
                Arc::new(policy)
            }
        };

        Ok(policy)
    }
}
