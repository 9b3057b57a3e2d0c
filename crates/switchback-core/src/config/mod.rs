//! Failover configuration
//!
//! A [`FailoverConfig`] describes the default policy of a handle, per-method
//! overrides and the counter scope. It loads from YAML or JSON and honours
//! `SWITCHBACK_*` environment overrides:
//!
//! | Variable | Field |
//! |---|---|
//! | `SWITCHBACK_POLICY` | `default.policy` |
//! | `SWITCHBACK_MAX_FAILOVERS` | `default.max-failovers` |
//! | `SWITCHBACK_MAX_RETRIES` | `default.max-retries` |
//! | `SWITCHBACK_DELAY_BASE_MS` | `default.delay-base-ms` |
//! | `SWITCHBACK_DELAY_CAP_MS` | `default.delay-cap-ms` |
//! | `SWITCHBACK_COUNTER_SCOPE` | `counter-scope` |
//!
//! # Example
//!
//! ```rust
//! use switchback_core::config::{FailoverConfig, PolicyKind};
//!
//! let config = FailoverConfig::from_yaml_str(r#"
//! default:
//!   policy: failover-on-network-exception
//!   max-failovers: 3
//! methods:
//!   append:
//!     policy: never-retry
//! "#).unwrap();
//!
//! assert_eq!(config.default.policy, PolicyKind::FailoverOnNetworkException);
//! assert_eq!(config.methods["append"].policy, PolicyKind::NeverRetry);
//! ```

mod loader;
mod types;

pub use loader::{
    ENV_COUNTER_SCOPE, ENV_DELAY_BASE_MS, ENV_DELAY_CAP_MS, ENV_MAX_FAILOVERS, ENV_MAX_RETRIES,
    ENV_POLICY,
};
pub use types::{FailoverConfig, PolicyConfig, PolicyKind};
