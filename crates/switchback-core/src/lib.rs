//! # switchback-core
//!
//! Client-side resilience for remote capabilities served by an active
//! endpoint and one or more standbys:
//! - Failure classification (standby indication, transport, application)
//! - Stateless retry and failover policies with capped exponential backoff
//! - Endpoint providers with at-most-one failover per observed generation
//! - A retry proxy that stands in for the capability and returns the
//!   endpoint's own failure unchanged once the policy gives up
//! - YAML/JSON configuration with environment overrides

pub mod config;
pub mod error;
pub mod failure;
pub mod interface;
pub mod policy;
pub mod provider;
pub mod proxy;

pub use config::FailoverConfig;
pub use error::{Error, Result};
pub use failure::{Classify, FailureKind, RemoteError, TransportKind};
pub use interface::{InterfaceDescriptor, MethodDescriptor, RemoteInterface};
pub use provider::{FailoverProvider, RotatingFailoverProvider};
pub use proxy::{wrap, CounterScope, RetryProxy};
