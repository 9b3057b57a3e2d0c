//! The failover-aware handle
//!
//! [`RetryProxy`] stands in for a remote capability. It owns the endpoint
//! provider, the retry policies and the handle's counters; capability traits
//! are implemented on `RetryProxy<dyn Trait>` with one thin forwarder per
//! method, each delegating to [`RetryProxy::invoke`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use switchback_core::failure::RemoteError;
//! use switchback_core::interface::{InterfaceDescriptor, MethodDescriptor, RemoteInterface};
//! use switchback_core::policy;
//! use switchback_core::provider::RotatingFailoverProvider;
//! use switchback_core::proxy::RetryProxy;
//!
//! #[async_trait]
//! pub trait Catalog: Send + Sync {
//!     async fn lookup(&self, key: &str) -> Result<String, RemoteError>;
//! }
//!
//! const LOOKUP: MethodDescriptor = MethodDescriptor::idempotent("lookup");
//! static CATALOG: InterfaceDescriptor = InterfaceDescriptor {
//!     name: "Catalog",
//!     methods: &[LOOKUP],
//! };
//!
//! impl RemoteInterface for dyn Catalog {
//!     fn descriptor() -> &'static InterfaceDescriptor {
//!         &CATALOG
//!     }
//! }
//!
//! #[async_trait]
//! impl Catalog for RetryProxy<dyn Catalog> {
//!     async fn lookup(&self, key: &str) -> Result<String, RemoteError> {
//!         self.invoke(&LOOKUP, |target| async move { target.lookup(key).await })
//!             .await
//!     }
//! }
//!
//! struct Replica(&'static str);
//!
//! #[async_trait]
//! impl Catalog for Replica {
//!     async fn lookup(&self, key: &str) -> Result<String, RemoteError> {
//!         Ok(format!("{key}@{}", self.0))
//!     }
//! }
//!
//! # tokio_test();
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn tokio_test() {
//! let a: Arc<dyn Catalog> = Arc::new(Replica("a"));
//! let b: Arc<dyn Catalog> = Arc::new(Replica("b"));
//! let provider = RotatingFailoverProvider::pair(a, b);
//! let catalog: RetryProxy<dyn Catalog> =
//!     switchback_core::wrap(provider, policy::failover_on_network_exception(3));
//!
//! assert_eq!(catalog.lookup("k").await.unwrap(), "k@a");
//! # }
//! ```

mod invocation;
mod observer;

pub use invocation::CounterScope;
pub use observer::{CallSite, NoOpObserver, RetryObserver, StatsObserver, TracingObserver};

use crate::config::FailoverConfig;
use crate::error::Result;
use crate::interface::{InterfaceDescriptor, RemoteInterface};
use crate::policy::{RetryContext, RetryPolicy, TryOnceThenFail};
use crate::provider::FailoverProvider;
use invocation::Counters;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Wrap `provider` so every call is retried and failed over under `policy`
pub fn wrap<T, P>(provider: P, policy: impl RetryPolicy + 'static) -> RetryProxy<T>
where
    T: RemoteInterface + ?Sized,
    P: FailoverProvider<T> + 'static,
{
    RetryProxy::builder(provider).with_policy(policy).build()
}

/// A handle to a remote capability that survives endpoint failures
///
/// Counters are per handle: a new handle starts at zero even when it shares
/// a provider with another.
pub struct RetryProxy<T: RemoteInterface + ?Sized> {
    provider: Arc<dyn FailoverProvider<T>>,
    default_policy: Arc<dyn RetryPolicy>,
    method_policies: HashMap<String, Arc<dyn RetryPolicy>>,
    observer: Arc<dyn RetryObserver>,
    counter_scope: CounterScope,
    counters: Counters,
    made_successful_call: AtomicBool,
}

impl<T: RemoteInterface + ?Sized> RetryProxy<T> {
    /// Start building a handle over `provider`
    pub fn builder<P>(provider: P) -> RetryProxyBuilder<T>
    where
        P: FailoverProvider<T> + 'static,
    {
        RetryProxyBuilder::new(Arc::new(provider))
    }

    /// Build a handle from loaded configuration
    pub fn from_config<P>(provider: P, config: &FailoverConfig) -> Result<Self>
    where
        P: FailoverProvider<T> + 'static,
    {
        let mut builder = Self::builder(provider)
            .with_shared_policy(config.default.build()?)
            .with_counter_scope(config.counter_scope);
        for (method, policy) in &config.methods {
            builder = builder.with_shared_method_policy(method.clone(), policy.build()?);
        }
        Ok(builder.build())
    }

    /// Retry and failover counters accumulated by this handle
    ///
    /// Always zero under [`CounterScope::Invocation`].
    pub fn context(&self) -> RetryContext {
        self.counters.snapshot()
    }

    pub fn counter_scope(&self) -> CounterScope {
        self.counter_scope
    }

    pub fn provider(&self) -> &Arc<dyn FailoverProvider<T>> {
        &self.provider
    }

    pub fn interface(&self) -> &'static InterfaceDescriptor {
        self.provider.interface()
    }

    /// Release the provider's endpoints
    pub fn close(&self) -> Result<()> {
        self.provider.close()
    }

    fn policy_for(&self, method: &str) -> Arc<dyn RetryPolicy> {
        self.method_policies
            .get(method)
            .map_or_else(|| Arc::clone(&self.default_policy), Arc::clone)
    }
}

impl<T: RemoteInterface + ?Sized> fmt::Debug for RetryProxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryProxy")
            .field("interface", &self.interface().name)
            .field("counter_scope", &self.counter_scope)
            .field("context", &self.context())
            .field("method_policies", &self.method_policies.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Builder for [`RetryProxy`]
///
/// Defaults: [`TryOnceThenFail`] for every method, [`TracingObserver`],
/// [`CounterScope::Handle`].
pub struct RetryProxyBuilder<T: RemoteInterface + ?Sized> {
    provider: Arc<dyn FailoverProvider<T>>,
    default_policy: Arc<dyn RetryPolicy>,
    method_policies: HashMap<String, Arc<dyn RetryPolicy>>,
    observer: Arc<dyn RetryObserver>,
    counter_scope: CounterScope,
}

impl<T: RemoteInterface + ?Sized> RetryProxyBuilder<T> {
    fn new(provider: Arc<dyn FailoverProvider<T>>) -> Self {
        Self {
            provider,
            default_policy: Arc::new(TryOnceThenFail),
            method_policies: HashMap::new(),
            observer: Arc::new(TracingObserver),
            counter_scope: CounterScope::default(),
        }
    }

    /// Policy for methods without their own
    pub fn with_policy(self, policy: impl RetryPolicy + 'static) -> Self {
        self.with_shared_policy(Arc::new(policy))
    }

    /// Like [`with_policy`](Self::with_policy), for an already shared policy
    pub fn with_shared_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.default_policy = policy;
        self
    }

    /// Policy for one method, overriding the default
    pub fn with_method_policy(
        self,
        method: impl Into<String>,
        policy: impl RetryPolicy + 'static,
    ) -> Self {
        self.with_shared_method_policy(method, Arc::new(policy))
    }

    pub fn with_shared_method_policy(
        mut self,
        method: impl Into<String>,
        policy: Arc<dyn RetryPolicy>,
    ) -> Self {
        self.method_policies.insert(method.into(), policy);
        self
    }

    /// Set the observer
    pub fn with_observer(mut self, observer: impl RetryObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn with_counter_scope(mut self, scope: CounterScope) -> Self {
        self.counter_scope = scope;
        self
    }

    /// Build the handle with fresh counters
    pub fn build(self) -> RetryProxy<T> {
        RetryProxy {
            provider: self.provider,
            default_policy: self.default_policy,
            method_policies: self.method_policies,
            observer: self.observer,
            counter_scope: self.counter_scope,
            counters: Counters::default(),
            made_successful_call: AtomicBool::new(false),
        }
    }
}
