//! Common test helpers for switchback-core integration tests
//!
//! Provides a deliberately unreliable capability:
//! - `Unreliable` trait with methods that succeed a fixed number of times
//! - `UnreliableImplementation` endpoints failing with a configurable error
//! - A retry-proxy forwarder so scenarios call the capability directly

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use switchback_core::failure::{Classify, FailureKind, TransportKind};
use switchback_core::interface::{InterfaceDescriptor, MethodDescriptor, RemoteInterface};
use switchback_core::policy::{FailReason, RetryAction, RetryContext, RetryPolicy};
use switchback_core::provider::RotatingFailoverProvider;
use switchback_core::proxy::RetryProxy;
use tokio::sync::Barrier;

// ─── Capability ──────────────────────────────────────────────────────────────

#[async_trait]
pub trait Unreliable: Send + Sync {
    async fn always_succeeds(&self) -> Result<(), UnreliableError>;

    async fn succeeds_once_then_fails_returning_string(&self) -> Result<String, UnreliableError>;

    async fn succeeds_once_then_fails_returning_string_idempotent(
        &self,
    ) -> Result<String, UnreliableError>;

    async fn succeeds_ten_times_then_fails_returning_string(&self)
        -> Result<String, UnreliableError>;

    async fn fails_if_identifier_doesnt_match(
        &self,
        identifier: &str,
    ) -> Result<String, UnreliableError>;
}

pub const ALWAYS_SUCCEEDS: MethodDescriptor = MethodDescriptor::idempotent("always_succeeds");
pub const SUCCEEDS_ONCE: MethodDescriptor =
    MethodDescriptor::non_idempotent("succeeds_once_then_fails_returning_string");
pub const SUCCEEDS_ONCE_IDEMPOTENT: MethodDescriptor =
    MethodDescriptor::idempotent("succeeds_once_then_fails_returning_string_idempotent");
pub const SUCCEEDS_TEN_TIMES: MethodDescriptor =
    MethodDescriptor::non_idempotent("succeeds_ten_times_then_fails_returning_string");
pub const FAILS_IF_IDENTIFIER_DOESNT_MATCH: MethodDescriptor =
    MethodDescriptor::non_idempotent("fails_if_identifier_doesnt_match");

static UNRELIABLE: InterfaceDescriptor = InterfaceDescriptor {
    name: "Unreliable",
    methods: &[
        ALWAYS_SUCCEEDS,
        SUCCEEDS_ONCE,
        SUCCEEDS_ONCE_IDEMPOTENT,
        SUCCEEDS_TEN_TIMES,
        FAILS_IF_IDENTIFIER_DOESNT_MATCH,
    ],
};

impl RemoteInterface for dyn Unreliable {
    fn descriptor() -> &'static InterfaceDescriptor {
        &UNRELIABLE
    }
}

// ─── Failures ────────────────────────────────────────────────────────────────

/// How an endpoint fails once its successes are used up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailWith {
    /// Ordinary application failure
    Unreliable,
    /// "I am not the active node"
    Standby,
    /// Ambiguous transport failure
    Io,
    /// Failure reported by the remote side itself
    Remote,
}

/// Error raised by `UnreliableImplementation`; the message is the endpoint identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnreliableError {
    #[error("{0}")]
    Unreliable(String),
    #[error("{0}")]
    Standby(String),
    #[error("{0}")]
    Io(String),
    #[error("{0}")]
    Remote(String),
}

impl UnreliableError {
    fn new(kind: FailWith, message: String) -> Self {
        match kind {
            FailWith::Unreliable => UnreliableError::Unreliable(message),
            FailWith::Standby => UnreliableError::Standby(message),
            FailWith::Io => UnreliableError::Io(message),
            FailWith::Remote => UnreliableError::Remote(message),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            UnreliableError::Unreliable(m)
            | UnreliableError::Standby(m)
            | UnreliableError::Io(m)
            | UnreliableError::Remote(m) => m,
        }
    }
}

impl Classify for UnreliableError {
    fn classify(&self) -> FailureKind {
        match self {
            UnreliableError::Unreliable(_) => FailureKind::Recoverable,
            UnreliableError::Standby(_) => FailureKind::StandbyIndication,
            UnreliableError::Io(_) => FailureKind::Transport(TransportKind::Other),
            UnreliableError::Remote(_) => FailureKind::NonRecoverable,
        }
    }
}

// ─── Endpoint ────────────────────────────────────────────────────────────────

/// An endpoint that succeeds a fixed number of times per method, then fails
pub struct UnreliableImplementation {
    identifier: Mutex<String>,
    fail_with: FailWith,
    once_calls: AtomicU32,
    once_idempotent_calls: AtomicU32,
    ten_times_calls: AtomicU32,
    identifier_calls: AtomicU32,
    rendezvous: Option<(Barrier, u32)>,
}

impl UnreliableImplementation {
    pub fn new(identifier: &str) -> Self {
        Self::failing_with(identifier, FailWith::Unreliable)
    }

    pub fn failing_with(identifier: &str, fail_with: FailWith) -> Self {
        Self {
            identifier: Mutex::new(identifier.to_string()),
            fail_with,
            once_calls: AtomicU32::new(0),
            once_idempotent_calls: AtomicU32::new(0),
            ten_times_calls: AtomicU32::new(0),
            identifier_calls: AtomicU32::new(0),
            rendezvous: None,
        }
    }

    /// The first `tasks` calls to `fails_if_identifier_doesnt_match` wait for
    /// each other before answering
    pub fn synchronized(identifier: &str, fail_with: FailWith, tasks: u32) -> Self {
        Self {
            rendezvous: Some((Barrier::new(tasks as usize), tasks)),
            ..Self::failing_with(identifier, fail_with)
        }
    }

    pub fn set_identifier(&self, identifier: &str) {
        *self.identifier.lock().unwrap() = identifier.to_string();
    }

    pub fn identifier(&self) -> String {
        self.identifier.lock().unwrap().clone()
    }

    pub fn identifier_calls(&self) -> u32 {
        self.identifier_calls.load(Ordering::SeqCst)
    }

    fn fail(&self) -> UnreliableError {
        UnreliableError::new(self.fail_with, self.identifier())
    }

    fn succeed_up_to(&self, calls: &AtomicU32, successes: u32) -> Result<String, UnreliableError> {
        if calls.fetch_add(1, Ordering::SeqCst) < successes {
            Ok(self.identifier())
        } else {
            Err(self.fail())
        }
    }
}

#[async_trait]
impl Unreliable for UnreliableImplementation {
    async fn always_succeeds(&self) -> Result<(), UnreliableError> {
        Ok(())
    }

    async fn succeeds_once_then_fails_returning_string(&self) -> Result<String, UnreliableError> {
        self.succeed_up_to(&self.once_calls, 1)
    }

    async fn succeeds_once_then_fails_returning_string_idempotent(
        &self,
    ) -> Result<String, UnreliableError> {
        self.succeed_up_to(&self.once_idempotent_calls, 1)
    }

    async fn succeeds_ten_times_then_fails_returning_string(
        &self,
    ) -> Result<String, UnreliableError> {
        self.succeed_up_to(&self.ten_times_calls, 10)
    }

    async fn fails_if_identifier_doesnt_match(
        &self,
        identifier: &str,
    ) -> Result<String, UnreliableError> {
        let arrival = self.identifier_calls.fetch_add(1, Ordering::SeqCst);
        if let Some((barrier, tasks)) = &self.rendezvous {
            if arrival < *tasks {
                barrier.wait().await;
            }
        }

        let current = self.identifier();
        if current == identifier {
            Ok(current)
        } else {
            Err(self.fail())
        }
    }
}

// ─── Proxy forwarders ────────────────────────────────────────────────────────

#[async_trait]
impl Unreliable for RetryProxy<dyn Unreliable> {
    async fn always_succeeds(&self) -> Result<(), UnreliableError> {
        self.invoke(&ALWAYS_SUCCEEDS, |target| async move {
            target.always_succeeds().await
        })
        .await
    }

    async fn succeeds_once_then_fails_returning_string(&self) -> Result<String, UnreliableError> {
        self.invoke(&SUCCEEDS_ONCE, |target| async move {
            target.succeeds_once_then_fails_returning_string().await
        })
        .await
    }

    async fn succeeds_once_then_fails_returning_string_idempotent(
        &self,
    ) -> Result<String, UnreliableError> {
        self.invoke(&SUCCEEDS_ONCE_IDEMPOTENT, |target| async move {
            target
                .succeeds_once_then_fails_returning_string_idempotent()
                .await
        })
        .await
    }

    async fn succeeds_ten_times_then_fails_returning_string(
        &self,
    ) -> Result<String, UnreliableError> {
        self.invoke(&SUCCEEDS_TEN_TIMES, |target| async move {
            target.succeeds_ten_times_then_fails_returning_string().await
        })
        .await
    }

    async fn fails_if_identifier_doesnt_match(
        &self,
        identifier: &str,
    ) -> Result<String, UnreliableError> {
        self.invoke(&FAILS_IF_IDENTIFIER_DOESNT_MATCH, |target| async move {
            target.fails_if_identifier_doesnt_match(identifier).await
        })
        .await
    }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// Flip-flop provider over two endpoints, the first one active
pub fn flip_flop(
    active: Arc<dyn Unreliable>,
    standby: Arc<dyn Unreliable>,
) -> Arc<RotatingFailoverProvider<dyn Unreliable>> {
    Arc::new(RotatingFailoverProvider::pair(active, standby))
}

/// Flip-flop provider over two plain endpoints named `impl1` and `impl2`
pub fn impl1_impl2(
    fail1: FailWith,
    fail2: FailWith,
) -> Arc<RotatingFailoverProvider<dyn Unreliable>> {
    flip_flop(
        Arc::new(UnreliableImplementation::failing_with("impl1", fail1)),
        Arc::new(UnreliableImplementation::failing_with("impl2", fail2)),
    )
}

/// Fail over once on any failure, then give up
pub struct FailOverOnceOnAnyFailure;

impl RetryPolicy for FailOverOnceOnAnyFailure {
    fn decide(
        &self,
        _failure: FailureKind,
        context: RetryContext,
        _idempotent: bool,
    ) -> RetryAction {
        if context.failovers < 1 {
            RetryAction::FailoverThenRetry
        } else {
            RetryAction::Fail(FailReason::FailoversExhausted)
        }
    }
}

/// Route test logs through `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
