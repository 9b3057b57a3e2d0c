//! Endpoint providers
//!
//! A provider owns the endpoint currently receiving calls and knows how to
//! move to an alternate. The invocation core never switches endpoints itself;
//! it asks the provider to fail over away from the [`Generation`] it observed,
//! and the provider performs the switch only if that generation is still the
//! active one. Any number of callers that failed against the same generation
//! therefore produce exactly one transition.

use crate::error::{Error, Result};
use crate::interface::{InterfaceDescriptor, RemoteInterface};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Opaque token identifying which endpoint was active when a call started
///
/// Generations only ever grow, so a rotation that returns to a previously
/// active endpoint still yields a new token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    /// The generation of a freshly constructed provider
    pub const INITIAL: Generation = Generation(0);

    fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// The endpoint currently receiving calls, tagged with its generation
pub struct ActiveEndpoint<T: ?Sized> {
    /// The endpoint itself
    pub target: Arc<T>,
    /// Generation under which `target` became active
    pub generation: Generation,
}

impl<T: ?Sized> Clone for ActiveEndpoint<T> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
            generation: self.generation,
        }
    }
}

impl<T: ?Sized> fmt::Debug for ActiveEndpoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveEndpoint")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Result of a failover request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverOutcome {
    /// This request performed the transition
    Switched { from: Generation, to: Generation },
    /// Another caller already moved past the observed generation
    AlreadySwitched { current: Generation },
}

impl FailoverOutcome {
    /// Whether this request performed the transition
    pub fn switched(&self) -> bool {
        matches!(self, FailoverOutcome::Switched { .. })
    }

    /// The generation active once the request returned
    pub fn current(&self) -> Generation {
        match self {
            FailoverOutcome::Switched { to, .. } => *to,
            FailoverOutcome::AlreadySwitched { current } => *current,
        }
    }
}

/// Owner of the active endpoint of a logical connection
///
/// Implementations must make [`perform_failover`](Self::perform_failover) a
/// compare-and-swap on the generation: it transitions only when `observed` is
/// still current, and readers of [`current`](Self::current) never observe a
/// half-switched state.
pub trait FailoverProvider<T: RemoteInterface + ?Sized>: Send + Sync {
    /// The endpoint calls should go to right now
    fn current(&self) -> ActiveEndpoint<T>;

    /// Move away from the endpoint active under `observed`
    fn perform_failover(&self, observed: Generation) -> FailoverOutcome;

    /// The capability served by this provider's endpoints
    fn interface(&self) -> &'static InterfaceDescriptor {
        T::descriptor()
    }

    /// Release every endpoint; calling it again has no effect
    fn close(&self) -> Result<()>;
}

impl<T, P> FailoverProvider<T> for Arc<P>
where
    T: RemoteInterface + ?Sized,
    P: FailoverProvider<T> + ?Sized,
{
    fn current(&self) -> ActiveEndpoint<T> {
        (**self).current()
    }

    fn perform_failover(&self, observed: Generation) -> FailoverOutcome {
        (**self).perform_failover(observed)
    }

    fn interface(&self) -> &'static InterfaceDescriptor {
        (**self).interface()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}

#[derive(Debug)]
struct RotationState {
    active: usize,
    generation: Generation,
    failovers: u64,
}

/// Provider rotating through a fixed, ranked list of endpoints
///
/// With two endpoints this is the classic active/standby flip-flop: every
/// failover switches to the other one.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use switchback_core::interface::{InterfaceDescriptor, RemoteInterface};
/// use switchback_core::provider::{FailoverProvider, RotatingFailoverProvider};
///
/// pub trait Echo: Send + Sync {}
/// struct Node;
/// impl Echo for Node {}
///
/// static ECHO: InterfaceDescriptor = InterfaceDescriptor { name: "Echo", methods: &[] };
/// impl RemoteInterface for dyn Echo {
///     fn descriptor() -> &'static InterfaceDescriptor {
///         &ECHO
///     }
/// }
///
/// let provider = RotatingFailoverProvider::<dyn Echo>::pair(Arc::new(Node), Arc::new(Node));
/// let observed = provider.current().generation;
///
/// assert!(provider.perform_failover(observed).switched());
/// assert!(!provider.perform_failover(observed).switched());
/// assert_eq!(provider.failovers(), 1);
/// ```
pub struct RotatingFailoverProvider<T: ?Sized> {
    endpoints: Vec<Arc<T>>,
    state: RwLock<RotationState>,
    closed: AtomicBool,
}

impl<T: RemoteInterface + ?Sized> RotatingFailoverProvider<T> {
    /// Create a provider over `endpoints`, starting with the first one
    pub fn new(endpoints: Vec<Arc<T>>) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::no_endpoints(T::descriptor().name));
        }

        Ok(Self::with_endpoints(endpoints))
    }

    /// Create an active/standby provider
    pub fn pair(active: Arc<T>, standby: Arc<T>) -> Self {
        Self::with_endpoints(vec![active, standby])
    }

    fn with_endpoints(endpoints: Vec<Arc<T>>) -> Self {
        Self {
            endpoints,
            state: RwLock::new(RotationState {
                active: 0,
                generation: Generation::INITIAL,
                failovers: 0,
            }),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of transitions performed so far
    pub fn failovers(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .failovers
    }

    /// Index of the active endpoint in the ranked list
    pub fn active_index(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .active
    }

    /// Number of endpoints managed
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false; construction rejects an empty list
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Whether [`close`](FailoverProvider::close) has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<T: RemoteInterface + ?Sized> FailoverProvider<T> for RotatingFailoverProvider<T> {
    fn current(&self) -> ActiveEndpoint<T> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        ActiveEndpoint {
            target: Arc::clone(&self.endpoints[state.active]),
            generation: state.generation,
        }
    }

    fn perform_failover(&self, observed: Generation) -> FailoverOutcome {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.generation != observed {
            tracing::debug!(
                interface = T::descriptor().name,
                observed = %observed,
                current = %state.generation,
                "failover already performed since this call started"
            );
            return FailoverOutcome::AlreadySwitched {
                current: state.generation,
            };
        }

        let from_index = state.active;
        state.active = (state.active + 1) % self.endpoints.len();
        state.generation = state.generation.next();
        state.failovers += 1;

        tracing::info!(
            interface = T::descriptor().name,
            from = from_index,
            to = state.active,
            generation = %state.generation,
            failovers = state.failovers,
            "failed over to alternate endpoint"
        );

        FailoverOutcome::Switched {
            from: observed,
            to: state.generation,
        }
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut first_error = None;
        for (index, endpoint) in self.endpoints.iter().enumerate() {
            if let Err(err) = RemoteInterface::release(endpoint.as_ref()) {
                tracing::warn!(
                    interface = T::descriptor().name,
                    endpoint = index,
                    error = %err,
                    "failed to release endpoint"
                );
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<T: ?Sized> fmt::Debug for RotatingFailoverProvider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingFailoverProvider")
            .field("endpoints", &self.endpoints.len())
            .field("state", &self.state)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::MethodDescriptor;
    use std::cell::RefCell;

    trait Node: Send + Sync {
        fn name(&self) -> &str;
    }

    struct FakeNode {
        name: &'static str,
    }

    impl FakeNode {
        fn new(name: &'static str) -> Arc<dyn Node> {
            Arc::new(Self { name })
        }
    }

    impl Node for FakeNode {
        fn name(&self) -> &str {
            self.name
        }
    }

    const PING: MethodDescriptor = MethodDescriptor::idempotent("ping");

    static NODE: InterfaceDescriptor = InterfaceDescriptor {
        name: "Node",
        methods: &[PING],
    };

    impl RemoteInterface for dyn Node {
        fn descriptor() -> &'static InterfaceDescriptor {
            &NODE
        }

        fn release(&self) -> Result<()> {
            RELEASES.with(|r| r.borrow_mut().push(self.name().to_string()));
            if self.name().ends_with("-broken") {
                return Err(Error::release("Node", 0, "socket already closed"));
            }
            Ok(())
        }
    }

    thread_local! {
        static RELEASES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    #[test]
    fn test_pair_starts_on_active() {
        let provider = RotatingFailoverProvider::pair(FakeNode::new("nn1"), FakeNode::new("nn2"));
        let current = provider.current();

        assert_eq!(current.target.name(), "nn1");
        assert_eq!(current.generation, Generation::INITIAL);
        assert_eq!(provider.len(), 2);
        assert_eq!(provider.active_index(), 0);
        assert_eq!(provider.interface().name, "Node");
    }

    #[test]
    fn test_failover_flip_flops() {
        let provider = RotatingFailoverProvider::pair(FakeNode::new("nn1"), FakeNode::new("nn2"));

        let first = provider.current().generation;
        assert!(provider.perform_failover(first).switched());
        assert_eq!(provider.current().target.name(), "nn2");

        let second = provider.current().generation;
        assert!(provider.perform_failover(second).switched());
        assert_eq!(provider.current().target.name(), "nn1");
        assert_eq!(provider.failovers(), 2);
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let provider = RotatingFailoverProvider::pair(FakeNode::new("nn1"), FakeNode::new("nn2"));
        let observed = provider.current().generation;

        let winner = provider.perform_failover(observed);
        let loser = provider.perform_failover(observed);

        assert!(winner.switched());
        assert_eq!(
            loser,
            FailoverOutcome::AlreadySwitched {
                current: winner.current()
            }
        );
        assert_eq!(provider.failovers(), 1);
        assert_eq!(provider.current().target.name(), "nn2");
    }

    #[test]
    fn test_stale_generation_after_full_rotation() {
        // A -> B -> A must not let a caller that observed the first A switch again.
        let provider = RotatingFailoverProvider::pair(FakeNode::new("nn1"), FakeNode::new("nn2"));
        let stale = provider.current().generation;

        provider.perform_failover(stale);
        provider.perform_failover(provider.current().generation);
        assert_eq!(provider.current().target.name(), "nn1");

        assert!(!provider.perform_failover(stale).switched());
        assert_eq!(provider.failovers(), 2);
    }

    #[test]
    fn test_rotation_over_ranked_list() {
        let provider = RotatingFailoverProvider::new(vec![
            FakeNode::new("nn1"),
            FakeNode::new("nn2"),
            FakeNode::new("nn3"),
        ])
        .unwrap();

        let mut seen = Vec::new();
        for _ in 0..4 {
            let current = provider.current();
            seen.push(current.target.name().to_string());
            provider.perform_failover(current.generation);
        }

        assert_eq!(seen, vec!["nn1", "nn2", "nn3", "nn1"]);
    }

    #[test]
    fn test_empty_provider_rejected() {
        let result = RotatingFailoverProvider::<dyn Node>::new(Vec::new());
        assert!(matches!(result, Err(Error::NoEndpoints { .. })));
    }

    #[test]
    fn test_concurrent_failovers_switch_once() {
        let provider = Arc::new(RotatingFailoverProvider::pair(
            FakeNode::new("nn1"),
            FakeNode::new("nn2"),
        ));
        let observed = provider.current().generation;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = Arc::clone(&provider);
                std::thread::spawn(move || provider.perform_failover(observed).switched())
            })
            .collect();

        let switched = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|s| *s)
            .count();

        assert_eq!(switched, 1);
        assert_eq!(provider.failovers(), 1);
    }

    #[test]
    fn test_close_releases_every_endpoint_once() {
        RELEASES.with(|r| r.borrow_mut().clear());
        let provider = RotatingFailoverProvider::pair(FakeNode::new("nn1"), FakeNode::new("nn2"));

        provider.close().unwrap();
        provider.close().unwrap();

        assert!(provider.is_closed());
        RELEASES.with(|r| assert_eq!(*r.borrow(), vec!["nn1", "nn2"]));
    }

    #[test]
    fn test_close_reports_first_release_failure() {
        RELEASES.with(|r| r.borrow_mut().clear());
        let provider = RotatingFailoverProvider::pair(
            FakeNode::new("nn1-broken"),
            FakeNode::new("nn2"),
        );

        let result = provider.close();

        assert!(matches!(result, Err(Error::Release { .. })));
        // The remaining endpoint is still released.
        RELEASES.with(|r| assert_eq!(*r.borrow(), vec!["nn1-broken", "nn2"]));
    }
}
