//! Static description of a remote capability
//!
//! A capability is an ordinary Rust trait. Its methods are described once, as
//! constants, so the invocation core knows which of them are safe to replay
//! against another endpoint.

use crate::error::Result;

/// A method of a remote capability and its idempotency tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Method name, used for logging and per-method policy lookup
    pub name: &'static str,
    /// Whether executing the method twice has the same effect as once
    pub idempotent: bool,
}

impl MethodDescriptor {
    /// Describe an idempotent method
    pub const fn idempotent(name: &'static str) -> Self {
        Self {
            name,
            idempotent: true,
        }
    }

    /// Describe a method that must not be replayed after an ambiguous failure
    pub const fn non_idempotent(name: &'static str) -> Self {
        Self {
            name,
            idempotent: false,
        }
    }
}

/// The full method table of a remote capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    /// Interface name
    pub name: &'static str,
    /// Every method the capability exposes
    pub methods: &'static [MethodDescriptor],
}

impl InterfaceDescriptor {
    /// Look up a method by name
    pub fn method(&self, name: &str) -> Option<&'static MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Whether the named method is tagged idempotent
    ///
    /// Unknown methods are treated as non-idempotent.
    pub fn is_idempotent(&self, name: &str) -> bool {
        self.method(name).is_some_and(|m| m.idempotent)
    }
}

/// Binds a capability type to its descriptor
///
/// Implemented on the trait object type of a capability, e.g.
/// `impl RemoteInterface for dyn NameNode`.
///
/// # Example
///
/// ```rust
/// use switchback_core::interface::{InterfaceDescriptor, MethodDescriptor, RemoteInterface};
///
/// pub trait Registry: Send + Sync {
///     fn lookup(&self, key: &str) -> Option<String>;
/// }
///
/// pub const LOOKUP: MethodDescriptor = MethodDescriptor::idempotent("lookup");
///
/// static REGISTRY: InterfaceDescriptor = InterfaceDescriptor {
///     name: "Registry",
///     methods: &[LOOKUP],
/// };
///
/// impl RemoteInterface for dyn Registry {
///     fn descriptor() -> &'static InterfaceDescriptor {
///         &REGISTRY
///     }
/// }
///
/// assert!(<dyn Registry as RemoteInterface>::descriptor().is_idempotent("lookup"));
/// ```
pub trait RemoteInterface: Send + Sync {
    /// The capability's method table
    fn descriptor() -> &'static InterfaceDescriptor;

    /// Release whatever the endpoint holds (connections, sockets)
    ///
    /// Called once per endpoint when its provider is closed.
    fn release(&self) -> Result<()> {
        Ok(())
    }
}
