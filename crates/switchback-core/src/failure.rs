//! Failure classification
//!
//! Every failure returned by an endpoint is reduced to a [`FailureKind`] at the
//! call boundary through the [`Classify`] trait. Retry policies only ever see
//! the kind; the failure value itself is handed back to the caller untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Connectivity-level failure detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// The endpoint actively refused the connection
    ConnectionRefused,
    /// Connecting or waiting for a response timed out
    Timeout,
    /// No route to the endpoint's host or network
    NoRoute,
    /// The endpoint's host name could not be resolved
    UnknownHost,
    /// An established connection was reset or aborted
    ConnectionReset,
    /// Any other transport failure
    Other,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::ConnectionRefused => "connection refused",
            TransportKind::Timeout => "timeout",
            TransportKind::NoRoute => "no route to host",
            TransportKind::UnknownHost => "unknown host",
            TransportKind::ConnectionReset => "connection reset",
            TransportKind::Other => "transport failure",
        };
        f.write_str(name)
    }
}

/// Classification of a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The endpoint is not currently authoritative
    StandbyIndication,
    /// The call failed at the transport level; whether the endpoint applied it
    /// is unknown
    Transport(TransportKind),
    /// An application failure the endpoint reports as safe to retry
    Recoverable,
    /// An application failure that must reach the caller immediately
    NonRecoverable,
}

impl FailureKind {
    /// Whether this failure is a standby indication
    pub fn is_standby(&self) -> bool {
        matches!(self, FailureKind::StandbyIndication)
    }

    /// Whether this failure is transport-level
    pub fn is_transport(&self) -> bool {
        matches!(self, FailureKind::Transport(_))
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::StandbyIndication => f.write_str("standby"),
            FailureKind::Transport(kind) => write!(f, "transport ({})", kind),
            FailureKind::Recoverable => f.write_str("recoverable"),
            FailureKind::NonRecoverable => f.write_str("non-recoverable"),
        }
    }
}

/// Maps a failure value onto a [`FailureKind`]
///
/// Implement this for the error type of every capability trait wrapped by a
/// [`RetryProxy`](crate::proxy::RetryProxy).
///
/// # Example
///
/// ```rust
/// use switchback_core::failure::{Classify, FailureKind, TransportKind};
///
/// #[derive(Debug)]
/// enum StoreError {
///     NotLeader,
///     Unreachable,
///     Conflict,
/// }
///
/// impl Classify for StoreError {
///     fn classify(&self) -> FailureKind {
///         match self {
///             StoreError::NotLeader => FailureKind::StandbyIndication,
///             StoreError::Unreachable => FailureKind::Transport(TransportKind::NoRoute),
///             StoreError::Conflict => FailureKind::NonRecoverable,
///         }
///     }
/// }
/// ```
pub trait Classify {
    /// Classify this failure
    fn classify(&self) -> FailureKind;
}

impl<C: Classify + ?Sized> Classify for Box<C> {
    fn classify(&self) -> FailureKind {
        (**self).classify()
    }
}

/// Ready-made classified failure for capabilities without their own error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The endpoint answered but is in standby
    #[error("{message}")]
    Standby { message: String },

    /// The call did not complete at the transport level
    #[error("{kind}: {message}")]
    Transport { kind: TransportKind, message: String },

    /// The endpoint reported a failure that may succeed on retry
    #[error("{message}")]
    Retriable { message: String },

    /// The endpoint reported an application failure
    #[error("{message}")]
    Application { message: String },
}

impl RemoteError {
    /// Create a standby error
    pub fn standby(message: impl Into<String>) -> Self {
        Self::Standby {
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Create a retriable error
    pub fn retriable(message: impl Into<String>) -> Self {
        Self::Retriable {
            message: message.into(),
        }
    }

    /// Create an application error
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
        }
    }

    /// The message carried by this error, without classification prefix
    pub fn message(&self) -> &str {
        match self {
            RemoteError::Standby { message }
            | RemoteError::Transport { message, .. }
            | RemoteError::Retriable { message }
            | RemoteError::Application { message } => message,
        }
    }
}

impl Classify for RemoteError {
    fn classify(&self) -> FailureKind {
        match self {
            RemoteError::Standby { .. } => FailureKind::StandbyIndication,
            RemoteError::Transport { kind, .. } => FailureKind::Transport(*kind),
            RemoteError::Retriable { .. } => FailureKind::Recoverable,
            RemoteError::Application { .. } => FailureKind::NonRecoverable,
        }
    }
}

impl Classify for io::Error {
    fn classify(&self) -> FailureKind {
        match self.kind() {
            io::ErrorKind::ConnectionRefused => {
                FailureKind::Transport(TransportKind::ConnectionRefused)
            }
            io::ErrorKind::TimedOut => FailureKind::Transport(TransportKind::Timeout),
            io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
                FailureKind::Transport(TransportKind::NoRoute)
            }
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => FailureKind::Transport(TransportKind::ConnectionReset),
            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => FailureKind::Recoverable,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => FailureKind::NonRecoverable,
            _ => FailureKind::Transport(TransportKind::Other),
        }
    }
}
