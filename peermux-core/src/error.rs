//! Errors surfaced by peer operations.

use peermux_protocol::{ErrorCode, WireError};
use thiserror::Error;

/// Outcome of a remote invocation, and the return type of method and
/// callback handlers.
pub type CallResult = Result<String, PeerError>;

/// Error delivered to callers of peer operations.
///
/// Handlers return the same type, so a handler that forwards a request to a
/// third peer can propagate the nested failure with `?` and the dispatcher
/// will relay it on the wire unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    /// The remote handler ran and signaled an application-level error.
    #[error("exception: {0}")]
    Exception(WireError),

    /// The remote side failed before its handler ran, for example because
    /// the method or callback was not registered.
    #[error("execution error: {0}")]
    Execution(WireError),

    /// The connection closed; the request was rejected or never sent.
    #[error("peer disconnected")]
    Disconnected,

    /// A fatal connection-level fault, reported by either side.
    #[error("connection fault: {0}")]
    Fault(WireError),
}

impl PeerError {
    /// Builds an application-level error for a handler to return.
    pub fn exception(code: i32, message: impl Into<String>) -> Self {
        PeerError::Exception(WireError::new(code, message))
    }

    /// The numeric error code carried by this error.
    pub fn code(&self) -> i32 {
        match self {
            PeerError::Exception(e) | PeerError::Execution(e) | PeerError::Fault(e) => e.code,
            PeerError::Disconnected => ErrorCode::Disconnected.code(),
        }
    }

    /// The human-readable error message.
    pub fn message(&self) -> &str {
        match self {
            PeerError::Exception(e) | PeerError::Execution(e) | PeerError::Fault(e) => &e.message,
            PeerError::Disconnected => ErrorCode::Disconnected.message(),
        }
    }
}
