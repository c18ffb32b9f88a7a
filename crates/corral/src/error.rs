// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-level error type.
//!
//! RPC operations have their own error type ([`crate::rpc::RpcError`]) which
//! wraps this one for transport failures.

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the confirm tracker, publisher, and transport seam.
///
/// # Example
///
/// ```rust,no_run
/// use corral::{Error, ReliablePublisher};
/// # fn check(publisher: &ReliablePublisher) {
/// match publisher.await_drain(std::time::Duration::from_secs(5)) {
///     Err(Error::ConfirmTimeout { outstanding }) => {
///         println!("{} messages still unconfirmed", outstanding);
///     }
///     Err(e) => println!("other error: {}", e),
///     Ok(()) => println!("drained"),
/// }
/// # }
/// ```
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Confirm Errors
    // ========================================================================
    /// Drain deadline exceeded with a nonempty pending set.
    ///
    /// Recoverable: the outstanding payloads are still in the tracker and can
    /// be snapshotted for re-publication.
    ConfirmTimeout {
        /// Number of messages still unconfirmed when the deadline passed.
        outstanding: usize,
    },
    /// The broker explicitly rejected a published sequence number.
    Rejected {
        /// Sequence number the broker nacked.
        seq: u64,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Send operation failed.
    SendFailed(String),
    /// Destination has not been declared on this transport.
    DestinationNotFound(String),
    /// The transport's confirm path has shut down; further publishes could
    /// never be resolved and are refused.
    Disconnected,

    // ========================================================================
    // Configuration / State Errors
    // ========================================================================
    /// Invalid configuration value (zero batch size, zero timeout, ...).
    InvalidConfig(String),
    /// Invalid state for the requested operation.
    InvalidState(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ConfirmTimeout { outstanding } => {
                write!(f, "Confirm timeout: {} messages outstanding", outstanding)
            }
            Error::Rejected { seq } => write!(f, "Message rejected by broker: seq={}", seq),
            Error::SendFailed(msg) => write!(f, "Send failed: {}", msg),
            Error::DestinationNotFound(name) => write!(f, "Destination not found: {}", name),
            Error::Disconnected => write!(f, "Transport notification path disconnected"),
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let e = Error::ConfirmTimeout { outstanding: 7 };
        assert!(e.to_string().contains('7'));

        let e = Error::Rejected { seq: 42 };
        assert!(e.to_string().contains("42"));

        let e = Error::DestinationNotFound("work.queue".to_string());
        assert!(e.to_string().contains("work.queue"));
    }
}
