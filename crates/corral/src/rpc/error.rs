// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RPC error types.

use std::fmt;

use crate::error::Error;

/// Errors surfaced by the RPC client and server.
#[derive(Debug)]
pub enum RpcError {
    /// No reply arrived before the call deadline.
    Timeout,
    /// The request could not be handed to the transport.
    SendFailed(String),
    /// The server could not parse or process the request payload.
    MalformedRequest(String),
    /// The server has been shut down and cannot serve.
    Shutdown,
    /// Underlying transport failure.
    Transport(Error),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Timeout => write!(f, "RPC call timed out waiting for a reply"),
            RpcError::SendFailed(msg) => write!(f, "RPC send failed: {}", msg),
            RpcError::MalformedRequest(msg) => write!(f, "malformed RPC request: {}", msg),
            RpcError::Shutdown => write!(f, "RPC server is shut down"),
            RpcError::Transport(e) => write!(f, "RPC transport error: {}", e),
        }
    }
}

impl std::error::Error for RpcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RpcError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Error> for RpcError {
    fn from(e: Error) -> Self {
        match e {
            Error::SendFailed(msg) => RpcError::SendFailed(msg),
            other => RpcError::Transport(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        assert_eq!(
            RpcError::Timeout.to_string(),
            "RPC call timed out waiting for a reply"
        );
        assert_eq!(
            RpcError::SendFailed("broken pipe".to_string()).to_string(),
            "RPC send failed: broken pipe"
        );
    }

    #[test]
    fn transport_errors_convert() {
        let e: RpcError = Error::Disconnected.into();
        assert!(matches!(e, RpcError::Transport(Error::Disconnected)));
        let e: RpcError = Error::SendFailed("x".to_string()).into();
        assert!(matches!(e, RpcError::SendFailed(_)));
    }
}
