// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Blocking RPC client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::RpcConfig;
use crate::rpc::correlator::{CorrelationId, RpcCorrelator};
use crate::rpc::error::RpcError;
use crate::transport::{Delivery, Headers, Transport};

/// Client side of the request/reply pattern.
///
/// Each call declares an ephemeral reply destination, stamps the request
/// with a fresh correlation id and blocks until the matching reply arrives
/// or the deadline passes. Calls are independent; the client is safe to
/// share across threads.
pub struct RpcClient {
    transport: Arc<dyn Transport>,
    correlator: Arc<RpcCorrelator>,
    request_destination: String,
    /// Per-client discriminant feeding correlation id allocation.
    call_seq: AtomicU64,
    config: RpcConfig,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn Transport>, request_destination: &str, config: RpcConfig) -> Self {
        RpcClient {
            transport,
            correlator: Arc::new(RpcCorrelator::new()),
            request_destination: request_destination.to_string(),
            call_seq: AtomicU64::new(1),
            config,
        }
    }

    /// Issue a request and block for its reply, up to `timeout`.
    ///
    /// An empty reply body is the server's marker for a request it could
    /// not process and comes back as [`RpcError::MalformedRequest`].
    pub fn call(&self, payload: &[u8], timeout: Duration) -> Result<Vec<u8>, RpcError> {
        let id = CorrelationId::new(self.call_seq.fetch_add(1, Ordering::Relaxed));
        let reply_to = self.transport.declare_ephemeral_destination()?;

        let pending = self.correlator.register(id.clone());

        let correlator = Arc::clone(&self.correlator);
        // Consumer thread owns this closure; it routes replies into the
        // pending table and drops anything that no longer has a waiter.
        let listener = Arc::new(move |delivery: Delivery| {
            let Some(raw_id) = delivery.headers.correlation_id else {
                log::warn!("[RpcClient] reply without correlation id discarded");
                return;
            };
            let reply_id = CorrelationId::from_header(&raw_id);
            if !correlator.resolve(&reply_id, delivery.body) {
                log::debug!("[RpcClient] stale reply for {} discarded", reply_id);
            }
        });
        let subscription = self.transport.consume(&reply_to, true, listener)?;

        let headers = Headers {
            correlation_id: Some(id.as_str().to_string()),
            reply_to: Some(reply_to.clone()),
        };
        self.transport
            .send(&self.request_destination, headers, payload)?;
        log::debug!(
            "[RpcClient] call {} sent to '{}', replies via '{}'",
            id,
            self.request_destination,
            reply_to
        );

        let reply = pending.wait(timeout).ok_or(RpcError::Timeout)?;
        drop(subscription);

        if reply.is_empty() {
            return Err(RpcError::MalformedRequest(
                "server could not process the request".to_string(),
            ));
        }
        Ok(reply)
    }

    /// [`call`](Self::call) with the configured default timeout.
    pub fn call_default(&self, payload: &[u8]) -> Result<Vec<u8>, RpcError> {
        self.call(payload, self.config.call_timeout)
    }

    /// Calls currently awaiting a reply.
    pub fn outstanding(&self) -> usize {
        self.correlator.outstanding()
    }
}
