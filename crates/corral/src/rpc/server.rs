// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Blocking RPC server.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::rpc::error::RpcError;
use crate::transport::{Delivery, Headers, Transport};

/// Application logic invoked once per request.
pub trait RequestHandler: Send + Sync + 'static {
    /// Compute the reply body for one request payload.
    fn handle(&self, payload: &[u8]) -> std::result::Result<Vec<u8>, RpcError>;
}

impl<F> RequestHandler for F
where
    F: Fn(&[u8]) -> std::result::Result<Vec<u8>, RpcError> + Send + Sync + 'static,
{
    fn handle(&self, payload: &[u8]) -> std::result::Result<Vec<u8>, RpcError> {
        self(payload)
    }
}

/// Server side of the request/reply pattern.
///
/// Consumes a request destination, runs a [`RequestHandler`] per delivery
/// and publishes the result to the requester's `reply_to` destination with
/// the correlation id echoed. A handler failure (or panic) produces an
/// empty-body reply, the on-wire marker for "request not processed", so the
/// caller fails fast instead of waiting out its timeout.
pub struct RpcServer {
    transport: Arc<dyn Transport>,
    destination: String,
    shutdown: Arc<AtomicBool>,
    requests_processed: Arc<AtomicU64>,
}

/// How often the blocked `serve` call re-checks the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

impl RpcServer {
    pub fn new(transport: Arc<dyn Transport>, destination: &str) -> Self {
        RpcServer {
            transport,
            destination: destination.to_string(),
            shutdown: Arc::new(AtomicBool::new(false)),
            requests_processed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Serve requests until [`shutdown`](Self::shutdown) is called.
    ///
    /// Blocks the calling thread; deliveries are handled on the transport's
    /// consumer thread. Requests are acked manually, after the reply has
    /// been sent. Fails with [`RpcError::Shutdown`] if the server was
    /// already stopped.
    pub fn serve<H: RequestHandler>(&self, handler: H) -> Result<(), RpcError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(RpcError::Shutdown);
        }
        self.transport.declare_destination(&self.destination)?;

        let worker = Arc::new(ServerWorker {
            transport: Arc::clone(&self.transport),
            handler: Box::new(handler),
            requests_processed: Arc::clone(&self.requests_processed),
        });
        let subscription = self.transport.consume(&self.destination, false, worker)?;

        log::info!("RpcServer serving '{}'", self.destination);
        while !self.shutdown.load(Ordering::Relaxed) {
            std::thread::sleep(SHUTDOWN_POLL);
        }
        drop(subscription);
        log::info!(
            "RpcServer for '{}' stopped after {} requests",
            self.destination,
            self.requests_processed.load(Ordering::Relaxed)
        );
        Ok(())
    }

    /// Request the serve loop to stop. Safe to call from any thread.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Whether the serve loop is still meant to run.
    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Relaxed)
    }

    /// A handle that lets another thread stop the server.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    /// Requests handled since the server started.
    pub fn requests_processed(&self) -> u64 {
        self.requests_processed.load(Ordering::Relaxed)
    }
}

impl Drop for RpcServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Cloneable stop signal for a server blocked in [`RpcServer::serve`].
#[derive(Clone)]
pub struct ShutdownHandle {
    shutdown: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Per-delivery logic, invoked on the transport's consumer thread.
struct ServerWorker {
    transport: Arc<dyn Transport>,
    handler: Box<dyn RequestHandler>,
    requests_processed: Arc<AtomicU64>,
}

impl ServerWorker {
    fn reply_body(&self, payload: &[u8]) -> Vec<u8> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.handler.handle(payload)));
        match outcome {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                log::warn!("[RpcServer] handler rejected request: {}", e);
                Vec::new()
            }
            Err(_) => {
                log::error!("[RpcServer] handler panicked, replying with error marker");
                Vec::new()
            }
        }
    }
}

impl crate::transport::DeliveryListener for ServerWorker {
    fn on_delivery(&self, delivery: Delivery) {
        let Delivery { tag, headers, body } = delivery;
        let Some(reply_to) = headers.reply_to else {
            log::warn!("[RpcServer] request without reply_to dropped (tag {})", tag);
            let _ = self.transport.ack(tag);
            return;
        };

        let reply = self.reply_body(&body);
        let reply_headers = Headers {
            correlation_id: headers.correlation_id,
            reply_to: None,
        };
        if let Err(e) = self.transport.send(&reply_to, reply_headers, &reply) {
            log::warn!("[RpcServer] failed to send reply to '{}': {}", reply_to, e);
        }
        if let Err(e) = self.transport.ack(tag) {
            log::warn!("[RpcServer] failed to ack tag {}: {}", tag, e);
        }
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_handle_stops_the_flag() {
        let transport: Arc<dyn Transport> =
            Arc::new(crate::transport::MemTransport::new());
        let server = RpcServer::new(transport, "rpc.q");
        assert!(server.is_running());
        server.shutdown_handle().shutdown();
        assert!(!server.is_running());
    }

    #[test]
    fn serving_a_stopped_server_fails() {
        let transport: Arc<dyn Transport> =
            Arc::new(crate::transport::MemTransport::new());
        let server = RpcServer::new(transport, "rpc.q");
        server.shutdown();

        fn echo(payload: &[u8]) -> std::result::Result<Vec<u8>, RpcError> {
            Ok(payload.to_vec())
        }
        let err = server
            .serve(echo)
            .expect_err("stopped server must refuse to serve");
        assert!(matches!(err, RpcError::Shutdown));
    }
}
