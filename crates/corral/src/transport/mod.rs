// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport seam - the boundary between this crate and the broker client.
//!
//! Everything broker-specific (connections, channels, topology declaration,
//! routing, serialization of frames) lives behind [`Transport`]. The core
//! only relies on three guarantees:
//!
//! 1. `send` assigns a strictly increasing sequence number per transport
//!    instance (the AMQP "publish sequence number" contract).
//! 2. Ack/nack notifications for published messages arrive as
//!    [`ConfirmEvent`]s on a channel consumed by a single dispatcher, on an
//!    execution path independent from the publishing path.
//! 3. Deliveries for a subscription are handed to a [`DeliveryListener`] on
//!    a transport-owned thread, serialized per subscription.
//!
//! [`mem::MemTransport`] is the in-process implementation used by tests and
//! examples.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::Receiver;

use crate::error::Result;

pub mod mem;

pub use mem::{ConfirmMode, MemTransport};

/// Opaque per-message metadata carried with a publish.
///
/// Mirrors the two AMQP properties the correlation layer relies on.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    /// Client-generated id echoed on the reply (RPC correlation).
    pub correlation_id: Option<String>,
    /// Destination the responder should publish the result to.
    pub reply_to: Option<String>,
}

/// A message handed to a [`DeliveryListener`].
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Transport-assigned delivery tag, used for manual [`Transport::ack`].
    pub tag: u64,
    /// Metadata published with the message.
    pub headers: Headers,
    /// Opaque payload bytes.
    pub body: Vec<u8>,
}

/// Broker notification about the fate of a published message.
///
/// `multiple == true` covers every sequence number less than or equal to
/// `seq` (cumulative acknowledgment).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmEvent {
    /// Message durably accepted by the broker.
    Ack {
        /// Publish sequence number the confirmation refers to.
        seq: u64,
        /// Whether the confirmation is cumulative.
        multiple: bool,
    },
    /// Message lost by the broker.
    Reject {
        /// Publish sequence number the rejection refers to.
        seq: u64,
        /// Whether the rejection is cumulative.
        multiple: bool,
    },
}

/// Callback invoked on the transport's delivery thread for each message.
pub trait DeliveryListener: Send + Sync {
    /// Handle one delivery. Runs on the transport's delivery path,
    /// concurrently with application threads.
    fn on_delivery(&self, delivery: Delivery);
}

/// Closures are accepted wherever a listener is expected.
impl<F> DeliveryListener for F
where
    F: Fn(Delivery) + Send + Sync,
{
    fn on_delivery(&self, delivery: Delivery) {
        self(delivery)
    }
}

/// Publish/subscribe primitive with confirm notifications.
///
/// Implementations must be shareable across threads; the correlation layer
/// serializes its own publishing path but delivery and confirm callbacks may
/// run concurrently with it.
pub trait Transport: Send + Sync {
    /// Sequence number the next `send` will be assigned.
    ///
    /// Contract: the peeked value matches the next `send`'s return only for
    /// a single, exclusive sender that serializes its own peek + send (the
    /// publisher holds a lock across peek + record + send and must be the
    /// transport's sole sender).
    fn next_publish_seq(&self) -> u64;

    /// Publish `body` to `dest`, returning the assigned sequence number.
    fn send(&self, dest: &str, headers: Headers, body: &[u8]) -> Result<u64>;

    /// Hand over the confirm-event channel.
    ///
    /// Returns `None` after the first call: there is exactly one dispatcher
    /// per transport.
    fn take_confirm_events(&self) -> Option<Receiver<ConfirmEvent>>;

    /// Declare a named destination (idempotent).
    fn declare_destination(&self, name: &str) -> Result<()>;

    /// Declare a fresh, uniquely named destination for replies.
    fn declare_ephemeral_destination(&self) -> Result<String>;

    /// Start consuming `dest`, invoking `listener` for each delivery.
    ///
    /// With `auto_ack == false` the consumer must call [`Transport::ack`]
    /// once it has handled the delivery. The returned [`Subscription`]
    /// cancels consumption when dropped.
    fn consume(
        &self,
        dest: &str,
        auto_ack: bool,
        listener: Arc<dyn DeliveryListener>,
    ) -> Result<Subscription>;

    /// Acknowledge consumption of a manually acked delivery.
    fn ack(&self, tag: u64) -> Result<()>;
}

/// Handle to an active consumer; cancels on drop.
///
/// Dropping the subscription on every exit path (success, timeout, panic) is
/// what keeps per-call RPC reply consumers from leaking.
pub struct Subscription {
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    /// Transport-supplied teardown, run once after the consumer thread has
    /// exited (e.g. deleting an auto-delete reply destination).
    cleanup: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a consumer thread and its cancellation flag.
    pub fn new(cancelled: Arc<AtomicBool>, handle: JoinHandle<()>) -> Self {
        Self {
            cancelled,
            handle: Some(handle),
            cleanup: None,
        }
    }

    /// Like [`Subscription::new`], with a teardown hook invoked after
    /// cancellation completes.
    pub fn with_cleanup(
        cancelled: Arc<AtomicBool>,
        handle: JoinHandle<()>,
        cleanup: Box<dyn FnOnce() + Send>,
    ) -> Self {
        Self {
            cancelled,
            handle: Some(handle),
            cleanup: Some(cleanup),
        }
    }

    /// Stop the consumer, wait for its thread to exit, then run the
    /// transport's teardown hook.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Consumer thread panicked during cancellation");
            }
        }
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }

    /// Whether the subscription has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
