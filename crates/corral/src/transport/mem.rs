// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process transport backed by crossbeam channels.
//!
//! Emulates the broker contract the correlation layer depends on: monotonic
//! publish sequence numbers, per-destination FIFO queues, one delivery thread
//! per subscription, and confirm events emitted onto a dedicated channel.
//! Confirm behavior is configurable so tests can exercise single, cumulative,
//! and rejected confirmations deterministically.
//!
//! This is not a broker: no routing, no persistence, no flow control.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use dashmap::DashMap;
use parking_lot::Mutex;

use super::{ConfirmEvent, Delivery, DeliveryListener, Headers, Subscription, Transport};
use crate::error::{Error, Result};

/// Poll interval for consumer threads checking their cancellation flag.
const CONSUMER_POLL: Duration = Duration::from_millis(20);

/// Name prefix for ephemeral (auto-delete) destinations.
const EPHEMERAL_PREFIX: &str = "amq.gen-";

/// How the transport confirms published messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmMode {
    /// Ack every message individually right after the send.
    AckEach,
    /// Ack cumulatively (`multiple == true`) once `every` messages have been
    /// published; intermediate sequence numbers get no individual ack.
    AckCumulative {
        /// Cumulative ack period, in messages.
        every: u64,
    },
    /// Emit nothing automatically; tests drive confirms via
    /// [`MemTransport::emit_ack`] / [`MemTransport::emit_reject`].
    Manual,
}

struct DestinationQueue {
    tx: Sender<Delivery>,
    rx: Receiver<Delivery>,
}

/// In-process [`Transport`] implementation.
pub struct MemTransport {
    /// Shared with subscription teardown hooks, which delete ephemeral
    /// destinations once their consumer cancels.
    destinations: Arc<DashMap<String, DestinationQueue>>,
    /// Next publish sequence number; starts at 1 like an AMQP channel.
    next_seq: AtomicU64,
    next_tag: AtomicU64,
    next_ephemeral: AtomicU64,
    confirm_tx: Sender<ConfirmEvent>,
    confirm_rx: Mutex<Option<Receiver<ConfirmEvent>>>,
    mode: ConfirmMode,
    /// Sequence numbers to reject instead of ack (test fault injection).
    reject_seqs: Mutex<HashSet<u64>>,
    /// Shared with auto-ack consumer threads.
    acked: Arc<AtomicU64>,
}

impl MemTransport {
    /// Create a transport confirming each message individually.
    #[must_use]
    pub fn new() -> Self {
        Self::with_mode(ConfirmMode::AckEach)
    }

    /// Create a transport with an explicit confirm behavior.
    #[must_use]
    pub fn with_mode(mode: ConfirmMode) -> Self {
        let (confirm_tx, confirm_rx) = unbounded();
        Self {
            destinations: Arc::new(DashMap::new()),
            next_seq: AtomicU64::new(1),
            next_tag: AtomicU64::new(1),
            next_ephemeral: AtomicU64::new(1),
            confirm_tx,
            confirm_rx: Mutex::new(Some(confirm_rx)),
            mode,
            reject_seqs: Mutex::new(HashSet::new()),
            acked: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Mark a sequence number for rejection instead of acknowledgment.
    pub fn inject_reject(&self, seq: u64) {
        self.reject_seqs.lock().insert(seq);
    }

    /// Emit an ack event, as the broker's confirm path would.
    pub fn emit_ack(&self, seq: u64, multiple: bool) {
        let _ = self.confirm_tx.send(ConfirmEvent::Ack { seq, multiple });
    }

    /// Emit a reject event, as the broker's confirm path would.
    pub fn emit_reject(&self, seq: u64, multiple: bool) {
        let _ = self.confirm_tx.send(ConfirmEvent::Reject { seq, multiple });
    }

    /// Total deliveries acknowledged (auto and manual).
    pub fn acked(&self) -> u64 {
        self.acked.load(Ordering::Relaxed)
    }

    /// Messages queued on `dest` and not yet delivered to a consumer.
    pub fn queued(&self, dest: &str) -> usize {
        self.destinations.get(dest).map_or(0, |q| q.rx.len())
    }

    fn confirm_after_send(&self, seq: u64) {
        let rejected = self.reject_seqs.lock().remove(&seq);
        if rejected {
            self.emit_reject(seq, false);
            return;
        }
        match self.mode {
            ConfirmMode::AckEach => self.emit_ack(seq, false),
            ConfirmMode::AckCumulative { every } => {
                if every > 0 && seq % every == 0 {
                    self.emit_ack(seq, true);
                }
            }
            ConfirmMode::Manual => {}
        }
    }
}

impl Default for MemTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemTransport {
    fn next_publish_seq(&self) -> u64 {
        self.next_seq.load(Ordering::Relaxed)
    }

    fn send(&self, dest: &str, headers: Headers, body: &[u8]) -> Result<u64> {
        let queue = self
            .destinations
            .get(dest)
            .ok_or_else(|| Error::DestinationNotFound(dest.to_string()))?;

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let delivery = Delivery {
            tag: self.next_tag.fetch_add(1, Ordering::Relaxed),
            headers,
            body: body.to_vec(),
        };
        queue
            .tx
            .send(delivery)
            .map_err(|_| Error::SendFailed(format!("destination {} closed", dest)))?;
        drop(queue);

        self.confirm_after_send(seq);
        Ok(seq)
    }

    fn take_confirm_events(&self) -> Option<Receiver<ConfirmEvent>> {
        self.confirm_rx.lock().take()
    }

    fn declare_destination(&self, name: &str) -> Result<()> {
        self.destinations.entry(name.to_string()).or_insert_with(|| {
            let (tx, rx) = unbounded();
            DestinationQueue { tx, rx }
        });
        Ok(())
    }

    fn declare_ephemeral_destination(&self) -> Result<String> {
        let name = format!(
            "{}{:016x}",
            EPHEMERAL_PREFIX,
            self.next_ephemeral.fetch_add(1, Ordering::Relaxed)
        );
        self.declare_destination(&name)?;
        Ok(name)
    }

    fn consume(
        &self,
        dest: &str,
        auto_ack: bool,
        listener: Arc<dyn DeliveryListener>,
    ) -> Result<Subscription> {
        let rx = self
            .destinations
            .get(dest)
            .map(|q| q.rx.clone())
            .ok_or_else(|| Error::DestinationNotFound(dest.to_string()))?;

        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let acked = auto_ack.then(|| Arc::clone(&self.acked));

        let handle = thread::Builder::new()
            .name(format!("corral-consume-{}", dest))
            .spawn(move || {
                while !flag.load(Ordering::Relaxed) {
                    match rx.recv_timeout(CONSUMER_POLL) {
                        Ok(delivery) => {
                            if let Some(counter) = &acked {
                                counter.fetch_add(1, Ordering::Relaxed);
                            }
                            listener.on_delivery(delivery);
                        }
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|e| Error::InvalidState(format!("failed to spawn consumer: {}", e)))?;

        // Ephemeral destinations behave like auto-delete queues: they vanish
        // with their (only) consumer so per-call reply queues cannot pile up.
        if dest.starts_with(EPHEMERAL_PREFIX) {
            let destinations = Arc::clone(&self.destinations);
            let name = dest.to_string();
            return Ok(Subscription::with_cleanup(
                cancelled,
                handle,
                Box::new(move || {
                    destinations.remove(&name);
                }),
            ));
        }
        Ok(Subscription::new(cancelled, handle))
    }

    fn ack(&self, _tag: u64) -> Result<()> {
        self.acked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    #[test]
    fn send_to_undeclared_destination_fails() {
        let transport = MemTransport::new();
        let err = transport
            .send("nowhere", Headers::default(), b"x")
            .expect_err("undeclared destination should fail");
        assert!(matches!(err, Error::DestinationNotFound(_)));
    }

    #[test]
    fn sequence_numbers_start_at_one_and_increase() {
        let transport = MemTransport::new();
        transport.declare_destination("q").expect("declare");
        assert_eq!(transport.next_publish_seq(), 1);
        let s1 = transport.send("q", Headers::default(), b"a").expect("send");
        let s2 = transport.send("q", Headers::default(), b"b").expect("send");
        assert_eq!(s1, 1);
        assert_eq!(s2, 2);
    }

    #[test]
    fn ack_each_emits_one_event_per_send() {
        let transport = MemTransport::new();
        transport.declare_destination("q").expect("declare");
        let events = transport.take_confirm_events().expect("first take");
        assert!(transport.take_confirm_events().is_none(), "take is one-shot");

        transport.send("q", Headers::default(), b"a").expect("send");
        transport.send("q", Headers::default(), b"b").expect("send");

        assert_eq!(
            events.recv_timeout(Duration::from_secs(1)).expect("event"),
            ConfirmEvent::Ack {
                seq: 1,
                multiple: false
            }
        );
        assert_eq!(
            events.recv_timeout(Duration::from_secs(1)).expect("event"),
            ConfirmEvent::Ack {
                seq: 2,
                multiple: false
            }
        );
    }

    #[test]
    fn cumulative_mode_acks_at_period_boundary() {
        let transport = MemTransport::with_mode(ConfirmMode::AckCumulative { every: 3 });
        transport.declare_destination("q").expect("declare");
        let events = transport.take_confirm_events().expect("take");

        for _ in 0..6 {
            transport.send("q", Headers::default(), b"m").expect("send");
        }

        let got: Vec<_> = (0..2)
            .map(|_| events.recv_timeout(Duration::from_secs(1)).expect("event"))
            .collect();
        assert_eq!(
            got,
            vec![
                ConfirmEvent::Ack {
                    seq: 3,
                    multiple: true
                },
                ConfirmEvent::Ack {
                    seq: 6,
                    multiple: true
                },
            ]
        );
        assert!(events.is_empty());
    }

    #[test]
    fn injected_reject_replaces_ack() {
        let transport = MemTransport::new();
        transport.declare_destination("q").expect("declare");
        let events = transport.take_confirm_events().expect("take");
        transport.inject_reject(1);

        transport.send("q", Headers::default(), b"bad").expect("send");
        assert_eq!(
            events.recv_timeout(Duration::from_secs(1)).expect("event"),
            ConfirmEvent::Reject {
                seq: 1,
                multiple: false
            }
        );
    }

    #[test]
    fn ephemeral_destinations_are_unique() {
        let transport = MemTransport::new();
        let a = transport.declare_ephemeral_destination().expect("declare");
        let b = transport.declare_ephemeral_destination().expect("declare");
        assert_ne!(a, b);
        assert!(a.starts_with("amq.gen-"));
    }

    #[test]
    fn consumer_receives_deliveries_in_order() {
        let transport = MemTransport::new();
        transport.declare_destination("q").expect("declare");

        let seen: Arc<PlMutex<Vec<Vec<u8>>>> = Arc::new(PlMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: Arc<dyn DeliveryListener> = Arc::new(move |delivery: Delivery| {
            sink.lock().push(delivery.body);
        });
        let _sub = transport.consume("q", true, listener).expect("consume");

        for i in 0..5u8 {
            transport
                .send("q", Headers::default(), &[i])
                .expect("send");
        }

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while seen.lock().len() < 5 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let got = seen.lock().clone();
        assert_eq!(got, vec![vec![0], vec![1], vec![2], vec![3], vec![4]]);
    }

    #[test]
    fn cancelling_an_ephemeral_consumer_deletes_its_destination() {
        let transport = MemTransport::new();
        let name = transport.declare_ephemeral_destination().expect("declare");

        let listener: Arc<dyn DeliveryListener> = Arc::new(|_: Delivery| {});
        let mut sub = transport.consume(&name, true, listener).expect("consume");
        sub.cancel();

        let err = transport
            .send(&name, Headers::default(), b"late")
            .expect_err("auto-delete destination is gone after cancellation");
        assert!(matches!(err, Error::DestinationNotFound(_)));
    }

    #[test]
    fn cancelling_a_named_consumer_keeps_its_destination() {
        let transport = MemTransport::new();
        transport.declare_destination("work").expect("declare");

        let listener: Arc<dyn DeliveryListener> = Arc::new(|_: Delivery| {});
        let mut sub = transport.consume("work", true, listener).expect("consume");
        sub.cancel();

        transport
            .send("work", Headers::default(), b"m")
            .expect("named destinations outlive their consumers");
    }

    #[test]
    fn cancelled_subscription_stops_consuming() {
        let transport = MemTransport::new();
        transport.declare_destination("q").expect("declare");

        let listener: Arc<dyn DeliveryListener> = Arc::new(|_: Delivery| {});
        let mut sub = transport.consume("q", true, listener).expect("consume");
        sub.cancel();
        assert!(sub.is_cancelled());

        transport.send("q", Headers::default(), b"m").expect("send");
        thread::sleep(Duration::from_millis(60));
        assert_eq!(transport.queued("q"), 1, "nothing should drain the queue");
    }
}
