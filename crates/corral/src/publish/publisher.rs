// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reliable publisher built on the confirm tracker.
//!
//! Every publish follows one primitive: peek the next sequence number,
//! record the payload in the tracker, transmit. The strategies only differ
//! in when they block for the tracker to drain.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::PublisherConfig;
use crate::confirm::{ConfirmDispatcher, ConfirmMetrics, ConfirmTracker};
use crate::error::{Error, Result};
use crate::transport::{Headers, Transport};

/// Delivery strategy for a batch of publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Block for a confirm after every single message.
    ///
    /// Strict ordering and exact failure attribution (at most one message in
    /// flight), lowest throughput.
    Individual,
    /// Block once per window of this many messages (and once for the tail).
    ///
    /// On a drain timeout the failed window is imprecise; the unconfirmed
    /// payloads are recoverable from the report.
    Batched(usize),
    /// Never block during publishing; one final drain after the last send.
    ///
    /// The publishing path and the confirm path run concurrently, which is
    /// the only way to approach line rate.
    Async,
}

/// Outcome of [`ReliablePublisher::publish_all`].
///
/// A nack or drain timeout never aborts a run; it ends up here and the
/// caller decides what to retry.
#[derive(Debug, Default)]
pub struct PublishReport {
    /// Messages handed to the transport.
    pub published: u64,
    /// Blocking drain waits performed.
    pub drain_waits: u64,
    /// Drain waits that hit their deadline.
    pub drain_timeouts: u64,
    /// Entries the broker nacked, with their payloads.
    pub rejected: Vec<(u64, Arc<[u8]>)>,
    /// Entries still unconfirmed when the run finished.
    pub unconfirmed: Vec<(u64, Arc<[u8]>)>,
}

impl PublishReport {
    /// Whether every message of the run was confirmed.
    pub fn all_confirmed(&self) -> bool {
        self.drain_timeouts == 0 && self.rejected.is_empty() && self.unconfirmed.is_empty()
    }

    /// Collapse the report into a `Result`, for callers that treat any
    /// failure as fatal rather than retrying from the payload lists.
    pub fn into_result(self) -> Result<()> {
        if let Some((seq, _)) = self.rejected.first() {
            return Err(Error::Rejected { seq: *seq });
        }
        if !self.unconfirmed.is_empty() {
            return Err(Error::ConfirmTimeout {
                outstanding: self.unconfirmed.len(),
            });
        }
        Ok(())
    }
}

/// Publisher wrapping a raw transport with confirm tracking.
pub struct ReliablePublisher {
    transport: Arc<dyn Transport>,
    destination: String,
    tracker: Arc<ConfirmTracker>,
    /// Owns the dispatcher thread for the transport's confirm channel.
    dispatcher: ConfirmDispatcher,
    config: PublisherConfig,
    /// Serializes peek + record + send so the recorded sequence number is
    /// the one the transport assigns.
    send_lock: Mutex<()>,
}

impl ReliablePublisher {
    /// Create a publisher for `destination`.
    ///
    /// Takes the transport's confirm channel; there can be only one
    /// publisher per transport instance. The publisher must also be the
    /// transport's only sender: it peeks [`Transport::next_publish_seq`] and
    /// records under that number before transmitting, which is only correct
    /// when nothing else advances the sequence counter.
    pub fn new(
        transport: Arc<dyn Transport>,
        destination: &str,
        config: PublisherConfig,
    ) -> Result<Self> {
        transport.declare_destination(destination)?;
        let events = transport.take_confirm_events().ok_or_else(|| {
            Error::InvalidState("confirm channel already taken on this transport".to_string())
        })?;

        let tracker = Arc::new(ConfirmTracker::new());
        let dispatcher = ConfirmDispatcher::spawn(events, Arc::clone(&tracker));
        log::info!("ReliablePublisher started for '{}'", destination);

        Ok(Self {
            transport,
            destination: destination.to_string(),
            tracker,
            dispatcher,
            config,
            send_lock: Mutex::new(()),
        })
    }

    /// Record and transmit one message; returns its sequence number.
    ///
    /// The entry is registered before the transmit and removed again if the
    /// transmit itself fails, so the tracker only ever holds messages whose
    /// fate is genuinely pending.
    ///
    /// Fails with [`Error::Disconnected`] once the transport's confirm
    /// channel has closed: a message published then could never be resolved.
    pub fn publish(&self, body: &[u8]) -> Result<u64> {
        if self.dispatcher.is_disconnected() {
            return Err(Error::Disconnected);
        }
        let payload: Arc<[u8]> = Arc::from(body);
        let _guard = self.send_lock.lock();

        let seq = self.transport.next_publish_seq();
        self.tracker.record(seq, payload);
        match self
            .transport
            .send(&self.destination, Headers::default(), body)
        {
            Ok(sent) => {
                if sent != seq {
                    // Single-sender contract violated: some other sender
                    // advanced the counter between peek and send. Re-key so
                    // the payload answers to the confirm it will receive.
                    log::error!(
                        "[ReliablePublisher] sequence skew: recorded {} but transport assigned {}",
                        seq,
                        sent
                    );
                    self.tracker.rekey(seq, sent);
                }
                self.tracker.metrics().increment_published(1);
                Ok(sent)
            }
            Err(e) => {
                self.tracker.resolve_single(seq);
                Err(e)
            }
        }
    }

    /// Publish a run of messages under `strategy`.
    pub fn publish_all<I, B>(&self, bodies: I, strategy: Strategy) -> Result<PublishReport>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut report = PublishReport::default();
        match strategy {
            Strategy::Individual => {
                for body in bodies {
                    self.publish(body.as_ref())?;
                    report.published += 1;
                    self.drain_into(&mut report);
                }
            }
            Strategy::Batched(batch_size) => {
                if batch_size == 0 {
                    return Err(Error::InvalidConfig("batch size must be > 0".to_string()));
                }
                let mut outstanding_in_window = 0usize;
                for body in bodies {
                    self.publish(body.as_ref())?;
                    report.published += 1;
                    outstanding_in_window += 1;
                    if outstanding_in_window == batch_size {
                        self.drain_into(&mut report);
                        outstanding_in_window = 0;
                    }
                }
                if outstanding_in_window > 0 {
                    self.drain_into(&mut report);
                }
            }
            Strategy::Async => {
                for body in bodies {
                    self.publish(body.as_ref())?;
                    report.published += 1;
                }
                self.drain_into(&mut report);
            }
        }

        report.rejected = self.tracker.take_rejected();
        report.unconfirmed = self.tracker.outstanding_payloads();
        if !report.all_confirmed() {
            log::warn!(
                "[ReliablePublisher] run finished with {} rejected, {} unconfirmed, {} drain timeouts",
                report.rejected.len(),
                report.unconfirmed.len(),
                report.drain_timeouts
            );
        }
        Ok(report)
    }

    /// [`publish_all`](Self::publish_all) batched with the configured
    /// default window size.
    pub fn publish_all_default<I, B>(&self, bodies: I) -> Result<PublishReport>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        self.publish_all(bodies, Strategy::Batched(self.config.batch_size))
    }

    /// Block until every outstanding message resolves or `timeout` elapses.
    pub fn await_drain(&self, timeout: Duration) -> Result<()> {
        self.tracker.await_drain(timeout)
    }

    /// Number of messages with an unknown fate.
    pub fn outstanding(&self) -> usize {
        self.tracker.outstanding()
    }

    /// The tracker, for payload recovery after a timeout.
    pub fn tracker(&self) -> &Arc<ConfirmTracker> {
        &self.tracker
    }

    /// Confirm-path counters.
    pub fn metrics(&self) -> &Arc<ConfirmMetrics> {
        self.tracker.metrics()
    }

    /// One bounded drain wait, folded into the report rather than aborting.
    fn drain_into(&self, report: &mut PublishReport) {
        report.drain_waits += 1;
        if let Err(Error::ConfirmTimeout { outstanding }) =
            self.tracker.await_drain(self.config.confirm_timeout)
        {
            report.drain_timeouts += 1;
            log::warn!(
                "[ReliablePublisher] drain timed out with {} outstanding",
                outstanding
            );
        }
    }
}
