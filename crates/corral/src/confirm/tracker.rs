// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outstanding-confirm tracker.
//!
//! An ordered map from publish sequence number to the payload published under
//! it. The publishing path inserts before each transmit; the confirm
//! dispatcher removes entries as ack/nack notifications arrive. Cumulative
//! notifications ("everything up to N") are a single range removal under the
//! lock, so a concurrent `record` of a larger key can never be swept up by a
//! removal meant for older keys.
//!
//! # Thread Safety
//!
//! One mutex guards the map. Inserts come from application threads, removals
//! from the dispatcher thread; [`ConfirmTracker::await_drain`] blocks on a
//! condvar signaled whenever the pending set transitions to empty (no
//! busy-wait).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::confirm::ConfirmMetrics;
use crate::error::{Error, Result};

/// Tracker of published-but-unconfirmed messages.
pub struct ConfirmTracker {
    /// seq -> payload. Ordered so cumulative removal is one `split_off`.
    pending: Mutex<BTreeMap<u64, Arc<[u8]>>>,
    /// Signaled on every transition of `pending` to empty.
    drained: Condvar,
    /// Nacked entries, kept for the caller to log or re-publish.
    rejected: Mutex<Vec<(u64, Arc<[u8]>)>>,
    metrics: Arc<ConfirmMetrics>,
}

impl ConfirmTracker {
    /// Create a tracker with its own metrics collector.
    #[must_use]
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(ConfirmMetrics::new()))
    }

    /// Create a tracker sharing an existing metrics collector.
    #[must_use]
    pub fn with_metrics(metrics: Arc<ConfirmMetrics>) -> Self {
        Self {
            pending: Mutex::new(BTreeMap::new()),
            drained: Condvar::new(),
            rejected: Mutex::new(Vec::new()),
            metrics,
        }
    }

    /// Metrics collector shared with the publisher.
    pub fn metrics(&self) -> &Arc<ConfirmMetrics> {
        &self.metrics
    }

    /// Register a payload about to be transmitted under `seq`.
    ///
    /// Sequence numbers are transport-assigned and never reused, so a
    /// duplicate key is a caller bug; it is logged and the entry overwritten.
    pub fn record(&self, seq: u64, payload: Arc<[u8]>) {
        let mut pending = self.pending.lock();
        if pending.insert(seq, payload).is_some() {
            log::error!("[ConfirmTracker] duplicate record for seq={}", seq);
        }
    }

    /// Remove exactly `seq` if present. Idempotent: resolving an absent key
    /// is a no-op (a confirm may race with late broker redelivery).
    pub fn resolve_single(&self, seq: u64) -> usize {
        let mut pending = self.pending.lock();
        let removed = Self::remove_locked(&mut pending, seq, false);
        Self::notify_if_drained(&self.drained, &pending, &removed);
        removed.len()
    }

    /// Remove every entry with key `<= seq` as one atomic step.
    ///
    /// Returns the number of entries removed.
    pub fn resolve_cumulative(&self, seq: u64) -> usize {
        let mut pending = self.pending.lock();
        let removed = Self::remove_locked(&mut pending, seq, true);
        Self::notify_if_drained(&self.drained, &pending, &removed);
        removed.len()
    }

    /// Move a pending entry to a new key, keeping its payload.
    ///
    /// No-op if `from` is absent or `from == to`.
    pub fn rekey(&self, from: u64, to: u64) {
        if from == to {
            return;
        }
        let mut pending = self.pending.lock();
        if let Some(payload) = pending.remove(&from) {
            pending.insert(to, payload);
        }
    }

    /// Ack entry point for the dispatcher.
    ///
    /// Counters are updated while the pending lock is still held, so a
    /// thread returning from [`ConfirmTracker::await_drain`] always observes
    /// the metrics of the confirm that drained it.
    pub fn on_confirm(&self, seq: u64, multiple: bool) {
        let mut pending = self.pending.lock();
        let removed = Self::remove_locked(&mut pending, seq, multiple);
        self.metrics.increment_confirmed(removed.len() as u64);
        if multiple {
            self.metrics.increment_cumulative_acks();
        }
        Self::notify_if_drained(&self.drained, &pending, &removed);
    }

    /// Nack entry point for the dispatcher.
    ///
    /// Reports each dropped payload before performing the same cleanup as
    /// [`ConfirmTracker::on_confirm`]; rejection and confirmation share one
    /// bookkeeping path. The removed entries stay retrievable through
    /// [`ConfirmTracker::take_rejected`] so the caller can decide between
    /// retry and drop.
    pub fn on_reject(&self, seq: u64, multiple: bool) {
        let mut pending = self.pending.lock();
        let removed = Self::remove_locked(&mut pending, seq, multiple);
        self.metrics.increment_rejected(removed.len() as u64);
        {
            let mut rejected = self.rejected.lock();
            for (seq, payload) in &removed {
                log::warn!(
                    "[ConfirmTracker] message nack-ed: seq={}, {} bytes",
                    seq,
                    payload.len()
                );
                rejected.push((*seq, Arc::clone(payload)));
            }
        }
        Self::notify_if_drained(&self.drained, &pending, &removed);
    }

    /// Block until the pending set is empty or `timeout` elapses.
    ///
    /// On timeout the pending set is left untouched and
    /// [`Error::ConfirmTimeout`] reports how many entries are outstanding;
    /// their payloads remain recoverable via
    /// [`ConfirmTracker::outstanding_payloads`].
    pub fn await_drain(&self, timeout: std::time::Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();
        while !pending.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                self.metrics.increment_drain_timeouts();
                return Err(Error::ConfirmTimeout {
                    outstanding: pending.len(),
                });
            }
            self.drained.wait_for(&mut pending, deadline - now);
        }
        Ok(())
    }

    /// Number of unconfirmed messages.
    pub fn outstanding(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether every recorded message has been resolved.
    pub fn is_drained(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Snapshot of the unconfirmed entries, oldest first.
    pub fn outstanding_payloads(&self) -> Vec<(u64, Arc<[u8]>)> {
        self.pending
            .lock()
            .iter()
            .map(|(seq, payload)| (*seq, Arc::clone(payload)))
            .collect()
    }

    /// Drain the list of nacked entries collected so far.
    pub fn take_rejected(&self) -> Vec<(u64, Arc<[u8]>)> {
        std::mem::take(&mut *self.rejected.lock())
    }

    /// Shared removal for acks and nacks. Caller holds the pending lock and
    /// decides when to notify, after any bookkeeping of its own.
    fn remove_locked(
        pending: &mut BTreeMap<u64, Arc<[u8]>>,
        seq: u64,
        multiple: bool,
    ) -> Vec<(u64, Arc<[u8]>)> {
        if multiple {
            match seq.checked_add(1) {
                Some(bound) => {
                    let rest = pending.split_off(&bound);
                    let confirmed = std::mem::replace(pending, rest);
                    confirmed.into_iter().collect()
                }
                None => std::mem::take(pending).into_iter().collect(),
            }
        } else {
            pending.remove(&seq).map(|p| (seq, p)).into_iter().collect()
        }
    }

    /// Wake drain waiters on the transition of `pending` to empty.
    fn notify_if_drained(
        drained: &Condvar,
        pending: &BTreeMap<u64, Arc<[u8]>>,
        removed: &[(u64, Arc<[u8]>)],
    ) {
        if !removed.is_empty() && pending.is_empty() {
            drained.notify_all();
        }
    }
}

impl Default for ConfirmTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn payload(s: &str) -> Arc<[u8]> {
        Arc::from(s.as_bytes())
    }

    #[test]
    fn record_then_resolve_single() {
        let tracker = ConfirmTracker::new();
        tracker.record(1, payload("a"));
        tracker.record(2, payload("b"));

        assert_eq!(tracker.resolve_single(1), 1);
        assert_eq!(tracker.outstanding(), 1);
        // Absent key: no-op, no error.
        assert_eq!(tracker.resolve_single(1), 0);
        assert_eq!(tracker.resolve_single(99), 0);
    }

    #[test]
    fn cumulative_removes_at_or_below_only() {
        let tracker = ConfirmTracker::new();
        for seq in [5u64, 1, 9, 3, 7] {
            tracker.record(seq, payload("m"));
        }

        assert_eq!(tracker.resolve_cumulative(5), 3); // 1, 3, 5
        let left: Vec<u64> = tracker
            .outstanding_payloads()
            .into_iter()
            .map(|(seq, _)| seq)
            .collect();
        assert_eq!(left, vec![7, 9]);
    }

    #[test]
    fn cumulative_at_u64_max_clears_everything() {
        let tracker = ConfirmTracker::new();
        tracker.record(u64::MAX, payload("edge"));
        tracker.record(1, payload("a"));
        assert_eq!(tracker.resolve_cumulative(u64::MAX), 2);
        assert!(tracker.is_drained());
    }

    #[test]
    fn reject_reports_payloads_and_cleans_up() {
        let tracker = ConfirmTracker::new();
        tracker.record(1, payload("keep"));
        tracker.record(2, payload("lost"));

        tracker.on_reject(2, false);

        assert_eq!(tracker.outstanding(), 1);
        let rejected = tracker.take_rejected();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].0, 2);
        assert_eq!(&*rejected[0].1, b"lost");
        assert_eq!(tracker.metrics().rejected(), 1);
        // Stash is drained.
        assert!(tracker.take_rejected().is_empty());
    }

    #[test]
    fn await_drain_wakes_on_empty_transition() {
        let tracker = Arc::new(ConfirmTracker::new());
        for seq in 1..=3u64 {
            tracker.record(seq, payload("m"));
        }

        let resolver = Arc::clone(&tracker);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            resolver.on_confirm(3, true);
        });

        let started = Instant::now();
        tracker
            .await_drain(Duration::from_secs(2))
            .expect("should drain well before the deadline");
        assert!(started.elapsed() < Duration::from_secs(1));
        handle.join().expect("resolver thread");
    }

    #[test]
    fn await_drain_timeout_preserves_entries() {
        let tracker = ConfirmTracker::new();
        tracker.record(1, payload("a"));
        tracker.record(2, payload("b"));

        let err = tracker
            .await_drain(Duration::from_millis(40))
            .expect_err("nothing resolves, must time out");
        assert!(matches!(err, Error::ConfirmTimeout { outstanding: 2 }));
        assert_eq!(tracker.outstanding(), 2);
        assert_eq!(tracker.metrics().drain_timeouts(), 1);
    }

    #[test]
    fn rekey_moves_the_payload_to_the_new_sequence() {
        let tracker = ConfirmTracker::new();
        tracker.record(5, payload("skewed"));

        tracker.rekey(5, 9);

        // Only the new key resolves the entry now.
        assert_eq!(tracker.resolve_single(5), 0);
        assert_eq!(tracker.resolve_single(9), 1);
        assert!(tracker.is_drained());

        // Absent source: nothing happens.
        tracker.rekey(1, 2);
        assert!(tracker.is_drained());
    }

    #[test]
    fn drained_waiter_observes_final_metrics() {
        // The ack that empties the pending set must update the counters
        // before any drain waiter can run; repeat to shake out interleavings.
        for _ in 0..20 {
            let tracker = Arc::new(ConfirmTracker::new());
            for seq in 1..=20u64 {
                tracker.record(seq, payload("m"));
            }

            let resolver = Arc::clone(&tracker);
            let handle = std::thread::spawn(move || {
                for seq in 1..=20u64 {
                    resolver.on_confirm(seq, false);
                }
            });

            tracker
                .await_drain(Duration::from_secs(2))
                .expect("all acks land");
            assert_eq!(tracker.metrics().confirmed(), 20);
            handle.join().expect("resolver thread");
        }
    }

    #[test]
    fn concurrent_records_survive_cumulative_for_older_keys() {
        let tracker = Arc::new(ConfirmTracker::new());
        for seq in 1..=500u64 {
            tracker.record(seq, payload("old"));
        }

        let writer = Arc::clone(&tracker);
        let recorder = std::thread::spawn(move || {
            for seq in 501..=1000u64 {
                writer.record(seq, Arc::from(&b"new"[..]));
            }
        });
        let resolver = Arc::clone(&tracker);
        let cleaner = std::thread::spawn(move || {
            resolver.resolve_cumulative(500);
        });

        recorder.join().expect("recorder");
        cleaner.join().expect("cleaner");

        // Exactly the 500 newer keys remain, whatever the interleaving.
        assert_eq!(tracker.outstanding(), 500);
        let smallest = tracker.outstanding_payloads()[0].0;
        assert_eq!(smallest, 501);
    }
}
