// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Counters for the publisher-confirm path.
//!
//! Lock-free atomic counters, `Relaxed` ordering throughout: these are
//! observability numbers, not synchronization points.

use std::sync::atomic::{AtomicU64, Ordering};

/// Confirm-path metrics collector.
///
/// # Thread Safety
///
/// All methods use atomic operations; safe to share across the publishing
/// path and the confirm dispatcher.
#[derive(Debug, Default)]
pub struct ConfirmMetrics {
    /// Messages handed to the transport.
    published: AtomicU64,
    /// Messages removed from the pending set by an ack (point or cumulative).
    confirmed: AtomicU64,
    /// Messages removed from the pending set by a nack.
    rejected: AtomicU64,
    /// Cumulative (`multiple == true`) notifications processed.
    cumulative_acks: AtomicU64,
    /// Drain waits that hit their deadline.
    drain_timeouts: AtomicU64,
}

impl ConfirmMetrics {
    /// Create a zeroed collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count messages handed to the transport.
    pub fn increment_published(&self, count: u64) {
        self.published.fetch_add(count, Ordering::Relaxed);
    }

    /// Count messages confirmed by the broker.
    pub fn increment_confirmed(&self, count: u64) {
        self.confirmed.fetch_add(count, Ordering::Relaxed);
    }

    /// Count messages rejected by the broker.
    pub fn increment_rejected(&self, count: u64) {
        self.rejected.fetch_add(count, Ordering::Relaxed);
    }

    /// Count a cumulative notification.
    pub fn increment_cumulative_acks(&self) {
        self.cumulative_acks.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a drain deadline miss.
    pub fn increment_drain_timeouts(&self) {
        self.drain_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Messages handed to the transport (snapshot).
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Messages confirmed (snapshot).
    pub fn confirmed(&self) -> u64 {
        self.confirmed.load(Ordering::Relaxed)
    }

    /// Messages rejected (snapshot).
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Cumulative notifications processed (snapshot).
    pub fn cumulative_acks(&self) -> u64 {
        self.cumulative_acks.load(Ordering::Relaxed)
    }

    /// Drain deadline misses (snapshot).
    pub fn drain_timeouts(&self) -> u64 {
        self.drain_timeouts.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = ConfirmMetrics::new();
        metrics.increment_published(3);
        metrics.increment_confirmed(2);
        metrics.increment_rejected(1);
        metrics.increment_cumulative_acks();
        metrics.increment_drain_timeouts();

        assert_eq!(metrics.published(), 3);
        assert_eq!(metrics.confirmed(), 2);
        assert_eq!(metrics.rejected(), 1);
        assert_eq!(metrics.cumulative_acks(), 1);
        assert_eq!(metrics.drain_timeouts(), 1);
    }
}
