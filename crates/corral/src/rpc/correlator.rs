// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Correlation id allocation and the pending-call table.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};

// ---------------------------------------------------------------------------
// Correlation id
// ---------------------------------------------------------------------------

/// Opaque id stamped on a request and echoed back on its reply.
///
/// Mixes wall-clock nanos, a hash of the calling thread id and a caller
/// discriminant, so ids stay unique across threads, process restarts and
/// rapid successive calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Allocate a fresh id. `discriminant` must be unique per caller
    /// (typically a per-client call counter).
    pub fn new(discriminant: u64) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let mut hasher = DefaultHasher::new();
        std::thread::current().id().hash(&mut hasher);
        let thread_bits = hasher.finish();
        let mixed = (nanos as u128) ^ ((thread_bits as u128) << 64) ^ (discriminant as u128);
        CorrelationId(format!("{:032x}", mixed))
    }

    /// Wrap an id received from the wire.
    pub fn from_header(raw: &str) -> Self {
        CorrelationId(raw.to_string())
    }

    /// The wire representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Reply slot
// ---------------------------------------------------------------------------

enum SlotState {
    Empty,
    Filled(Vec<u8>),
    /// The waiter gave up; late fills are discarded.
    Retired,
}

/// Single-assignment slot the caller blocks on and the reply path fills.
///
/// Exactly one fill wins. Everything after the first (a duplicate reply, or
/// any reply after the waiter timed out) is rejected so the fill side can
/// log and drop it.
pub struct ReplySlot {
    state: Mutex<SlotState>,
    filled: Condvar,
}

impl ReplySlot {
    fn new() -> Self {
        ReplySlot {
            state: Mutex::new(SlotState::Empty),
            filled: Condvar::new(),
        }
    }

    /// Deposit a reply body. Returns false if the slot already held one or
    /// the waiter has retired it.
    pub fn fill(&self, body: Vec<u8>) -> bool {
        let mut state = self.state.lock();
        match *state {
            SlotState::Empty => {
                *state = SlotState::Filled(body);
                self.filled.notify_one();
                true
            }
            SlotState::Filled(_) | SlotState::Retired => false,
        }
    }

    /// Block until the slot is filled or `timeout` elapses.
    ///
    /// On timeout the slot is retired, which atomically closes the window
    /// for a reply racing the deadline.
    pub fn wait(&self, timeout: Duration) -> Option<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let SlotState::Filled(_) = *state {
                match std::mem::replace(&mut *state, SlotState::Retired) {
                    SlotState::Filled(body) => return Some(body),
                    _ => unreachable!(),
                }
            }
            let now = Instant::now();
            if now >= deadline {
                *state = SlotState::Retired;
                return None;
            }
            self.filled.wait_for(&mut state, deadline - now);
        }
    }
}

// ---------------------------------------------------------------------------
// Correlator
// ---------------------------------------------------------------------------

/// Table of calls awaiting their reply, keyed by correlation id.
///
/// # Thread Safety
///
/// Register runs on the calling thread, resolve on the transport's consumer
/// thread; the map is sharded so neither blocks the other.
pub struct RpcCorrelator {
    pending: DashMap<CorrelationId, Arc<ReplySlot>>,
}

impl RpcCorrelator {
    pub fn new() -> Self {
        RpcCorrelator {
            pending: DashMap::new(),
        }
    }

    /// Register a call and get its guard. The guard unregisters the call
    /// when dropped, on every exit path including panics.
    pub fn register(self: &Arc<Self>, id: CorrelationId) -> PendingCall {
        let slot = Arc::new(ReplySlot::new());
        self.pending.insert(id.clone(), Arc::clone(&slot));
        PendingCall {
            correlator: Arc::clone(self),
            id,
            slot,
        }
    }

    /// Route a reply body to its waiting call.
    ///
    /// Returns false when no call is waiting under `id` (stale or duplicate
    /// reply); the caller decides whether that is worth logging.
    pub fn resolve(&self, id: &CorrelationId, body: Vec<u8>) -> bool {
        match self.pending.remove(id) {
            Some((_, slot)) => slot.fill(body),
            None => false,
        }
    }

    /// Number of calls currently awaiting a reply.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    fn unregister(&self, id: &CorrelationId) {
        self.pending.remove(id);
    }
}

impl Default for RpcCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for one registered call.
pub struct PendingCall {
    correlator: Arc<RpcCorrelator>,
    id: CorrelationId,
    slot: Arc<ReplySlot>,
}

impl PendingCall {
    pub fn id(&self) -> &CorrelationId {
        &self.id
    }

    /// Block for the reply; `None` on timeout.
    pub fn wait(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.slot.wait(timeout)
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.correlator.unregister(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn first_fill_wins() {
        let slot = ReplySlot::new();
        assert!(slot.fill(b"a".to_vec()));
        assert!(!slot.fill(b"b".to_vec()));
        assert_eq!(slot.wait(Duration::from_millis(10)), Some(b"a".to_vec()));
    }

    #[test]
    fn retired_slot_rejects_late_fill() {
        let slot = ReplySlot::new();
        assert_eq!(slot.wait(Duration::from_millis(5)), None);
        assert!(!slot.fill(b"late".to_vec()));
    }

    #[test]
    fn resolve_routes_to_registered_call() {
        let correlator = Arc::new(RpcCorrelator::new());
        let call = correlator.register(CorrelationId::new(1));
        assert_eq!(correlator.outstanding(), 1);

        let resolver = Arc::clone(&correlator);
        let id = call.id().clone();
        let handle = thread::spawn(move || resolver.resolve(&id, b"reply".to_vec()));

        assert_eq!(
            call.wait(Duration::from_secs(1)),
            Some(b"reply".to_vec()),
            "reply should arrive from the resolver thread"
        );
        assert!(handle.join().expect("resolver thread"));
    }

    #[test]
    fn dropping_the_guard_unregisters() {
        let correlator = Arc::new(RpcCorrelator::new());
        let id = CorrelationId::new(7);
        {
            let _call = correlator.register(id.clone());
            assert_eq!(correlator.outstanding(), 1);
        }
        assert_eq!(correlator.outstanding(), 0);
        assert!(!correlator.resolve(&id, b"stale".to_vec()));
    }

    #[test]
    fn ids_are_unique_across_rapid_allocation() {
        let a = CorrelationId::new(1);
        let b = CorrelationId::new(2);
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }
}
