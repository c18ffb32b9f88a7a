// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Confirm-event dispatcher.
//!
//! One thread per tracker drains the transport's confirm channel into
//! [`ConfirmTracker`] calls. Modeling broker callbacks as messages on a
//! channel keeps the removal side of the pending map single-consumer; the
//! only concurrency the tracker sees is insert-vs-remove.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError};

use crate::confirm::ConfirmTracker;
use crate::transport::ConfirmEvent;

/// Poll interval for the dispatcher checking its shutdown flag.
const DISPATCH_POLL: Duration = Duration::from_millis(50);

/// Background thread translating [`ConfirmEvent`]s into tracker updates.
///
/// Stops when dropped, when [`ConfirmDispatcher::stop`] is called, or when
/// the transport side of the channel disconnects.
pub struct ConfirmDispatcher {
    shutdown: Arc<AtomicBool>,
    /// Set by the thread when the transport side of the channel goes away.
    disconnected: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ConfirmDispatcher {
    /// Spawn the dispatcher thread for `tracker`.
    pub fn spawn(events: Receiver<ConfirmEvent>, tracker: Arc<ConfirmTracker>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let disconnected = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let lost = Arc::clone(&disconnected);

        let handle = std::thread::Builder::new()
            .name("corral-confirm".to_string())
            .spawn(move || {
                while !flag.load(Ordering::Relaxed) {
                    match events.recv_timeout(DISPATCH_POLL) {
                        Ok(ConfirmEvent::Ack { seq, multiple }) => {
                            tracker.on_confirm(seq, multiple);
                        }
                        Ok(ConfirmEvent::Reject { seq, multiple }) => {
                            tracker.on_reject(seq, multiple);
                        }
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => {
                            log::warn!("[ConfirmDispatcher] confirm channel closed");
                            lost.store(true, Ordering::Relaxed);
                            break;
                        }
                    }
                }
            })
            .ok();

        if handle.is_none() {
            log::error!("[ConfirmDispatcher] failed to spawn dispatcher thread");
        }

        Self {
            shutdown,
            disconnected,
            handle,
        }
    }

    /// Whether the confirm channel has disconnected. Once true, published
    /// messages can no longer be tracked.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Relaxed)
    }

    /// Stop the dispatcher and join its thread.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("[ConfirmDispatcher] dispatcher thread panicked");
            }
        }
    }
}

impl Drop for ConfirmDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
