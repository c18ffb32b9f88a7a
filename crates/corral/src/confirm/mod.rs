// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Publisher-confirm tracking
//!
//! Guarantees a delivery outcome for every published message when the broker
//! acknowledges asynchronously, possibly cumulatively, on its own thread.
//!
//! ## Protocol Flow
//!
//! ```text
//! Publisher                 Tracker                    Broker
//!    |                         |                          |
//!    |-- record(seq=1) ------->|                          |
//!    |-- send(seq=1) --------------------------------- ->|
//!    |-- record(seq=2) ------->|                          |
//!    |-- send(seq=2) --------------------------------- ->|
//!    |                         |<-- ack(seq=2, multiple) -|
//!    |                         | (removes 1 and 2)        |
//!    |-- await_drain(5s) ----->|                          |
//!    |<---- drained -----------|                          |
//! ```
//!
//! ## Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`ConfirmTracker`] | Ordered pending map, point/cumulative resolution, drain wait |
//! | [`ConfirmDispatcher`] | Single thread draining transport confirm events into the tracker |
//! | [`ConfirmMetrics`] | Atomic counters (published, confirmed, rejected, ...) |

mod dispatcher;
mod metrics;
mod tracker;

pub use dispatcher::ConfirmDispatcher;
pub use metrics::ConfirmMetrics;
pub use tracker::ConfirmTracker;
