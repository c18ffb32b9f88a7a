// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # corral
//!
//! Reliable messaging correlation layer: publisher confirms and RPC
//! request/reply correlation over a broker-style transport.
//!
//! Message brokers make publishing fire-and-forget. This crate adds the two
//! bookkeeping layers applications need on top of that:
//!
//! - **Publisher confirms** - every published message is tracked until the
//!   broker acknowledges (or rejects) it, including cumulative acks that
//!   resolve whole ranges at once. No message is ever silently lost between
//!   "send returned" and "broker stored it".
//! - **RPC correlation** - request/reply conversations over two one-way
//!   destinations, matched by correlation id, with bounded blocking waits
//!   and guaranteed cleanup of abandoned calls.
//!
//! ## Architecture
//!
//! ```text
//!   +------------------+        +-------------------+
//!   | ReliablePublisher |       | RpcClient/Server  |
//!   |  (publish module) |       |   (rpc module)    |
//!   +---------+--------+        +---------+---------+
//!             |                           |
//!   +---------v--------+        +---------v---------+
//!   |  ConfirmTracker   |       |  RpcCorrelator    |
//!   |  (confirm module) |       |  (pending calls)  |
//!   +---------+--------+        +---------+---------+
//!             |                           |
//!   +---------v---------------------------v---------+
//!   |                  Transport                     |
//!   |   (seq numbers, confirm events, deliveries)    |
//!   +------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type                  | Purpose                                        |
//! |-----------------------|------------------------------------------------|
//! | [`ReliablePublisher`] | Publish with confirm tracking and strategies   |
//! | [`ConfirmTracker`]    | Sequence-number ledger of unconfirmed messages |
//! | [`RpcClient`]         | Blocking request/reply calls                   |
//! | [`RpcServer`]         | Serve requests with a handler function         |
//! | [`Transport`]         | Seam to the actual broker client               |
//! | [`MemTransport`]      | In-process transport for tests and examples    |
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use corral::config::PublisherConfig;
//! use corral::transport::MemTransport;
//! use corral::{ReliablePublisher, Strategy, Transport};
//!
//! fn main() -> corral::Result<()> {
//!     let transport: Arc<dyn Transport> = Arc::new(MemTransport::new());
//!     let publisher =
//!         ReliablePublisher::new(transport, "events", PublisherConfig::default())?;
//!
//!     let bodies = (0..1000u32).map(|i| i.to_string().into_bytes());
//!     let report = publisher.publish_all(bodies, Strategy::Batched(100))?;
//!     assert!(report.all_confirmed());
//!
//!     publisher.await_drain(Duration::from_secs(5))?;
//!     Ok(())
//! }
//! ```

/// Runtime configuration for publishers and RPC endpoints.
pub mod config;
/// Publisher-confirm tracking: ledger, dispatcher and metrics.
pub mod confirm;
/// Crate-wide error type.
pub mod error;
/// Reliable publishing strategies on top of the confirm tracker.
pub mod publish;
/// RPC request/reply correlation.
pub mod rpc;
/// Transport seam and the in-process implementation.
pub mod transport;

pub use config::{PublisherConfig, RpcConfig};
pub use confirm::{ConfirmMetrics, ConfirmTracker};
pub use error::{Error, Result};
pub use publish::{PublishReport, ReliablePublisher, Strategy};
pub use rpc::{RequestHandler, RpcClient, RpcError, RpcServer};
pub use transport::{ConfirmEvent, MemTransport, Transport};
