// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request/reply correlation over a fire-and-forget transport.
//!
//! The transport only knows how to publish bytes to a destination; this
//! module layers a blocking call semantic on top of it:
//!
//! ```text
//!   RpcClient                transport                 RpcServer
//!      |                                                  |
//!      |-- request {corr_id, reply_to} --> request dest --|
//!      |                                                  | handler(payload)
//!      |<-- reply {corr_id} ------ ephemeral reply dest --|
//!      |                                                  |
//!   correlator matches corr_id,                       ack request
//!   wakes the blocked caller
//! ```
//!
//! ## Components
//!
//! | Type              | Role                                                |
//! |-------------------|-----------------------------------------------------|
//! | [`CorrelationId`] | Unique id stamped on a request, echoed on its reply |
//! | [`RpcCorrelator`] | Pending-call table routing replies to waiters       |
//! | [`ReplySlot`]     | Single-assignment slot a caller blocks on           |
//! | [`RpcClient`]     | Sends requests, blocks for replies with a deadline  |
//! | [`RpcServer`]     | Runs a [`RequestHandler`] per request, replies      |
//!
//! Late replies (after the caller's deadline) and duplicate replies are
//! discarded by the correlator; they never panic the consumer thread and
//! never wake the wrong caller.

mod client;
mod correlator;
mod error;
mod server;

pub use client::RpcClient;
pub use correlator::{CorrelationId, PendingCall, ReplySlot, RpcCorrelator};
pub use error::RpcError;
pub use server::{RequestHandler, RpcServer, ShutdownHandle};
