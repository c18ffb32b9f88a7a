// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reliable publishing strategies.
//!
//! [`ReliablePublisher`] couples a [`Transport`](crate::transport::Transport)
//! with a [`ConfirmTracker`](crate::confirm::ConfirmTracker) and offers three
//! ways to trade latency against failure attribution:
//!
//! | Strategy              | Blocks                    | Failure attribution |
//! |-----------------------|---------------------------|---------------------|
//! | [`Strategy::Individual`] | after every message    | exact               |
//! | [`Strategy::Batched`]    | after every window     | window-level        |
//! | [`Strategy::Async`]      | once at the end        | run-level           |
//!
//! Whatever the strategy, a failed run never loses payloads: the
//! [`PublishReport`] carries every rejected and unconfirmed message so the
//! caller can republish.

mod publisher;

pub use publisher::{PublishReport, ReliablePublisher, Strategy};
