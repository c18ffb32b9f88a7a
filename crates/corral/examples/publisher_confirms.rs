// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publishes 50k messages under each delivery strategy and prints timings.
//!
//! Run with: `cargo run --release --example publisher_confirms`

use std::sync::Arc;
use std::time::{Duration, Instant};

use corral::config::PublisherConfig;
use corral::transport::{ConfirmMode, MemTransport};
use corral::{ReliablePublisher, Strategy, Transport};

const MESSAGE_COUNT: usize = 50_000;

fn run(label: &str, mode: ConfirmMode, strategy: Strategy) -> corral::Result<()> {
    let transport: Arc<dyn Transport> = Arc::new(MemTransport::with_mode(mode));
    let publisher = ReliablePublisher::new(transport, "demo", PublisherConfig::default())?;

    let bodies = (0..MESSAGE_COUNT).map(|i| i.to_string().into_bytes());
    let started = Instant::now();
    let report = publisher.publish_all(bodies, strategy)?;
    publisher.await_drain(Duration::from_secs(30))?;
    let elapsed = started.elapsed();

    println!(
        "{:<32} {} messages in {:>7.1?} ({} drain waits, all confirmed: {})",
        label,
        report.published,
        elapsed,
        report.drain_waits,
        report.all_confirmed()
    );
    Ok(())
}

fn main() -> corral::Result<()> {
    env_logger::init();

    run(
        "individual (ack each)",
        ConfirmMode::AckEach,
        Strategy::Individual,
    )?;
    run(
        "batched x1000 (ack each)",
        ConfirmMode::AckEach,
        Strategy::Batched(1000),
    )?;
    run(
        "async (cumulative every 500)",
        ConfirmMode::AckCumulative { every: 500 },
        Strategy::Async,
    )?;
    Ok(())
}
