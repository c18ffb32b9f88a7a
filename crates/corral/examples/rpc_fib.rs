// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fibonacci RPC service over the in-process transport.
//!
//! Run with: `cargo run --example rpc_fib`

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use corral::config::RpcConfig;
use corral::rpc::RpcError;
use corral::transport::MemTransport;
use corral::{RpcClient, RpcServer, Transport};

// Deliberately naive: a slow handler makes the blocking-call latency visible.
fn fib(n: u64) -> u64 {
    if n < 2 {
        n
    } else {
        fib(n - 1) + fib(n - 2)
    }
}

fn main() {
    env_logger::init();

    let transport: Arc<dyn Transport> = Arc::new(MemTransport::new());

    let server = Arc::new(RpcServer::new(Arc::clone(&transport), "rpc.fib"));
    let serving = Arc::clone(&server);
    let server_thread = thread::spawn(move || {
        serving
            .serve(|payload: &[u8]| {
                let n: u64 = std::str::from_utf8(payload)
                    .map_err(|e| RpcError::MalformedRequest(e.to_string()))?
                    .trim()
                    .parse()
                    .map_err(|_| RpcError::MalformedRequest("expected a number".to_string()))?;
                Ok(fib(n).to_string().into_bytes())
            })
            .expect("serve");
    });
    thread::sleep(Duration::from_millis(50));

    let client = RpcClient::new(transport, "rpc.fib", RpcConfig::default());
    for n in 0..=30u64 {
        match client.call_default(n.to_string().as_bytes()) {
            Ok(reply) => println!(
                "fib({}) = {}",
                n,
                String::from_utf8_lossy(&reply)
            ),
            Err(e) => eprintln!("fib({}) failed: {}", n, e),
        }
    }

    server.shutdown();
    server_thread.join().expect("server thread");
}
