// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime configuration - single source of truth for timeouts and batching.
//!
//! Defaults: a 5 second per-drain confirm deadline, batches of 100, and a
//! 10 second RPC call deadline. All values can be overridden per instance
//! with the builder-style setters, or process-wide via environment variables:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `CORRAL_CONFIRM_TIMEOUT_MS` | [`PublisherConfig::confirm_timeout`] |
//! | `CORRAL_BATCH_SIZE` | [`PublisherConfig::batch_size`] |
//! | `CORRAL_RPC_TIMEOUT_MS` | [`RpcConfig::call_timeout`] |
//!
//! Unparseable values are logged at `warn` and ignored.

use std::time::Duration;

/// Default per-drain confirm deadline (5 s).
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);

/// Default batch size for [`crate::publish::Strategy::Batched`].
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default RPC call deadline (10 s).
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for [`crate::publish::ReliablePublisher`].
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Deadline for each blocking drain wait.
    pub confirm_timeout: Duration,
    /// Default window size for the batched strategy.
    pub batch_size: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl PublisherConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-drain confirm deadline.
    #[must_use]
    pub fn confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    /// Set the batch window size.
    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Defaults with environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_u64("CORRAL_CONFIRM_TIMEOUT_MS") {
            config.confirm_timeout = Duration::from_millis(ms);
        }
        if let Some(size) = env_u64("CORRAL_BATCH_SIZE") {
            config.batch_size = size as usize;
        }
        config
    }
}

/// Configuration for [`crate::rpc::RpcClient`].
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Default deadline for [`crate::rpc::RpcClient::call_default`].
    pub call_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_RPC_TIMEOUT,
        }
    }
}

impl RpcConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default call deadline.
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Defaults with environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_u64("CORRAL_RPC_TIMEOUT_MS") {
            config.call_timeout = Duration::from_millis(ms);
        }
        config
    }
}

/// Read a u64 from the environment, logging and ignoring unparseable values.
fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring unparseable {}={:?}", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publisher_defaults() {
        let config = PublisherConfig::default();
        assert_eq!(config.confirm_timeout, Duration::from_secs(5));
        assert_eq!(config.batch_size, 100);
    }

    #[test]
    fn rpc_defaults() {
        let config = RpcConfig::default();
        assert_eq!(config.call_timeout, Duration::from_secs(10));
    }

    #[test]
    fn builder_setters() {
        let config = PublisherConfig::new()
            .confirm_timeout(Duration::from_millis(250))
            .batch_size(16);
        assert_eq!(config.confirm_timeout, Duration::from_millis(250));
        assert_eq!(config.batch_size, 16);

        let config = RpcConfig::new().call_timeout(Duration::from_secs(1));
        assert_eq!(config.call_timeout, Duration::from_secs(1));
    }

    #[test]
    fn env_override_parses() {
        std::env::set_var("CORRAL_BATCH_SIZE", "42");
        let config = PublisherConfig::from_env();
        assert_eq!(config.batch_size, 42);
        std::env::remove_var("CORRAL_BATCH_SIZE");
    }

    #[test]
    fn env_override_ignores_garbage() {
        std::env::set_var("CORRAL_RPC_TIMEOUT_MS", "not-a-number");
        let config = RpcConfig::from_env();
        assert_eq!(config.call_timeout, DEFAULT_RPC_TIMEOUT);
        std::env::remove_var("CORRAL_RPC_TIMEOUT_MS");
    }
}
