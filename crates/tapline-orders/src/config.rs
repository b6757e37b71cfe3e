// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Order workflow configuration.

use std::time::Duration;

use tapline_core::config::ConfigError;

/// Tunables for the order workflow.
#[derive(Debug, Clone)]
pub struct OrdersConfig {
    /// Maximum number of concurrently accepted orders
    pub capacity_ceiling: i64,
    /// wait-for-acceptance timeout
    pub accept_timeout: Duration,
    /// wait-for-ready timeout
    pub ready_timeout: Duration,
    /// wait-for-completion timeout
    pub pickup_timeout: Duration,
}

impl OrdersConfig {
    /// Load from environment variables, all optional:
    ///
    /// - `TAPLINE_CAPACITY_CEILING`: max concurrently accepted orders (default: 5)
    /// - `TAPLINE_ACCEPT_TIMEOUT_SECS`: acceptance wait timeout (default: 300)
    /// - `TAPLINE_READY_TIMEOUT_SECS`: ready wait timeout (default: 300)
    /// - `TAPLINE_PICKUP_TIMEOUT_SECS`: pickup wait timeout (default: 600)
    pub fn from_env() -> Result<Self, ConfigError> {
        let capacity_ceiling = env_i64("TAPLINE_CAPACITY_CEILING", 5)?;
        let accept_timeout = env_secs("TAPLINE_ACCEPT_TIMEOUT_SECS", 300)?;
        let ready_timeout = env_secs("TAPLINE_READY_TIMEOUT_SECS", 300)?;
        let pickup_timeout = env_secs("TAPLINE_PICKUP_TIMEOUT_SECS", 600)?;

        Ok(Self {
            capacity_ceiling,
            accept_timeout,
            ready_timeout,
            pickup_timeout,
        })
    }
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            capacity_ceiling: 5,
            accept_timeout: Duration::from_secs(300),
            ready_timeout: Duration::from_secs(300),
            pickup_timeout: Duration::from_secs(600),
        }
    }
}

fn env_i64(key: &'static str, default: i64) -> Result<i64, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid(key, "must be an integer")),
        Err(_) => Ok(default),
    }
}

fn env_secs(key: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::Invalid(key, "must be a number of seconds")),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}
