// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! High-level types for the SDK.

use std::time::Duration;

/// Retry strategy for registrar delivery.
///
/// Determines how delay between retry attempts is calculated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryStrategy {
    /// Exponential backoff: delay * 2^(attempt-1)
    ///
    /// First retry: delay * 1
    /// Second retry: delay * 2
    /// Third retry: delay * 4
    #[default]
    ExponentialBackoff,
}

/// Configuration for registrar retry behavior in callback waits.
///
/// The registrar hands the minted token to the external channel that will
/// eventually deliver the callback; transient delivery failures are retried
/// up to `max_retries` times before the wait itself fails.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries, just one attempt).
    pub max_retries: u32,
    /// Base delay between retries in milliseconds.
    pub delay_ms: u64,
    /// Retry strategy for calculating delays.
    pub strategy: RetryStrategy,
}

impl RetryConfig {
    /// Create a new retry configuration.
    pub fn new(max_retries: u32, delay_ms: u64, strategy: RetryStrategy) -> Self {
        Self {
            max_retries,
            delay_ms,
            strategy,
        }
    }

    /// Calculate delay for a given attempt (1-indexed).
    ///
    /// Attempt 1 is the first retry (after the initial failure).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = match self.strategy {
            RetryStrategy::ExponentialBackoff => 2u64.saturating_pow(attempt.saturating_sub(1)),
        };
        Duration::from_millis(self.delay_ms.saturating_mul(multiplier))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_ms: 1000,
            strategy: RetryStrategy::default(),
        }
    }
}

/// Options for a callback wait.
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// How long the wait may stay pending before it fails with a timeout.
    pub timeout: Duration,
    /// Retry policy for the registrar side effect.
    pub retry: RetryConfig,
}

impl WaitOptions {
    /// Create wait options with the given timeout and default registrar retry.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            retry: RetryConfig::default(),
        }
    }

    /// Override the registrar retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}
