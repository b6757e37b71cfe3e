// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SDK-specific error types.

use thiserror::Error;

/// Errors that can occur in the SDK.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Registration with the engine failed
    #[error("registration failed: {0}")]
    Registration(String),

    /// Checkpoint operation failed
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// A step body failed
    #[error("step error: {0}")]
    Step(String),

    /// Event recording failed
    #[error("event error: {0}")]
    Event(String),

    /// A callback wait exceeded its timeout
    #[error("callback wait '{wait}' timed out")]
    CallbackTimeout {
        /// Name of the wait that timed out
        wait: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal SDK error
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

impl SdkError {
    /// Whether this error is a callback-wait timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SdkError::CallbackTimeout { .. })
    }
}

/// Type alias for SDK results.
pub type Result<T> = std::result::Result<T, SdkError>;
