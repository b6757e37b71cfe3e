// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Order-domain error types.

use thiserror::Error;

/// Errors from the order store, event publisher, and lifecycle logic.
#[derive(Debug, Error)]
pub enum OrderError {
    /// A creation request is missing required fields
    #[error("validation failed: {0}")]
    Validation(String),

    /// An order store operation failed
    #[error("order store error during {operation}: {details}")]
    Store {
        /// The operation that failed
        operation: &'static str,
        /// Details of the failure
        details: String,
    },

    /// A persisted status string did not map to a known status
    #[error("unknown order status '{0}'")]
    UnknownStatus(String),

    /// Publishing a domain event failed
    #[error("event publish failed: {0}")]
    Publish(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for OrderError {
    fn from(err: serde_json::Error) -> Self {
        OrderError::Serialization(err.to_string())
    }
}

/// Type alias for order-domain results.
pub type Result<T> = std::result::Result<T, OrderError>;
