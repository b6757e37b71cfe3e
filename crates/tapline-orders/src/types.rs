// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Order domain types.
//!
//! Wire field names are camelCase to match the published event contract
//! consumed by the kiosk, mobile, and barman frontends.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// Lifecycle status of an order.
///
/// Transitions follow a strict total order (`pending -> accepted -> ready ->
/// completed`) with two terminal escape hatches: `rejected` (admission
/// control, from `pending` only, never persisted) and `cancelled` (timeout or
/// error, from any non-terminal state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created, waiting for a bartender to accept
    Pending,
    /// A bartender accepted and is preparing the order
    Accepted,
    /// Prepared, waiting for pickup
    Ready,
    /// Picked up; terminal success
    Completed,
    /// Timed out or failed; terminal
    Cancelled,
    /// Refused at admission; terminal, never persisted
    Rejected,
}

impl OrderStatus {
    /// Canonical lowercase string form, as persisted and published.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
        }
    }

    /// Whether no further transitions follow this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    /// Whether the order still occupies the workflow (pending/accepted/ready).
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "accepted" => Ok(OrderStatus::Accepted),
            "ready" => Ok(OrderStatus::Ready),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "rejected" => Ok(OrderStatus::Rejected),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

/// Denormalized snapshot of an ordered menu item.
///
/// Copied into the order at creation time, not a live reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    /// Menu item identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Price at order time
    pub price: f64,
    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// The central order entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Order identifier, equal to the inbound request's correlation id
    pub id: String,
    /// Requesting customer
    pub customer_id: String,
    /// Fulfilling bartender; set at the first `accepted` transition and
    /// unchanged afterwards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bartender_id: Option<String>,
    /// Current lifecycle status
    pub status: OrderStatus,
    /// Menu item snapshot
    pub item: MenuItem,
    /// Creation time; immutable
    pub created_at: DateTime<Utc>,
    /// Refreshed on every status transition
    pub updated_at: DateTime<Utc>,
}

/// Inbound order creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Requesting customer
    pub customer_id: String,
    /// The item being ordered
    pub item: MenuItem,
}

/// Payload submitted by an external actor to resolve a callback wait.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackOutput {
    /// The status the actor is moving the order to
    pub status: OrderStatus,
    /// The accepting bartender, present on the acceptance callback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bartender_id: Option<String>,
}

/// Terminal result of one orchestration, always success-shaped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderOutcome {
    /// The order this execution drove
    pub order_id: String,
    /// Terminal status reached
    pub status: OrderStatus,
}

/// Detail payload of a published domain event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEventDetail {
    /// Order identifier, unchanged throughout the order's life
    pub order_id: String,
    /// Requesting customer
    pub customer_id: String,
    /// Status at publish time
    pub status: OrderStatus,
    /// Menu item snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<MenuItem>,
    /// Fulfilling bartender, once known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bartender_id: Option<String>,
    /// Callback token for events that solicit a response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_token: Option<String>,
    /// Human-readable reason on rejection/cancellation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl OrderEventDetail {
    /// Detail snapshot of an order with no optional fields set.
    pub fn for_order(order: &Order) -> Self {
        Self {
            order_id: order.id.clone(),
            customer_id: order.customer_id.clone(),
            status: order.status,
            item: Some(order.item.clone()),
            bartender_id: order.bartender_id.clone(),
            task_token: None,
            reason: None,
        }
    }
}
