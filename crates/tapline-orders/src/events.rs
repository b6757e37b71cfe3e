// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain event publication.
//!
//! Events are fire-and-forget: the workflow only cares whether the enqueue
//! succeeded. Consumers (notification fan-out, dashboards) subscribe to the
//! broadcast bus and are expected to be idempotent per (orderId, status).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::Result;
use crate::types::OrderEventDetail;

/// A typed domain event as it appears on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    /// Event type: OrderCreated, OrderAccepted, OrderReadyForPickup,
    /// OrderCompleted, OrderRejected, OrderCancelled
    pub event_type: String,
    /// Publish time
    pub timestamp: DateTime<Utc>,
    /// The transition details
    #[serde(flatten)]
    pub detail: OrderEventDetail,
}

/// Fire-and-forget emission of typed domain events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event. At-least-once delivery is assumed by consumers.
    async fn publish(&self, detail_type: &str, detail: OrderEventDetail) -> Result<()>;
}

/// Broadcast-based event bus fanning events out to all subscribers.
///
/// Cloning creates a new handle to the same underlying channel, so the
/// orchestrator and the HTTP layer share one bus.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<OrderEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity. Slow subscribers lag
    /// and drop old events once the buffer fills.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, detail_type: &str, detail: OrderEventDetail) -> Result<()> {
        let event = OrderEvent {
            event_type: detail_type.to_string(),
            timestamp: Utc::now(),
            detail,
        };

        // A send error only means no subscriber is currently listening,
        // which is not a failure for a fire-and-forget publisher.
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(event_type = %detail_type, receivers, "Event published");
            }
            Err(_) => {
                debug!(event_type = %detail_type, "Event published with no subscribers");
            }
        }

        Ok(())
    }
}
