// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The order lifecycle workflow.
//!
//! One orchestration execution exists per order and is that order's only
//! writer. The workflow drives the order through
//! `pending -> accepted -> ready -> completed`, suspending at each human
//! response point, with two terminal escapes: `rejected` at admission and
//! `cancelled` on any error or wait timeout.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use tapline_sdk::{DurableContext, SdkError, WaitOptions};

use crate::config::OrdersConfig;
use crate::error::OrderError;
use crate::events::EventPublisher;
use crate::store::OrderStore;
use crate::types::{
    CallbackOutput, CreateOrderRequest, Order, OrderEventDetail, OrderOutcome, OrderStatus,
};

/// Admission rejection reason published to the customer.
const REJECTION_REASON: &str = "No available bartender capacity";
/// Cancellation reason when a wait timed out.
const TIMEOUT_REASON: &str = "Timeout waiting for response";

/// Drives one order from creation to a terminal status.
pub struct OrderOrchestrator {
    store: Arc<dyn OrderStore>,
    events: Arc<dyn EventPublisher>,
    config: OrdersConfig,
}

impl OrderOrchestrator {
    /// Create an orchestrator sharing the process-wide store and bus handles.
    pub fn new(
        store: Arc<dyn OrderStore>,
        events: Arc<dyn EventPublisher>,
        config: OrdersConfig,
    ) -> Self {
        Self {
            store,
            events,
            config,
        }
    }

    /// Run the whole lifecycle for one order.
    ///
    /// Never fails: every internal error or timeout is absorbed into the
    /// cancellation path and the returned outcome always carries a terminal
    /// status. The caller already received its `pending` acknowledgment and
    /// tracks progress via the event stream, not this return value.
    #[instrument(skip(self, ctx, request), fields(order_id = %ctx.instance_id()))]
    pub async fn run(&self, ctx: &DurableContext, request: CreateOrderRequest) -> OrderOutcome {
        let outcome = match ctx.register().await {
            Ok(()) => match self.drive(ctx, &request).await {
                Ok(outcome) => outcome,
                Err(err) => self.cancel(ctx, &request, err).await,
            },
            Err(err) => self.cancel(ctx, &request, err).await,
        };

        match serde_json::to_vec(&outcome) {
            Ok(bytes) => {
                if let Err(err) = ctx.completed(&bytes).await {
                    warn!(error = %err, "Failed to record terminal instance state");
                }
            }
            Err(err) => warn!(error = %err, "Failed to serialize outcome"),
        }

        outcome
    }

    /// The happy path plus the admission-rejection exit. Any error here lands
    /// in [`cancel`](Self::cancel).
    async fn drive(
        &self,
        ctx: &DurableContext,
        request: &CreateOrderRequest,
    ) -> Result<OrderOutcome, SdkError> {
        let mut order = ctx
            .step("validate-order", || async {
                validate(ctx.instance_id(), request).map_err(step_err)
            })
            .await?;

        let has_capacity = ctx
            .step("check-capacity", || async {
                // Read-then-act without a lock: two concurrent admissions can
                // both read below the ceiling. Known limitation.
                let accepted = self
                    .store
                    .count_by_status(OrderStatus::Accepted)
                    .await
                    .map_err(step_err)?;
                info!(accepted, ceiling = self.config.capacity_ceiling, "Open orders count");
                Ok(accepted < self.config.capacity_ceiling)
            })
            .await?;

        if !has_capacity {
            // Rejection is a normal exit: the record is never persisted.
            order.status = OrderStatus::Rejected;
            let mut detail = OrderEventDetail::for_order(&order);
            detail.reason = Some(REJECTION_REASON.to_string());
            self.events
                .publish("OrderRejected", detail)
                .await
                .map_err(|e| SdkError::Event(e.to_string()))?;

            return Ok(OrderOutcome {
                order_id: order.id,
                status: OrderStatus::Rejected,
            });
        }

        ctx.step("create-order", || async {
            self.store.put(&order).await.map_err(step_err)
        })
        .await?;

        let accepted = self
            .await_transition(ctx, "wait-for-acceptance", "OrderCreated", &order, self.config.accept_timeout)
            .await?;
        apply_transition(&mut order, &accepted);
        ctx.step("order-accepted", || async {
            info!(status = %accepted.status, bartender_id = ?accepted.bartender_id, "Updating order status");
            self.store
                .update_status(&order.id, accepted.status, accepted.bartender_id.as_deref())
                .await
                .map_err(step_err)
        })
        .await?;

        let ready = self
            .await_transition(ctx, "wait-for-ready", "OrderAccepted", &order, self.config.ready_timeout)
            .await?;
        apply_transition(&mut order, &ready);
        ctx.step("order-ready", || async {
            info!(status = %ready.status, "Updating order status");
            // The bartender recorded at acceptance is authoritative; a later
            // callback cannot reassign the order.
            self.store
                .update_status(&order.id, ready.status, order.bartender_id.as_deref())
                .await
                .map_err(step_err)
        })
        .await?;

        let completed = self
            .await_transition(ctx, "wait-for-completion", "OrderReadyForPickup", &order, self.config.pickup_timeout)
            .await?;
        apply_transition(&mut order, &completed);
        ctx.step("order-completed", || async {
            self.store
                .update_status(&order.id, completed.status, order.bartender_id.as_deref())
                .await
                .map_err(step_err)?;

            self.events
                .publish("OrderCompleted", OrderEventDetail::for_order(&order))
                .await
                .map_err(|e| SdkError::Event(e.to_string()))
        })
        .await?;

        info!("Order completed");
        Ok(OrderOutcome {
            order_id: order.id,
            status: OrderStatus::Completed,
        })
    }

    /// Open a callback wait whose registrar publishes the given event with
    /// the minted token, then parse the submitted payload.
    async fn await_transition(
        &self,
        ctx: &DurableContext,
        wait: &str,
        event_type: &str,
        order: &Order,
        timeout: std::time::Duration,
    ) -> Result<CallbackOutput, SdkError> {
        let events = Arc::clone(&self.events);
        let detail_base = OrderEventDetail::for_order(order);
        let event_type_owned = event_type.to_string();

        let payload = ctx
            .wait_for_callback(
                wait,
                move |token| {
                    let events = Arc::clone(&events);
                    let event_type = event_type_owned.clone();
                    let mut detail = detail_base.clone();
                    detail.task_token = Some(token);
                    async move {
                        events
                            .publish(&event_type, detail)
                            .await
                            .map_err(|e| SdkError::Event(e.to_string()))
                    }
                },
                WaitOptions::new(timeout),
            )
            .await?;

        let output: CallbackOutput = serde_json::from_slice(&payload)?;
        info!(wait = %wait, status = %output.status, "Callback received");
        Ok(output)
    }

    /// The cancellation path: force the persisted status to `cancelled`
    /// (skipped if the order was never created), publish `OrderCancelled`,
    /// and return a success-shaped outcome.
    async fn cancel(
        &self,
        ctx: &DurableContext,
        request: &CreateOrderRequest,
        err: SdkError,
    ) -> OrderOutcome {
        let order_id = ctx.instance_id().to_string();
        warn!(error = %err, "Order workflow failed, cancelling");

        match self.store.get(&order_id).await {
            Ok(Some(_)) => {
                if let Err(e) = self
                    .store
                    .update_status(&order_id, OrderStatus::Cancelled, None)
                    .await
                {
                    warn!(error = %e, "Best-effort cancellation update failed");
                }
            }
            Ok(None) => {
                // Never persisted (failed before create-order); nothing to
                // update.
            }
            Err(e) => warn!(error = %e, "Could not check order record during cancellation"),
        }

        let reason = if err.is_timeout() {
            TIMEOUT_REASON.to_string()
        } else {
            err.to_string()
        };

        let detail = OrderEventDetail {
            order_id: order_id.clone(),
            customer_id: request.customer_id.clone(),
            status: OrderStatus::Cancelled,
            item: Some(request.item.clone()),
            bartender_id: None,
            task_token: None,
            reason: Some(reason),
        };
        if let Err(e) = self.events.publish("OrderCancelled", detail).await {
            warn!(error = %e, "Failed to publish cancellation event");
        }

        OrderOutcome {
            order_id,
            status: OrderStatus::Cancelled,
        }
    }
}

/// Pure request check; builds the in-memory order with the correlation id as
/// its id so the customer can subscribe to status updates immediately.
fn validate(order_id: &str, request: &CreateOrderRequest) -> Result<Order, OrderError> {
    if order_id.is_empty() {
        return Err(OrderError::Validation("order correlation id is required".into()));
    }
    if request.customer_id.is_empty() {
        return Err(OrderError::Validation("customerId is required".into()));
    }
    if request.item.id.is_empty() || request.item.name.is_empty() {
        return Err(OrderError::Validation("item id and name are required".into()));
    }

    let now = Utc::now();
    Ok(Order {
        id: order_id.to_string(),
        customer_id: request.customer_id.clone(),
        bartender_id: None,
        status: OrderStatus::Pending,
        item: request.item.clone(),
        created_at: now,
        updated_at: now,
    })
}

/// Reflect a submitted transition in the in-memory order so later events
/// carry the bartender. `bartender_id`, once set, is never overwritten.
fn apply_transition(order: &mut Order, output: &CallbackOutput) {
    order.status = output.status;
    if order.bartender_id.is_none() {
        order.bartender_id = output.bartender_id.clone();
    }
    order.updated_at = Utc::now();
}

fn step_err(err: OrderError) -> SdkError {
    SdkError::Step(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MenuItem;

    fn request() -> CreateOrderRequest {
        CreateOrderRequest {
            customer_id: "c-1".into(),
            item: MenuItem {
                id: "i-1".into(),
                name: "Mojito".into(),
                price: 10.0,
                description: None,
                category: None,
            },
        }
    }

    #[test]
    fn test_validate_builds_pending_order() {
        let order = validate("o-1", &request()).unwrap();
        assert_eq!(order.id, "o-1");
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.bartender_id.is_none());
        assert_eq!(order.created_at, order.updated_at);
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let mut bad = request();
        bad.customer_id = String::new();
        assert!(matches!(
            validate("o-1", &bad),
            Err(OrderError::Validation(_))
        ));

        let mut bad = request();
        bad.item.name = String::new();
        assert!(validate("o-1", &bad).is_err());

        assert!(validate("", &request()).is_err());
    }

    #[test]
    fn test_apply_transition_keeps_first_bartender() {
        let mut order = validate("o-1", &request()).unwrap();

        apply_transition(
            &mut order,
            &CallbackOutput {
                status: OrderStatus::Accepted,
                bartender_id: Some("b-1".into()),
            },
        );
        assert_eq!(order.status, OrderStatus::Accepted);
        assert_eq!(order.bartender_id.as_deref(), Some("b-1"));

        apply_transition(
            &mut order,
            &CallbackOutput {
                status: OrderStatus::Ready,
                bartender_id: Some("b-2".into()),
            },
        );
        assert_eq!(order.status, OrderStatus::Ready);
        assert_eq!(order.bartender_id.as_deref(), Some("b-1"));
    }
}
