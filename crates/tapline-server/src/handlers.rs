// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP handlers for orders, callbacks, and health.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument};
use uuid::Uuid;

use tapline_core::error::CoreError;
use tapline_core::persistence::Persistence;
use tapline_core::router::CallbackRouter;
use tapline_orders::events::EventBus;
use tapline_orders::store::OrderStore;
use tapline_orders::types::{CallbackOutput, CreateOrderRequest, MenuItem, Order, OrderStatus};
use tapline_orders::{OrderError, OrderOrchestrator};
use tapline_sdk::DurableContext;

/// Tenant recorded on engine instances. A single deployment serves one bar.
const TENANT_ID: &str = "default";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Engine persistence (instances, journal, waits)
    pub persistence: Arc<dyn Persistence>,
    /// Token router resolving callback submissions
    pub router: CallbackRouter,
    /// Order records
    pub store: Arc<dyn OrderStore>,
    /// Domain event fan-out
    pub bus: EventBus,
    /// The workflow
    pub orchestrator: Arc<OrderOrchestrator>,
}

/// Error body shape: `{"error": "...", "code": "..."}`.
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: &'static str,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            code: "INTERNAL_ERROR",
        }
    }

    fn not_found(message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            code,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message, "code": self.code }));
        (self.status, body).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = match &err {
            CoreError::CallbackNotFound { .. } | CoreError::InstanceNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            CoreError::CallbackClosed { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
            code: err.error_code(),
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        error!(error = %err, "Order store failure");
        ApiError::internal(err.to_string())
    }
}

/// Lenient wire shape for order creation: fields may be absent so the
/// workflow's own validation decides the outcome instead of the
/// deserializer.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateOrderBody {
    /// Requesting customer, if supplied
    pub customer_id: Option<String>,
    /// The ordered item, if supplied
    pub item: Option<MenuItem>,
}

impl From<CreateOrderBody> for CreateOrderRequest {
    fn from(body: CreateOrderBody) -> Self {
        CreateOrderRequest {
            customer_id: body.customer_id.unwrap_or_default(),
            item: body.item.unwrap_or(MenuItem {
                id: String::new(),
                name: String::new(),
                price: 0.0,
                description: None,
                category: None,
            }),
        }
    }
}

/// `POST /orders` — accept an order for asynchronous processing.
///
/// Responds immediately with `{orderId, status: "pending"}`; the workflow
/// runs detached from this request. Missing or empty business fields are
/// not rejected here: the workflow's validate step routes them to the
/// cancellation path, so this call still acknowledges with `pending`.
#[instrument(skip(state, body))]
pub async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<CreateOrderBody>,
) -> Json<serde_json::Value> {
    let request = CreateOrderRequest::from(body);
    let order_id = Uuid::new_v4().to_string();
    info!(order_id = %order_id, customer_id = %request.customer_id, "Order received");

    let ctx = DurableContext::new(
        state.persistence.clone(),
        state.router.clone(),
        order_id.clone(),
        TENANT_ID,
    );
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        let outcome = orchestrator.run(&ctx, request).await;
        info!(order_id = %outcome.order_id, status = %outcome.status, "Order workflow finished");
    });

    Json(json!({ "orderId": order_id, "status": OrderStatus::Pending }))
}

/// `GET /orders/{id}` — one order's current snapshot.
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    match state.store.get(&order_id).await? {
        Some(order) => Ok(Json(order)),
        None => Err(ApiError::not_found(
            format!("order not found: {order_id}"),
            "ORDER_NOT_FOUND",
        )),
    }
}

/// `GET /orders` — all orders in open statuses, oldest first.
pub async fn list_open_orders(
    State(state): State<AppState>,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.store.list_open().await?))
}

/// Body of a callback submission.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackSubmission {
    /// The token published with the soliciting event
    pub task_token: String,
    /// The transition the external actor is reporting
    pub output: CallbackOutput,
}

/// Acknowledgment of an applied callback.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackAccepted {
    /// The order whose wait was resolved
    pub order_id: String,
}

/// `POST /callbacks` — resolve whichever wait holds the submitted token.
///
/// Unknown tokens get 404; tokens whose wait already resolved or expired
/// get 409. A late submission never resurrects a cancelled order.
#[instrument(skip(state, submission), fields(token = %submission.task_token))]
pub async fn submit_callback(
    State(state): State<AppState>,
    Json(submission): Json<CallbackSubmission>,
) -> Result<Json<CallbackAccepted>, ApiError> {
    let payload = serde_json::to_vec(&submission.output)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let wait = state.router.submit(&submission.task_token, &payload).await?;
    info!(order_id = %wait.instance_id, status = %submission.output.status, "Callback applied");

    Ok(Json(CallbackAccepted {
        order_id: wait.instance_id,
    }))
}

/// `GET /health` — liveness, a database round trip, and workload gauges.
pub async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .persistence
        .health_check_db()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let active_instances = state
        .persistence
        .count_active_instances()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(json!({
        "status": "ok",
        "activeInstances": active_instances,
        "armedWaiters": state.router.armed_waiters().await,
    })))
}
