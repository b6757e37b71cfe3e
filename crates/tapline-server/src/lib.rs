// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! # Tapline Server
//!
//! HTTP surface over the order workflow:
//!
//! - `POST /orders` — accept an order, respond `{orderId, status: "pending"}`
//!   immediately, run the orchestration detached
//! - `GET /orders/{id}` — order snapshot
//! - `GET /orders` — open orders
//! - `POST /callbacks` — resolve a pending wait with a bartender/customer
//!   response
//! - `GET /health` — liveness + database round trip
//!
//! Domain events additionally fan out on the in-process broadcast bus for
//! push consumers.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod handlers;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

pub use handlers::AppState;

/// Build the application router over the shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(handlers::create_order).get(handlers::list_open_orders))
        .route("/orders/{id}", get(handlers::get_order))
        .route("/callbacks", post(handlers::submit_callback))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
