// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! # Tapline Orders
//!
//! The bar-order lifecycle built on the tapline durable execution engine.
//!
//! An order moves through `pending -> accepted -> ready -> completed`,
//! pausing at each human response point (bartender accepts, drink ready,
//! customer picks up) as a durable callback wait. Admission control caps
//! the number of concurrently accepted orders; orders over the ceiling are
//! rejected outright, not queued. Timeouts and errors route to a
//! cancellation path that still reports a clean, status-bearing outcome.
//!
//! Modules:
//!
//! - [`types`]: order entity, statuses, event details, wire payloads
//! - [`store`]: [`store::OrderStore`] trait + SQLite implementation
//! - [`events`]: [`events::EventPublisher`] trait + broadcast bus
//! - [`orchestrator`]: the workflow itself
//! - [`config`]: capacity ceiling and wait timeouts

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod store;
pub mod types;

pub use config::OrdersConfig;
pub use error::OrderError;
pub use events::{EventBus, EventPublisher, OrderEvent};
pub use orchestrator::OrderOrchestrator;
pub use store::{OrderStore, SqliteOrderStore};
pub use types::{
    CallbackOutput, CreateOrderRequest, MenuItem, Order, OrderEventDetail, OrderOutcome,
    OrderStatus,
};
