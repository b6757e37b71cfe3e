// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! # Tapline SDK
//!
//! Workflow-facing SDK for the tapline durable execution engine.
//!
//! Workflow code is written against a [`DurableContext`], which provides two
//! primitives:
//!
//! - **Steps**: named units of work recorded in a per-execution journal.
//!   A step body runs at most effectively once; resumes return the recorded
//!   result instead of re-running it.
//! - **Callback waits**: suspend the execution until an external actor
//!   submits a result under a minted token, or a timeout elapses. Suspended
//!   executions consume no compute; the engine push-wakes them.
//!
//! ## Usage
//!
//! ```ignore
//! use std::time::Duration;
//! use tapline_sdk::{DurableContext, WaitOptions};
//!
//! let ctx = DurableContext::new(persistence, router, order_id, tenant_id);
//! ctx.register().await?;
//!
//! let order = ctx.step("create-order", || async { store.put(&order).await }).await?;
//!
//! let payload = ctx
//!     .wait_for_callback(
//!         "wait-for-acceptance",
//!         |token| events.publish_created(&order, token),
//!         WaitOptions::new(Duration::from_secs(300)),
//!     )
//!     .await?;
//!
//! ctx.completed(&output).await?;
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod context;
pub mod error;
pub mod types;

pub use context::DurableContext;
pub use error::{Result, SdkError};
pub use types::{RetryConfig, RetryStrategy, WaitOptions};

// Workflow code needs these to wire a context up.
pub use tapline_core::persistence::Persistence;
pub use tapline_core::router::CallbackRouter;
