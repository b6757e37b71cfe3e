// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tapline Core - Durable Execution Engine
//!
//! This crate provides the execution engine for durable order workflows. It
//! manages the step journal, callback waits, and instance lifecycle records,
//! persisting all state to SQLite for crash resilience.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      tapline-server                         │
//! │        (HTTP API: orders, callbacks, queries, health)       │
//! └─────────────────────────────────────────────────────────────┘
//!          │                                        │
//!          │ spawns executions                      │ submits callbacks
//!          ▼                                        ▼
//! ┌───────────────────────┐             ┌───────────────────────┐
//! │  Workflow Executions  │◄────────────│    CallbackRouter     │
//! │  (via tapline-sdk)    │  push-wake  │    (this crate)       │
//! └───────────┬───────────┘             └───────────┬───────────┘
//!             │                                     │
//!             ▼                                     ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Persistence                           │
//! │   instances / checkpoints / instance_events / callback_waits │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Checkpoint Semantics
//!
//! The step journal is the primary durability mechanism:
//!
//! 1. **First save under a checkpoint_id**: records the state.
//! 2. **Replays with the same checkpoint_id**: return the recorded state;
//!    the journal is insert-or-ignore, so a replay can never overwrite.
//!
//! # Callback Waits
//!
//! A suspension point is represented by a `callback_waits` row keyed by a
//! minted token. The suspended execution parks on an in-memory oneshot
//! channel registered with [`router::CallbackRouter`]; an external submission
//! persists the resolution and push-wakes the waiter. Waits that time out
//! are expired; late submissions to an expired wait are rejected.
//!
//! # Instance Status State Machine
//!
//! ```text
//!     ┌─────────┐  register   ┌─────────┐
//!     │ PENDING │────────────►│ RUNNING │◄──────────┐
//!     └─────────┘             └────┬────┘           │
//!                                  │ wait           │ callback
//!                                  ▼                │
//!                             ┌───────────┐         │
//!                             │ SUSPENDED │─────────┘
//!                             └───────────┘
//!           RUNNING ──complete──► COMPLETED
//!           RUNNING ──fail──────► FAILED
//! ```
//!
//! # Modules
//!
//! - [`config`]: Engine configuration from environment variables
//! - [`error`]: Error types with stable error-code mapping
//! - [`persistence`]: SQLite persistence for instances, journal, events, waits
//! - [`router`]: Push-based callback routing to suspended executions

#![deny(missing_docs)]

/// Engine configuration loaded from environment variables.
pub mod config;

/// Error types for engine operations with error-code mapping.
pub mod error;

/// Persistence abstraction and SQLite backend.
pub mod persistence;

/// Push-based callback routing.
pub mod router;

pub use error::CoreError;
pub use router::CallbackRouter;
