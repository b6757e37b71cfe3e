// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Push-based callback routing.
//!
//! Suspended executions park on a oneshot channel keyed by their wait token.
//! When an external actor submits a result, the router persists the
//! resolution first and then pushes the payload to the parked waiter, so a
//! wait consumes no compute while suspended and no polling is involved.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, oneshot};
use tracing::{debug, instrument, warn};

use crate::error::CoreError;
use crate::persistence::{CallbackWaitRecord, Persistence};

/// Process-wide router from callback tokens to suspended executions.
///
/// Cloning produces a new handle to the same underlying waiter map, so the
/// HTTP layer and the workflow side share one router.
#[derive(Clone)]
pub struct CallbackRouter {
    persistence: Arc<dyn Persistence>,
    waiters: Arc<Mutex<HashMap<String, oneshot::Sender<Vec<u8>>>>>,
}

impl CallbackRouter {
    /// Create a new router backed by the given persistence layer.
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self {
            persistence,
            waiters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Arm an in-memory waiter for the given token.
    ///
    /// Returns the receiver the suspended execution parks on. Re-arming a
    /// token (after a resume) replaces any stale sender.
    pub async fn arm(&self, token: &str) -> oneshot::Receiver<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        let mut waiters = self.waiters.lock().await;
        if waiters.insert(token.to_string(), tx).is_some() {
            debug!(token = %token, "Replaced stale waiter for token");
        }
        rx
    }

    /// Drop the in-memory waiter for a token (wait resolved elsewhere or
    /// timed out).
    pub async fn disarm(&self, token: &str) {
        self.waiters.lock().await.remove(token);
    }

    /// Resolve a wait with an externally submitted payload.
    ///
    /// The resolution is persisted before the in-memory push: if the waiter
    /// is not armed (the execution crashed and has not resumed yet), the
    /// resumed wait picks the payload up from the persisted record instead.
    ///
    /// Unknown tokens fail with `CallbackNotFound`; already resolved or
    /// expired waits fail with `CallbackClosed`.
    #[instrument(skip(self, payload), fields(token = %token, payload_size = payload.len()))]
    pub async fn submit(&self, token: &str, payload: &[u8]) -> Result<CallbackWaitRecord, CoreError> {
        let wait = self.persistence.resolve_wait(token, payload).await?;

        if let Some(tx) = self.waiters.lock().await.remove(token) {
            if tx.send(payload.to_vec()).is_err() {
                // Receiver dropped between resolution and push; the persisted
                // record still carries the payload for the resumed wait.
                warn!(token = %token, "Waiter dropped before push; resolution persisted");
            } else {
                debug!(token = %token, instance_id = %wait.instance_id, "Callback pushed to waiter");
            }
        } else {
            debug!(token = %token, "No armed waiter; resolution persisted for resume");
        }

        Ok(wait)
    }

    /// Number of currently armed waiters. Intended for health reporting.
    pub async fn armed_waiters(&self) -> usize {
        self.waiters.lock().await.len()
    }
}
