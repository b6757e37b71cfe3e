// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Durable execution context for workflow code.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use tapline_core::persistence::{EventRecord, Persistence};
use tapline_core::router::CallbackRouter;

use crate::error::{Result, SdkError};
use crate::types::WaitOptions;

/// Durable execution context handed to workflow code.
///
/// One context exists per execution (per order). It provides the two engine
/// primitives the orchestrator is written against:
///
/// - [`step`](DurableContext::step): effectively-once checkpointed execution
///   of a named unit of work. Replays return the recorded result without
///   re-running the body.
/// - [`wait_for_callback`](DurableContext::wait_for_callback): suspend until
///   an external actor submits a result under the wait's minted token, or
///   the configured timeout elapses.
///
/// # Example
///
/// ```ignore
/// let ctx = DurableContext::new(persistence, router, "order-1", "bar-1");
/// ctx.register().await?;
///
/// let order = ctx.step("validate-order", || async { build_order(&request) }).await?;
///
/// let payload = ctx
///     .wait_for_callback(
///         "wait-for-acceptance",
///         |token| publish_created_event(&order, token),
///         WaitOptions::new(Duration::from_secs(300)),
///     )
///     .await?;
///
/// ctx.completed(&serde_json::to_vec(&outcome)?).await?;
/// ```
pub struct DurableContext {
    persistence: Arc<dyn Persistence>,
    router: CallbackRouter,
    instance_id: String,
    tenant_id: String,
}

impl DurableContext {
    /// Create a context for one execution.
    pub fn new(
        persistence: Arc<dyn Persistence>,
        router: CallbackRouter,
        instance_id: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            persistence,
            router,
            instance_id: instance_id.into(),
            tenant_id: tenant_id.into(),
        }
    }

    /// The execution's instance ID (equal to the order ID).
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// The tenant this execution belongs to.
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Register this execution with the engine and mark it running.
    ///
    /// Idempotent: resuming an existing execution re-registers without
    /// disturbing its journal.
    #[instrument(skip(self), fields(instance_id = %self.instance_id))]
    pub async fn register(&self) -> Result<()> {
        self.persistence
            .register_instance(&self.instance_id, &self.tenant_id)
            .await
            .map_err(|e| SdkError::Registration(e.to_string()))?;

        let started_at = Utc::now();
        self.persistence
            .update_instance_status(&self.instance_id, "running", Some(started_at))
            .await
            .map_err(|e| SdkError::Registration(e.to_string()))?;

        self.insert_event("started", None, None).await?;

        info!("Execution registered");
        Ok(())
    }

    /// Run a named step at most effectively once.
    ///
    /// If the journal already holds a result for `name`, it is returned
    /// without re-running `body`. Otherwise `body` runs, its result is
    /// recorded, and the result is returned. Body errors propagate without
    /// recording anything, so a retried execution re-runs the failed step.
    #[instrument(skip(self, body), fields(instance_id = %self.instance_id, step = %name))]
    pub async fn step<T, F, Fut>(&self, name: &str, body: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(recorded) = self
            .persistence
            .load_checkpoint(&self.instance_id, name)
            .await
            .map_err(|e| SdkError::Checkpoint(e.to_string()))?
        {
            debug!(step = %name, "Journal hit - returning recorded result");
            return Ok(serde_json::from_slice(&recorded.state)?);
        }

        let value = body().await?;

        let state = serde_json::to_vec(&value)?;
        self.persistence
            .save_checkpoint(&self.instance_id, name, &state)
            .await
            .map_err(|e| SdkError::Checkpoint(e.to_string()))?;
        self.persistence
            .update_instance_checkpoint(&self.instance_id, name)
            .await
            .map_err(|e| SdkError::Checkpoint(e.to_string()))?;

        debug!(step = %name, "Step recorded");
        Ok(value)
    }

    /// Suspend until an external callback resolves this wait, or time out.
    ///
    /// The registrar is invoked with the minted token and is responsible for
    /// handing it to whatever external channel will eventually submit the
    /// result. The registrar runs inside the journal so it does not repeat
    /// across resumes; transient registrar failures are retried per
    /// `options.retry` before the wait fails.
    ///
    /// On timeout the wait is expired (late submissions are rejected) and
    /// the call fails with [`SdkError::CallbackTimeout`] - unless a
    /// submission raced the timeout and won, in which case its payload is
    /// returned.
    #[instrument(skip(self, registrar, options), fields(instance_id = %self.instance_id, wait = %name))]
    pub async fn wait_for_callback<F, Fut>(
        &self,
        name: &str,
        registrar: F,
        options: WaitOptions,
    ) -> Result<Vec<u8>>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let result_key = format!("{}.result", name);

        // Resume short-circuit: the wait already resolved in a previous run.
        if let Some(recorded) = self
            .persistence
            .load_checkpoint(&self.instance_id, &result_key)
            .await
            .map_err(|e| SdkError::Checkpoint(e.to_string()))?
        {
            debug!(wait = %name, "Wait already resolved in journal");
            return Ok(recorded.state);
        }

        // Token minted inside a step so it is stable across resumes.
        let token: String = self
            .step(&format!("{}.token", name), || async {
                Ok(Uuid::new_v4().to_string())
            })
            .await?;

        // Arm the in-memory waiter before the token leaves this process, so
        // a submission can never fall between registration and suspension.
        let rx = self.router.arm(&token).await;
        self.persistence
            .open_wait(&self.instance_id, name, &token)
            .await
            .map_err(|e| SdkError::Internal(e.to_string()))?;

        if let Err(e) = self.deliver_token(name, &registrar, &token, &options).await {
            self.router.disarm(&token).await;
            return Err(e);
        }

        // Crash recovery: the resolution may have been persisted while this
        // execution was down.
        if let Some(payload) = self
            .persistence
            .take_wait_result(&self.instance_id, name)
            .await
            .map_err(|e| SdkError::Internal(e.to_string()))?
        {
            debug!(wait = %name, "Wait resolved while execution was down");
            self.router.disarm(&token).await;
            self.record_wait_result(&result_key, &payload).await?;
            return Ok(payload);
        }

        // Suspend. The parked future holds no connection or busy resource;
        // the router push-wakes it when the callback arrives.
        self.persistence
            .update_instance_status(&self.instance_id, "suspended", None)
            .await
            .map_err(|e| SdkError::Internal(e.to_string()))?;
        self.insert_event("suspended", Some(name), None).await?;
        info!(wait = %name, "Execution suspended, waiting for callback");

        let outcome = tokio::time::timeout(options.timeout, rx).await;

        self.persistence
            .update_instance_status(&self.instance_id, "running", None)
            .await
            .map_err(|e| SdkError::Internal(e.to_string()))?;
        self.insert_event("resumed", Some(name), None).await?;

        match outcome {
            Ok(Ok(payload)) => {
                self.record_wait_result(&result_key, &payload).await?;
                info!(wait = %name, "Callback received");
                Ok(payload)
            }
            Ok(Err(_closed)) => {
                // Sender dropped without sending: the waiter was replaced by
                // a re-armed resume. Fall back to the persisted record.
                self.router.disarm(&token).await;
                match self
                    .persistence
                    .take_wait_result(&self.instance_id, name)
                    .await
                    .map_err(|e| SdkError::Internal(e.to_string()))?
                {
                    Some(payload) => {
                        self.record_wait_result(&result_key, &payload).await?;
                        Ok(payload)
                    }
                    None => Err(SdkError::Internal(format!(
                        "wait '{}' channel closed without resolution",
                        name
                    ))),
                }
            }
            Err(_elapsed) => {
                self.router.disarm(&token).await;
                let expired = self
                    .persistence
                    .expire_wait(&token)
                    .await
                    .map_err(|e| SdkError::Internal(e.to_string()))?;

                if !expired {
                    // A submission landed after the timer fired but before the
                    // expiry was persisted; the submitter already observed
                    // success, so the resolution wins.
                    if let Some(payload) = self
                        .persistence
                        .take_wait_result(&self.instance_id, name)
                        .await
                        .map_err(|e| SdkError::Internal(e.to_string()))?
                    {
                        warn!(wait = %name, "Resolution raced timeout and won");
                        self.record_wait_result(&result_key, &payload).await?;
                        return Ok(payload);
                    }
                }

                warn!(wait = %name, "Callback wait timed out");
                Err(SdkError::CallbackTimeout {
                    wait: name.to_string(),
                })
            }
        }
    }

    /// Mark this execution completed with the given output.
    #[instrument(skip(self, output), fields(instance_id = %self.instance_id, output_size = output.len()))]
    pub async fn completed(&self, output: &[u8]) -> Result<()> {
        self.persistence
            .complete_instance(&self.instance_id, Some(output), None)
            .await
            .map_err(|e| SdkError::Internal(e.to_string()))?;

        self.insert_event_payload("completed", None, Some(output.to_vec()))
            .await?;

        info!("Execution completed");
        Ok(())
    }

    /// Mark this execution failed with the given error message.
    #[instrument(skip(self), fields(instance_id = %self.instance_id))]
    pub async fn failed(&self, error: &str) -> Result<()> {
        self.persistence
            .complete_instance(&self.instance_id, None, Some(error))
            .await
            .map_err(|e| SdkError::Internal(e.to_string()))?;

        self.insert_event_payload("failed", None, Some(error.as_bytes().to_vec()))
            .await?;

        info!(error = %error, "Execution failed");
        Ok(())
    }

    /// Run the registrar inside the journal, retrying transient failures.
    async fn deliver_token<F, Fut>(
        &self,
        name: &str,
        registrar: &F,
        token: &str,
        options: &WaitOptions,
    ) -> Result<()>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let notify_key = format!("{}.notify", name);

        if self
            .persistence
            .load_checkpoint(&self.instance_id, &notify_key)
            .await
            .map_err(|e| SdkError::Checkpoint(e.to_string()))?
            .is_some()
        {
            debug!(wait = %name, "Registrar already delivered, skipping");
            return Ok(());
        }

        let mut attempt = 0u32;
        loop {
            match registrar(token.to_string()).await {
                Ok(()) => break,
                Err(e) if attempt < options.retry.max_retries => {
                    attempt += 1;
                    let delay = options.retry.delay_for_attempt(attempt);
                    warn!(
                        wait = %name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Registrar failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        self.persistence
            .save_checkpoint(&self.instance_id, &notify_key, b"{}")
            .await
            .map_err(|e| SdkError::Checkpoint(e.to_string()))?;

        Ok(())
    }

    async fn record_wait_result(&self, result_key: &str, payload: &[u8]) -> Result<()> {
        self.persistence
            .save_checkpoint(&self.instance_id, result_key, payload)
            .await
            .map_err(|e| SdkError::Checkpoint(e.to_string()))?;
        self.persistence
            .update_instance_checkpoint(&self.instance_id, result_key)
            .await
            .map_err(|e| SdkError::Checkpoint(e.to_string()))?;
        Ok(())
    }

    async fn insert_event(
        &self,
        event_type: &str,
        checkpoint_id: Option<&str>,
        subtype: Option<&str>,
    ) -> Result<()> {
        let event = EventRecord {
            id: None,
            instance_id: self.instance_id.clone(),
            event_type: event_type.to_string(),
            checkpoint_id: checkpoint_id.map(str::to_string),
            payload: None,
            created_at: Utc::now(),
            subtype: subtype.map(str::to_string),
        };

        self.persistence
            .insert_event(&event)
            .await
            .map_err(|e| SdkError::Event(e.to_string()))
    }

    async fn insert_event_payload(
        &self,
        event_type: &str,
        checkpoint_id: Option<&str>,
        payload: Option<Vec<u8>>,
    ) -> Result<()> {
        let event = EventRecord {
            id: None,
            instance_id: self.instance_id.clone(),
            event_type: event_type.to_string(),
            checkpoint_id: checkpoint_id.map(str::to_string),
            payload,
            created_at: Utc::now(),
            subtype: None,
        };

        self.persistence
            .insert_event(&event)
            .await
            .map_err(|e| SdkError::Event(e.to_string()))
    }
}
