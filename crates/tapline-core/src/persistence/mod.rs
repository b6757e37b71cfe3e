//! Persistence interfaces and backends for tapline-core.
//!
//! This module defines the persistence abstraction and backend implementations.

pub mod sqlite;

pub use self::sqlite::SqlitePersistence;

use crate::error::CoreError;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Instance record from the persistence layer.
///
/// One instance corresponds to one workflow execution (one order).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InstanceRecord {
    /// Unique identifier for the instance.
    pub instance_id: String,
    /// Tenant identifier for multi-tenancy isolation.
    pub tenant_id: String,
    /// Current status (pending, running, suspended, completed, failed).
    pub status: String,
    /// Last checkpoint ID if the instance was checkpointed.
    pub checkpoint_id: Option<String>,
    /// When the instance was created.
    pub created_at: DateTime<Utc>,
    /// When the instance started running.
    pub started_at: Option<DateTime<Utc>>,
    /// When the instance finished (completed or failed).
    pub finished_at: Option<DateTime<Utc>>,
    /// Output data from successful completion.
    pub output: Option<Vec<u8>>,
    /// Error message from failure.
    pub error: Option<String>,
}

/// Checkpoint record from the step journal.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CheckpointRecord {
    /// Database primary key.
    pub id: i64,
    /// Instance this checkpoint belongs to.
    pub instance_id: String,
    /// Unique checkpoint identifier within the instance.
    pub checkpoint_id: String,
    /// Serialized state data.
    pub state: Vec<u8>,
    /// When the checkpoint was created.
    pub created_at: DateTime<Utc>,
}

/// Event record from the audit log.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRecord {
    /// Database primary key (None when inserting new events).
    #[sqlx(default)]
    pub id: Option<i64>,
    /// Instance this event belongs to.
    pub instance_id: String,
    /// Type of event (started, suspended, resumed, completed, failed, custom).
    pub event_type: String,
    /// Associated checkpoint ID if applicable.
    pub checkpoint_id: Option<String>,
    /// Optional event payload data.
    pub payload: Option<Vec<u8>>,
    /// When the event occurred.
    pub created_at: DateTime<Utc>,
    /// Arbitrary subtype for custom events.
    pub subtype: Option<String>,
}

/// Callback wait record.
///
/// A wait is opened under a minted token before the execution suspends.
/// Status transitions are one-way: pending -> resolved (external submission)
/// or pending -> expired (timeout).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CallbackWaitRecord {
    /// The minted token identifying this wait.
    pub token: String,
    /// Instance that is suspended on this wait.
    pub instance_id: String,
    /// Wait key within the instance (the wait's checkpoint name).
    pub checkpoint_id: String,
    /// Wait status (pending, resolved, expired).
    pub status: String,
    /// Submitted payload once resolved.
    pub payload: Option<Vec<u8>>,
    /// When the wait was opened.
    pub created_at: DateTime<Utc>,
    /// When the wait was resolved or expired.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Persistence interface used by the engine and SDK.
#[allow(missing_docs)]
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn register_instance(&self, instance_id: &str, tenant_id: &str) -> Result<(), CoreError>;

    async fn get_instance(&self, instance_id: &str) -> Result<Option<InstanceRecord>, CoreError>;

    async fn update_instance_status(
        &self,
        instance_id: &str,
        status: &str,
        started_at: Option<DateTime<Utc>>,
    ) -> Result<(), CoreError>;

    async fn update_instance_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
    ) -> Result<(), CoreError>;

    /// Mark an instance terminal: failed when `error` is set, completed
    /// otherwise. Fails with `InstanceNotFound` for unregistered instances.
    async fn complete_instance(
        &self,
        instance_id: &str,
        output: Option<&[u8]>,
        error: Option<&str>,
    ) -> Result<(), CoreError>;

    /// Record a step result in the journal.
    ///
    /// The journal is append-only per (instance_id, checkpoint_id): a replay
    /// that races a crash after execution must not overwrite the first
    /// recorded state, so implementations use insert-or-ignore semantics.
    async fn save_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
        state: &[u8],
    ) -> Result<(), CoreError>;

    async fn load_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<CheckpointRecord>, CoreError>;

    async fn insert_event(&self, event: &EventRecord) -> Result<(), CoreError>;

    /// List audit events for an instance, oldest first.
    async fn list_events(
        &self,
        instance_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EventRecord>, CoreError>;

    /// Open a callback wait under the given token.
    ///
    /// Idempotent: re-opening an existing wait for the same
    /// (instance_id, checkpoint_id) is a no-op, so a resumed execution can
    /// re-arm its wait without disturbing a resolution that raced it.
    async fn open_wait(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
        token: &str,
    ) -> Result<(), CoreError>;

    async fn get_wait(&self, token: &str) -> Result<Option<CallbackWaitRecord>, CoreError>;

    /// Resolve a pending wait with the submitted payload.
    ///
    /// Fails with `CallbackNotFound` for unknown tokens and `CallbackClosed`
    /// for waits that already resolved or expired. Returns the updated record
    /// so the caller can route the payload to the suspended instance.
    async fn resolve_wait(
        &self,
        token: &str,
        payload: &[u8],
    ) -> Result<CallbackWaitRecord, CoreError>;

    /// Expire a pending wait. Returns true if the update applied, false if
    /// the wait was not pending (a resolution raced the timeout).
    async fn expire_wait(&self, token: &str) -> Result<bool, CoreError>;

    /// Fetch the payload of a resolved wait, if any.
    ///
    /// Crash-recovery path: the resolution may have been persisted while the
    /// execution was down, in which case the resumed wait picks it up here
    /// instead of suspending again.
    async fn take_wait_result(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<Vec<u8>>, CoreError>;

    /// Number of instances currently running or suspended. Surfaced by the
    /// health endpoint.
    async fn count_active_instances(&self) -> Result<i64, CoreError>;

    async fn health_check_db(&self) -> Result<bool, CoreError>;
}
