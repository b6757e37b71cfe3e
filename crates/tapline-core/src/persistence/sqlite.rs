//! SQLite-backed persistence implementation.

use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::CoreError;

use super::{CallbackWaitRecord, CheckpointRecord, EventRecord, InstanceRecord, Persistence};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite persistence provider from an existing pool.
    ///
    /// The caller is responsible for running migrations on the pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create and initialize a new SQLite persistence from a file path.
    ///
    /// This convenience constructor handles all setup:
    /// - Creates parent directories if they don't exist
    /// - Creates the database file if it doesn't exist
    /// - Connects to the database with sensible defaults
    /// - Runs all migrations
    ///
    /// # Example
    ///
    /// ```ignore
    /// let persistence = SqlitePersistence::from_path(".data/engine.db").await?;
    /// ```
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::DatabaseError {
                operation: "create_dir".to_string(),
                details: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
        }

        let path_str = path.to_string_lossy();
        let url = format!("sqlite:{}?mode=rwc", path_str);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {:?}: {}", path, e),
            })?;

        Self::migrate(&pool).await?;

        Ok(Self { pool })
    }

    /// Create an in-memory SQLite persistence (single connection).
    ///
    /// Each in-memory connection is its own database, so the pool is capped
    /// at one connection. Intended for tests and embedded demos.
    pub async fn in_memory() -> Result<Self, CoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Failed to open in-memory SQLite: {}", e),
            })?;

        Self::migrate(&pool).await?;

        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), CoreError> {
        MIGRATOR
            .run(pool)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "migrate".to_string(),
                details: format!("Failed to run migrations: {}", e),
            })
    }
}

#[async_trait::async_trait]
impl Persistence for SqlitePersistence {
    async fn register_instance(&self, instance_id: &str, tenant_id: &str) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO instances (instance_id, tenant_id, status, created_at)
            VALUES (?, ?, 'pending', CURRENT_TIMESTAMP)
            ON CONFLICT (instance_id) DO NOTHING
            "#,
        )
        .bind(instance_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_instance(&self, instance_id: &str) -> Result<Option<InstanceRecord>, CoreError> {
        let record = sqlx::query_as::<_, InstanceRecord>(
            r#"
            SELECT instance_id, tenant_id, status, checkpoint_id,
                   created_at, started_at, finished_at, output, error
            FROM instances
            WHERE instance_id = ?
            "#,
        )
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update_instance_status(
        &self,
        instance_id: &str,
        status: &str,
        started_at: Option<DateTime<Utc>>,
    ) -> Result<(), CoreError> {
        if let Some(started) = started_at {
            sqlx::query(
                r#"
                UPDATE instances
                SET status = ?, started_at = ?
                WHERE instance_id = ?
                "#,
            )
            .bind(status)
            .bind(started)
            .bind(instance_id)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE instances
                SET status = ?
                WHERE instance_id = ?
                "#,
            )
            .bind(status)
            .bind(instance_id)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn update_instance_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            UPDATE instances
            SET checkpoint_id = ?
            WHERE instance_id = ?
            "#,
        )
        .bind(checkpoint_id)
        .bind(instance_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn complete_instance(
        &self,
        instance_id: &str,
        output: Option<&[u8]>,
        error: Option<&str>,
    ) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE instances
            SET status = CASE
                    WHEN ?1 IS NOT NULL THEN 'failed'
                    ELSE 'completed'
                END,
                finished_at = CURRENT_TIMESTAMP,
                output = ?2,
                error = ?1
            WHERE instance_id = ?3
            "#,
        )
        .bind(error)
        .bind(output)
        .bind(instance_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            });
        }

        Ok(())
    }

    async fn save_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
        state: &[u8],
    ) -> Result<(), CoreError> {
        // Insert-or-ignore: a replay racing a crash must not overwrite the
        // first recorded result.
        sqlx::query(
            r#"
            INSERT INTO checkpoints (instance_id, checkpoint_id, state, created_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT (instance_id, checkpoint_id) DO NOTHING
            "#,
        )
        .bind(instance_id)
        .bind(checkpoint_id)
        .bind(state)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<CheckpointRecord>, CoreError> {
        let record = sqlx::query_as::<_, CheckpointRecord>(
            r#"
            SELECT id, instance_id, checkpoint_id, state, created_at
            FROM checkpoints
            WHERE instance_id = ? AND checkpoint_id = ?
            "#,
        )
        .bind(instance_id)
        .bind(checkpoint_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert_event(&self, event: &EventRecord) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO instance_events
                (instance_id, event_type, checkpoint_id, payload, created_at, subtype)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.instance_id)
        .bind(&event.event_type)
        .bind(&event.checkpoint_id)
        .bind(&event.payload)
        .bind(event.created_at)
        .bind(&event.subtype)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_events(
        &self,
        instance_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EventRecord>, CoreError> {
        let records = sqlx::query_as::<_, EventRecord>(
            r#"
            SELECT id, instance_id, event_type, checkpoint_id, payload, created_at, subtype
            FROM instance_events
            WHERE instance_id = ?
            ORDER BY id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(instance_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn open_wait(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
        token: &str,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO callback_waits (token, instance_id, checkpoint_id, status, created_at)
            VALUES (?, ?, ?, 'pending', CURRENT_TIMESTAMP)
            ON CONFLICT (instance_id, checkpoint_id) DO NOTHING
            "#,
        )
        .bind(token)
        .bind(instance_id)
        .bind(checkpoint_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_wait(&self, token: &str) -> Result<Option<CallbackWaitRecord>, CoreError> {
        let record = sqlx::query_as::<_, CallbackWaitRecord>(
            r#"
            SELECT token, instance_id, checkpoint_id, status, payload, created_at, resolved_at
            FROM callback_waits
            WHERE token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn resolve_wait(
        &self,
        token: &str,
        payload: &[u8],
    ) -> Result<CallbackWaitRecord, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE callback_waits
            SET status = 'resolved', payload = ?, resolved_at = CURRENT_TIMESTAMP
            WHERE token = ? AND status = 'pending'
            "#,
        )
        .bind(payload)
        .bind(token)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish unknown tokens from closed waits.
            return match self.get_wait(token).await? {
                Some(wait) => Err(CoreError::CallbackClosed {
                    token: token.to_string(),
                    status: wait.status,
                }),
                None => Err(CoreError::CallbackNotFound {
                    token: token.to_string(),
                }),
            };
        }

        self.get_wait(token)
            .await?
            .ok_or_else(|| CoreError::CallbackNotFound {
                token: token.to_string(),
            })
    }

    async fn expire_wait(&self, token: &str) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE callback_waits
            SET status = 'expired', resolved_at = CURRENT_TIMESTAMP
            WHERE token = ? AND status = 'pending'
            "#,
        )
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn take_wait_result(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<Vec<u8>>, CoreError> {
        let payload: Option<(Option<Vec<u8>>,)> = sqlx::query_as(
            r#"
            SELECT payload
            FROM callback_waits
            WHERE instance_id = ? AND checkpoint_id = ? AND status = 'resolved'
            "#,
        )
        .bind(instance_id)
        .bind(checkpoint_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payload.and_then(|(p,)| p))
    }

    async fn count_active_instances(&self) -> Result<i64, CoreError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM instances
            WHERE status IN ('running', 'suspended')
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn health_check_db(&self) -> Result<bool, CoreError> {
        let (one,): (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(one == 1)
    }
}
