// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Order persistence.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

use crate::error::{OrderError, Result};
use crate::types::{MenuItem, Order, OrderStatus};

/// Keyed persistence for order records.
///
/// `put` is an idempotent upsert keyed by order id; `update_status` is a
/// partial update that touches `bartender_id` only when one is supplied.
/// No operation spans multiple orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Upsert an order record.
    async fn put(&self, order: &Order) -> Result<()>;

    /// Update an order's status, refreshing `updated_at`. `bartender_id` is
    /// written only when provided; once set it survives later transitions.
    async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        bartender_id: Option<&str>,
    ) -> Result<()>;

    /// Count orders currently in the given status.
    async fn count_by_status(&self, status: OrderStatus) -> Result<i64>;

    /// Fetch one order by id.
    async fn get(&self, order_id: &str) -> Result<Option<Order>>;

    /// All orders in open statuses (pending, accepted, ready), oldest first.
    async fn list_open(&self) -> Result<Vec<Order>>;
}

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Raw row shape; `item` is a JSON snapshot and `status` a lowercase string.
#[derive(sqlx::FromRow)]
struct OrderRow {
    order_id: String,
    customer_id: String,
    bartender_id: Option<String>,
    status: String,
    item: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = OrderError;

    fn try_from(row: OrderRow) -> Result<Self> {
        let item: MenuItem = serde_json::from_str(&row.item)?;
        Ok(Order {
            id: row.order_id,
            customer_id: row.customer_id,
            bartender_id: row.bartender_id,
            status: OrderStatus::from_str(&row.status)?,
            item,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// SQLite-backed order store.
pub struct SqliteOrderStore {
    pool: SqlitePool,
}

impl SqliteOrderStore {
    /// Open (creating if necessary) an order database at the given path and
    /// run migrations.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| OrderError::Store {
                operation: "create data dir",
                details: e.to_string(),
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| OrderError::Store {
                operation: "connect",
                details: e.to_string(),
            })?;

        Self::migrate(&pool).await?;
        info!(path = %path.display(), "Order store opened");
        Ok(Self { pool })
    }

    /// In-memory store for tests.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| OrderError::Store {
                operation: "connect",
                details: e.to_string(),
            })?;

        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        MIGRATOR.run(pool).await.map_err(|e| OrderError::Store {
            operation: "migrate",
            details: e.to_string(),
        })
    }
}

#[async_trait]
impl OrderStore for SqliteOrderStore {
    async fn put(&self, order: &Order) -> Result<()> {
        let item = serde_json::to_string(&order.item)?;

        sqlx::query(
            r#"
            INSERT INTO orders (order_id, customer_id, bartender_id, status, item, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(order_id) DO UPDATE SET
                customer_id = excluded.customer_id,
                bartender_id = excluded.bartender_id,
                status = excluded.status,
                item = excluded.item,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&order.id)
        .bind(&order.customer_id)
        .bind(&order.bartender_id)
        .bind(order.status.as_str())
        .bind(&item)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| OrderError::Store {
            operation: "put",
            details: e.to_string(),
        })?;

        Ok(())
    }

    async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        bartender_id: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = ?1,
                updated_at = ?2,
                bartender_id = COALESCE(?3, bartender_id)
            WHERE order_id = ?4
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(bartender_id)
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(|e| OrderError::Store {
            operation: "update_status",
            details: e.to_string(),
        })?;

        Ok(())
    }

    async fn count_by_status(&self, status: OrderStatus) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM orders WHERE status = ?1")
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| OrderError::Store {
                    operation: "count_by_status",
                    details: e.to_string(),
                })?;

        Ok(count.0)
    }

    async fn get(&self, order_id: &str) -> Result<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as("SELECT * FROM orders WHERE order_id = ?1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| OrderError::Store {
                    operation: "get",
                    details: e.to_string(),
                })?;

        row.map(Order::try_from).transpose()
    }

    async fn list_open(&self) -> Result<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            r#"
            SELECT * FROM orders
            WHERE status IN ('pending', 'accepted', 'ready')
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| OrderError::Store {
            operation: "list_open",
            details: e.to_string(),
        })?;

        rows.into_iter().map(Order::try_from).collect()
    }
}
