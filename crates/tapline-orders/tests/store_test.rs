// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for the SQLite order store.

use chrono::Utc;
use tapline_orders::store::{OrderStore, SqliteOrderStore};
use tapline_orders::types::{MenuItem, Order, OrderStatus};

fn order(id: &str, status: OrderStatus) -> Order {
    let now = Utc::now();
    Order {
        id: id.to_string(),
        customer_id: "c-1".to_string(),
        bartender_id: None,
        status,
        item: MenuItem {
            id: "i-1".to_string(),
            name: "Mojito".to_string(),
            price: 10.0,
            description: Some("classic".to_string()),
            category: Some("cocktails".to_string()),
        },
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn test_put_and_get_round_trip() {
    let store = SqliteOrderStore::in_memory().await.unwrap();

    store.put(&order("o-1", OrderStatus::Pending)).await.unwrap();

    let fetched = store.get("o-1").await.unwrap().unwrap();
    assert_eq!(fetched.id, "o-1");
    assert_eq!(fetched.status, OrderStatus::Pending);
    assert_eq!(fetched.item.name, "Mojito");
    assert_eq!(fetched.item.category.as_deref(), Some("cocktails"));
    assert!(fetched.bartender_id.is_none());

    assert!(store.get("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_put_is_idempotent_upsert() {
    let store = SqliteOrderStore::in_memory().await.unwrap();

    let o = order("o-1", OrderStatus::Pending);
    store.put(&o).await.unwrap();
    // A replayed create-order step writes the same record again.
    store.put(&o).await.unwrap();

    let open = store.list_open().await.unwrap();
    assert_eq!(open.len(), 1);
}

#[tokio::test]
async fn test_update_status_sets_bartender_once() {
    let store = SqliteOrderStore::in_memory().await.unwrap();
    store.put(&order("o-1", OrderStatus::Pending)).await.unwrap();

    store
        .update_status("o-1", OrderStatus::Accepted, Some("b-1"))
        .await
        .unwrap();
    let fetched = store.get("o-1").await.unwrap().unwrap();
    assert_eq!(fetched.status, OrderStatus::Accepted);
    assert_eq!(fetched.bartender_id.as_deref(), Some("b-1"));

    // Later transitions without a bartender keep the recorded one.
    store
        .update_status("o-1", OrderStatus::Ready, None)
        .await
        .unwrap();
    let fetched = store.get("o-1").await.unwrap().unwrap();
    assert_eq!(fetched.status, OrderStatus::Ready);
    assert_eq!(fetched.bartender_id.as_deref(), Some("b-1"));
}

#[tokio::test]
async fn test_update_status_refreshes_updated_at() {
    let store = SqliteOrderStore::in_memory().await.unwrap();
    let o = order("o-1", OrderStatus::Pending);
    store.put(&o).await.unwrap();

    store
        .update_status("o-1", OrderStatus::Accepted, Some("b-1"))
        .await
        .unwrap();

    let fetched = store.get("o-1").await.unwrap().unwrap();
    assert!(fetched.updated_at >= o.updated_at);
    assert_eq!(fetched.created_at, o.created_at);
}

#[tokio::test]
async fn test_count_by_status() {
    let store = SqliteOrderStore::in_memory().await.unwrap();

    for i in 0..3 {
        store
            .put(&order(&format!("acc-{i}"), OrderStatus::Accepted))
            .await
            .unwrap();
    }
    store.put(&order("pen-1", OrderStatus::Pending)).await.unwrap();

    assert_eq!(store.count_by_status(OrderStatus::Accepted).await.unwrap(), 3);
    assert_eq!(store.count_by_status(OrderStatus::Pending).await.unwrap(), 1);
    assert_eq!(store.count_by_status(OrderStatus::Completed).await.unwrap(), 0);
}

#[tokio::test]
async fn test_list_open_excludes_terminal_statuses() {
    let store = SqliteOrderStore::in_memory().await.unwrap();

    store.put(&order("o-1", OrderStatus::Pending)).await.unwrap();
    store.put(&order("o-2", OrderStatus::Accepted)).await.unwrap();
    store.put(&order("o-3", OrderStatus::Ready)).await.unwrap();
    store.put(&order("o-4", OrderStatus::Completed)).await.unwrap();
    store.put(&order("o-5", OrderStatus::Cancelled)).await.unwrap();

    let open = store.list_open().await.unwrap();
    let ids: Vec<_> = open.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    assert!(ids.contains(&"o-1"));
    assert!(ids.contains(&"o-2"));
    assert!(ids.contains(&"o-3"));
}

#[tokio::test]
async fn test_on_disk_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.db");

    {
        let store = SqliteOrderStore::from_path(&path).await.unwrap();
        store.put(&order("o-1", OrderStatus::Accepted)).await.unwrap();
    }

    let store = SqliteOrderStore::from_path(&path).await.unwrap();
    let fetched = store.get("o-1").await.unwrap().unwrap();
    assert_eq!(fetched.status, OrderStatus::Accepted);
}
