// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tapline - durable bar-order orchestration server.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use tapline_core::config::Config;
use tapline_core::persistence::{Persistence, SqlitePersistence};
use tapline_core::router::CallbackRouter;
use tapline_orders::events::{EventBus, EventPublisher};
use tapline_orders::store::{OrderStore, SqliteOrderStore};
use tapline_orders::{OrderOrchestrator, OrdersConfig};
use tapline_server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tapline=info".parse().unwrap()),
        )
        .init();

    info!("Starting Tapline");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;
    let orders_config = OrdersConfig::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        http_addr = %config.http_addr,
        capacity_ceiling = orders_config.capacity_ceiling,
        "Configuration loaded"
    );

    // Open databases (running migrations)
    let persistence = Arc::new(SqlitePersistence::from_path(config.engine_db()).await?);
    let store = Arc::new(SqliteOrderStore::from_path(config.orders_db()).await?);

    persistence.health_check_db().await?;
    info!("Database health check passed");

    let router = CallbackRouter::new(persistence.clone());
    let bus = EventBus::default();

    // Log every domain event; stands in for downstream push consumers.
    let mut event_rx = bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            info!(
                event_type = %event.event_type,
                order_id = %event.detail.order_id,
                status = %event.detail.status,
                "Domain event"
            );
        }
    });

    let orchestrator = Arc::new(OrderOrchestrator::new(
        store.clone() as Arc<dyn OrderStore>,
        Arc::new(bus.clone()) as Arc<dyn EventPublisher>,
        orders_config,
    ));

    let state = AppState {
        persistence: persistence as Arc<dyn Persistence>,
        router,
        store: store as Arc<dyn OrderStore>,
        bus,
        orchestrator,
    };

    let app = tapline_server::router(state);
    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, "Tapline listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down...");
        })
        .await?;

    info!("Shutdown complete");
    Ok(())
}
