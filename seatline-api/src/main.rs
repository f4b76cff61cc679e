use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use seatline_api::{app, worker, AppState};
use seatline_core::memory::{MemoryHoldStore, MemorySeatLedger};
use seatline_core::{HoldStore, ReservationCoordinator, SeatLedger, SeatService};
use seatline_store::app_config::{Config, StoreBackend};
use seatline_store::{DbClient, PostgresSeatLedger, RedisClient};
use tokio::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "seatline_api=debug,seatline_core=debug,seatline_store=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Seatline API on port {}", config.server.port);

    let (ledger, holds): (Arc<dyn SeatLedger>, Arc<dyn HoldStore>) = match config.store.backend {
        StoreBackend::Durable => {
            let db = DbClient::new(&config.database)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;

            let redis = RedisClient::new(&config.redis.url, config.holds.scan_count)
                .await
                .context("Failed to create Redis client")?;
            if let Err(e) = redis.ping().await {
                // Holds fail with 503 until Redis comes back.
                tracing::warn!("Redis not reachable at startup: {}", e);
            }

            let ledger: Arc<dyn SeatLedger> = Arc::new(PostgresSeatLedger::new(db.pool.clone()));
            let holds: Arc<dyn HoldStore> = Arc::new(redis);
            (ledger, holds)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory stores, state is lost on restart");
            let ledger: Arc<dyn SeatLedger> = Arc::new(MemorySeatLedger::new());
            let holds: Arc<dyn HoldStore> = Arc::new(MemoryHoldStore::new());
            (ledger, holds)
        }
    };

    let policy = config.holds.policy();
    let seats: Arc<dyn SeatService> = Arc::new(ReservationCoordinator::new(ledger, holds, policy));

    tokio::spawn(worker::start_reconcile_worker(
        seats.clone(),
        Duration::from_secs(config.reconcile.interval_seconds.max(1)),
    ));

    let (events, _) = tokio::sync::broadcast::channel(100);

    let app_state = AppState {
        seats,
        events,
        session: config.session.clone(),
        hold_ttl_seconds: policy.ttl_seconds,
        allowed_origins: config.server.allowed_origins.clone(),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
