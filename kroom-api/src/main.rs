use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kroom_api::{app, worker, AppState};
use kroom_booking::{BookingEngine, InMemoryBookingStore};
use kroom_core::events::TracingAuditSink;
use kroom_core::repository::BookingStore;
use kroom_shared::{Clock, SystemClock};
use kroom_store::app_config::Config;
use kroom_store::{DbClient, PgBookingStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kroom_api=debug,kroom_booking=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting kroom API on port {}", config.server.port);

    let mut rules = config.booking_rules.clone();
    let store: Arc<dyn BookingStore> = match &config.database {
        Some(db_config) => {
            let db = DbClient::new(db_config)
                .await
                .context("Failed to connect to Postgres")?;
            if db_config.run_migrations {
                db.migrate().await.context("Failed to run migrations")?;
            }
            rules = match db.fetch_booking_rules(rules.clone()).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Could not load booking rules from database, using config: {}", e);
                    rules
                }
            };
            Arc::new(PgBookingStore::new(db.pool.clone()))
        }
        None => {
            tracing::warn!("No [database] configured; bookings are kept in memory and lost on restart");
            Arc::new(InMemoryBookingStore::new())
        }
    };

    for room in &config.rooms {
        store
            .save_room(room)
            .await
            .with_context(|| format!("Failed to seed room {}", room.id))?;
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sweep_every = std::time::Duration::from_secs(rules.sweep_interval_seconds.max(1));
    let engine = Arc::new(BookingEngine::new(
        store,
        clock.clone(),
        Arc::new(TracingAuditSink),
        rules,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn(worker::start_expiry_worker(
        engine.clone(),
        clock,
        sweep_every,
        shutdown_rx,
    ));

    let app = app(AppState { engine });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    sweeper.await?;
    Ok(())
}
