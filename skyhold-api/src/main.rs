use anyhow::Context;
use skyhold_api::{app, state::{AppState, AuthConfig}, worker};
use skyhold_booking::{EngineSettings, MockPaymentAdapter, ReservationEngine};
use skyhold_core::{ReservationStore, SystemClock};
use skyhold_store::app_config::{Config, StorageBackend};
use skyhold_store::{DbClient, MemoryReservationStore, PgReservationStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skyhold_api=debug,skyhold_booking=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting SkyHold API on port {}", config.server.port);

    let store: Arc<dyn ReservationStore> = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database)
                .await
                .context("Failed to connect to Postgres")?;
            if config.database.run_migrations {
                db.migrate().await.context("Failed to run migrations")?;
            }
            Arc::new(PgReservationStore::from_client(&db))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store; run a single instance only");
            Arc::new(MemoryReservationStore::new())
        }
    };

    tracing::warn!("No payment provider configured, using the mock adapter");
    let settings = EngineSettings::from_rules(&config.reservation)?;
    let engine = ReservationEngine::new(
        store,
        Arc::new(MockPaymentAdapter::new()),
        Arc::new(SystemClock),
        settings,
    );

    if config.reservation.reaper_interval_seconds > 0 {
        worker::start_hold_reaper(
            engine.clone(),
            Duration::from_secs(config.reservation.reaper_interval_seconds),
        );
    }

    let app_state = AppState::new(engine, AuthConfig { secret: config.auth.jwt_secret.clone() });
    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
