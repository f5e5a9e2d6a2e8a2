use std::sync::Arc;
use std::net::SocketAddr;
use std::time::Duration;
use anyhow::Context;
use tourline_api::{app, build_workflow, state::{AppState, AuthConfig}, worker};
use tourline_booking::MemoryStore;
use tourline_core::{MockPaymentAdapter, SystemClock};
use tourline_store::{app_config::StorageBackend, Config, DbClient, PgStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tourline_api=debug,tourline_booking=info,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Tourline API on port {}", config.server.port);

    let payments = Arc::new(MockPaymentAdapter);
    let clock = Arc::new(SystemClock);

    let (workflow, db) = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            (build_workflow(store, payments, clock, &config), None)
        }
        StorageBackend::Postgres => {
            let url = config
                .storage
                .url
                .as_deref()
                .context("storage.url is required for the postgres backend")?;
            let db = DbClient::new(url).await.context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;

            let store = Arc::new(PgStore::new(db.pool.clone()));
            (build_workflow(store, payments, clock, &config), Some(Arc::new(db)))
        }
    };
    let workflow = Arc::new(workflow);

    tokio::spawn(worker::start_sweep_worker(
        workflow.clone(),
        Duration::from_secs(config.booking_rules.sweep_interval_seconds.max(1)),
    ));

    let app_state = AppState {
        workflow,
        db,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
