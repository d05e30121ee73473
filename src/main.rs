use std::net::SocketAddr;
use std::time::Duration;
use tokio::task;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinema_booking::{
    config::{Config, LogFormat},
    controllers,
    seed::SeedData,
    services::MaintenanceService,
    AppState,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::new(&config.app.rust_log);
    let registry = tracing_subscriber::registry().with(filter);
    match config.app.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Plain => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    init_tracing(&config);

    info!(
        "Starting Cinema Booking API ({}, {:?} storage)",
        config.app.environment, config.storage.backend
    );

    // Storage, cache and services
    let app_state = AppState::new(config.clone()).await?;

    // Seed reference data: movies, prices, halls, seats. No-op on a populated catalog
    if let Some(path) = &config.storage.seed_file {
        let seed = SeedData::from_file(path).await?;
        seed.apply(app_state.store.as_ref()).await?;
    }

    // --- Start background tasks ---

    // Reconcile seats_available counters every N seconds
    let interval = config.maintenance.reconcile_interval_seconds;
    if interval > 0 {
        let maintenance = MaintenanceService::new(app_state.clone());
        task::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(interval)).await;
                let stats = maintenance.run_reconciliation_sweep().await;
                if !stats.is_clean() {
                    error!("Reconciliation sweep found problems: {:?}", stats);
                }
            }
        });
    }

    // --- Start the web server ---

    let app = controllers::app(app_state.clone());

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
