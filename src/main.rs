use payments_engine::api::{create_router, AppState};
use payments_engine::config::Settings;
use payments_engine::observability::{init_logging, init_metrics, LogConfig, LogFormat};
use payments_engine::provider::create_provider;
use payments_engine::services::ReconciliationService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Arc::new(Settings::new()?);

    // Initialize logging
    init_logging(&LogConfig {
        level: settings.application.log_level.clone(),
        format: LogFormat::from(settings.application.log_format.as_str()),
        include_target: true,
    });

    // Initialize metrics
    let metrics_handle = init_metrics();

    // Connect to PostgreSQL
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.pool_size)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&settings.database.url)
        .await?;
    info!("Database connection established");

    // Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations applied successfully");

    // Build the active payment provider
    let provider = create_provider(&settings.provider)?;
    info!(provider = ?settings.provider.kind, "Payment provider configured");

    // Wire up application state
    let mut state = AppState::new(pool.clone(), settings.clone(), provider.clone());
    if let Some(handle) = metrics_handle {
        state = state.with_metrics(handle);
    }

    // Background reconciliation of stale pending state
    let reconciliation = Arc::new(ReconciliationService::new(
        pool.clone(),
        state.transfer_service.clone(),
        provider,
        settings.reconciliation.clone(),
    ));
    let reconciliation_task = reconciliation.clone();
    tokio::spawn(async move {
        reconciliation_task.start().await;
    });

    // Background settlement runs, hourly, excluding manual schedules
    let settlement_service = state.settlement_service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            if let Err(e) = settlement_service.run_due_settlements(false).await {
                tracing::warn!(error = %e, "scheduled settlement run failed");
            }
        }
    });

    // Serve
    let addr = format!("0.0.0.0:{}", settings.application.port);
    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, create_router(state)).await?;

    Ok(())
}
