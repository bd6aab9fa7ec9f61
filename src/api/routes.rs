use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::config::Settings;
use crate::provider::PaymentProvider;
use crate::repositories::WalletRepository;
use crate::services::{
    LedgerService, RefundService, SettlementService, TransferService, WebhookService,
};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub settings: Arc<Settings>,
    pub provider: Arc<dyn PaymentProvider>,
    pub ledger_service: Arc<LedgerService>,
    pub transfer_service: Arc<TransferService>,
    pub webhook_service: Arc<WebhookService>,
    pub refund_service: Arc<RefundService>,
    pub settlement_service: Arc<SettlementService>,
    pub wallet_repo: Arc<WalletRepository>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        settings: Arc<Settings>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        let ledger_service = Arc::new(LedgerService::new(pool.clone()));
        let transfer_service = Arc::new(TransferService::new(
            pool.clone(),
            ledger_service.clone(),
            provider.clone(),
        ));
        let settlement_service = Arc::new(SettlementService::new(
            pool.clone(),
            transfer_service.clone(),
            settings.settlement.clone(),
        ));
        let webhook_service = Arc::new(WebhookService::new(
            pool.clone(),
            ledger_service.clone(),
            transfer_service.clone(),
            settlement_service.clone(),
            settings.fees.clone(),
        ));
        let refund_service = Arc::new(RefundService::new(
            pool.clone(),
            ledger_service.clone(),
            provider.clone(),
            settings.fees.clone(),
        ));
        let wallet_repo = Arc::new(WalletRepository::new(pool.clone()));

        Self {
            pool,
            settings,
            provider,
            ledger_service,
            transfer_service,
            webhook_service,
            refund_service,
            settlement_service,
            wallet_repo,
            metrics_handle: None,
        }
    }

    /// Adds metrics handle to the state.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}

/// Creates the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check))
        // Metrics endpoint
        .route("/metrics", get(handlers::metrics_endpoint))
        // Processor webhook
        .route("/webhooks/provider", post(handlers::provider_webhook))
        // Wallet endpoints
        .route("/wallets/:owner_id", get(handlers::get_wallet))
        .route(
            "/wallets/:owner_id/virtual-account",
            post(handlers::create_virtual_account),
        )
        .route("/wallets/:owner_id/ledger", get(handlers::get_ledger_history))
        // Withdrawal endpoints
        .route("/withdrawals", post(handlers::create_withdrawal))
        .route(
            "/withdrawals/:reference/finalize",
            post(handlers::finalize_withdrawal),
        )
        // Refund endpoints
        .route("/orders/:order_id/refunds", post(handlers::create_refund))
        .route("/orders/:order_id/refunds", get(handlers::list_refunds))
        // Settlement endpoints
        .route("/settlements/run", post(handlers::run_settlements))
        // Bank endpoints
        .route("/banks", get(handlers::list_banks))
        .route("/banks/resolve", post(handlers::resolve_account))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
