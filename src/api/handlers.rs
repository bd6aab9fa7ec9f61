use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use uuid::Uuid;

use crate::api::requests::{
    CreateRefundRequest, CreateVirtualAccountRequest, CreateWithdrawalRequest,
    FinalizeTransferRequest, LedgerHistoryQuery, ResolveAccountRequest, ValidationError,
};
use crate::api::responses::{
    ApiResponse, ErrorResponse, HealthResponse, LedgerEntryResponse, RefundResponse,
    ServiceHealth, SettlementRunResponse, TransferResponse, ValidationErrorDetail, WalletResponse,
};
use crate::error::AppError;
use crate::models::{EntryKind, EntryOwner};
use crate::provider;
use crate::services::{RefundRequest, WithdrawalRequest};

use super::routes::AppState;

type ErrorReply = (StatusCode, Json<ApiResponse<()>>);

/// Maps an application error to its HTTP reply. Infrastructure errors are
/// logged and collapsed into a generic message.
fn error_reply(e: AppError) -> ErrorReply {
    let message = match &e {
        AppError::Database(_) | AppError::Internal(_) | AppError::Config(_) => {
            tracing::error!("request failed: {e}");
            "An internal error occurred".to_string()
        }
        AppError::Provider(_) => {
            tracing::warn!("provider call failed: {e}");
            "Payment processor request failed".to_string()
        }
        _ => e.to_string(),
    };
    (
        e.status_code(),
        Json(ApiResponse::<()>::error(ErrorResponse::new(e.code(), message))),
    )
}

fn validation_reply(errors: Vec<ValidationError>) -> ErrorReply {
    let details: Vec<ValidationErrorDetail> = errors
        .into_iter()
        .map(|e| ValidationErrorDetail {
            field: e.field,
            message: e.message,
        })
        .collect();
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error(
            ErrorResponse::new("VALIDATION_ERROR", "Request validation failed")
                .with_details(details),
        )),
    )
}

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let db_healthy = sqlx::query("SELECT 1").fetch_one(&state.pool).await.is_ok();

    let status = if db_healthy { "healthy" } else { "degraded" };
    let response = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        services: ServiceHealth {
            database: db_healthy,
            provider_configured: true,
        },
    };

    Json(ApiResponse::success(response))
}

/// Readiness check endpoint.
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    let db_healthy = sqlx::query("SELECT 1").fetch_one(&state.pool).await.is_ok();
    if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Liveness check endpoint.
pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

/// Prometheus metrics endpoint.
pub async fn metrics_endpoint(State(state): State<AppState>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|h| h.render())
        .unwrap_or_default()
}

// ============================================================================
// Webhook
// ============================================================================

/// The single processor webhook endpoint. The signature is verified against
/// the raw body before anything is parsed; an invalid signature is rejected
/// without processing. Once the payload is authentic the endpoint always
/// acknowledges, whatever the downstream outcome — internal failures are
/// logged and left to reconciliation, never surfaced to the processor.
pub async fn provider_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let header_name = state.provider.signature_header();
    let Some(signature) = headers.get(header_name).and_then(|v| v.to_str().ok()) else {
        tracing::warn!("webhook rejected: missing {header_name} header");
        return StatusCode::UNAUTHORIZED;
    };

    if let Err(e) = state.provider.validate_signature(&body, signature) {
        tracing::warn!("webhook rejected: {e}");
        return StatusCode::UNAUTHORIZED;
    }

    let event = match state.provider.parse_webhook(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("webhook payload not parseable: {e}");
            return StatusCode::OK;
        }
    };

    if let Some(metrics) = crate::observability::METRICS.get() {
        metrics.record_webhook_received(event_name(&event));
    }

    if let Err(e) = state.webhook_service.process(event).await {
        tracing::error!("webhook processing failed: {e}");
    }

    StatusCode::OK
}

fn event_name(event: &provider::WebhookEvent) -> &'static str {
    match event {
        provider::WebhookEvent::PaymentSucceeded { .. } => "payment_succeeded",
        provider::WebhookEvent::WalletFunded { .. } => "wallet_funded",
        provider::WebhookEvent::VirtualAccountAssigned { .. } => "virtual_account_assigned",
        provider::WebhookEvent::TransferSucceeded { .. } => "transfer_succeeded",
        provider::WebhookEvent::TransferFailed { .. } => "transfer_failed",
        provider::WebhookEvent::RefundProcessed { .. } => "refund_processed",
        provider::WebhookEvent::RefundFailed { .. } => "refund_failed",
        provider::WebhookEvent::Unknown { .. } => "unknown",
    }
}

// ============================================================================
// Wallets
// ============================================================================

/// Get a wallet with its balances.
pub async fn get_wallet(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
) -> Result<Json<ApiResponse<WalletResponse>>, ErrorReply> {
    let wallet = state
        .wallet_repo
        .find_by_owner(owner_id)
        .await
        .map_err(error_reply)?
        .ok_or_else(|| {
            error_reply(AppError::NotFound(format!(
                "Wallet for owner '{owner_id}' not found"
            )))
        })?;

    Ok(Json(ApiResponse::success(WalletResponse::from(wallet))))
}

/// Issue a virtual account for a wallet owner, creating the wallet if it
/// does not exist yet.
pub async fn create_virtual_account(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
    Json(request): Json<CreateVirtualAccountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<WalletResponse>>), ErrorReply> {
    request.validate().map_err(validation_reply)?;

    let wallet = state
        .wallet_repo
        .get_or_create(owner_id, &state.settings.fees.currency)
        .await
        .map_err(error_reply)?;

    if wallet.account_number.is_some() {
        return Err(error_reply(AppError::Conflict(format!(
            "wallet for owner '{owner_id}' already has a virtual account"
        ))));
    }

    let account = state
        .provider
        .create_virtual_account(provider::CreateVirtualAccountRequest {
            email: request.email,
            first_name: request.first_name,
            last_name: request.last_name,
            phone: request.phone,
        })
        .await
        .map_err(error_reply)?;

    let wallet = state
        .wallet_repo
        .attach_virtual_account(
            wallet.id,
            &account.account_number,
            &account.bank_name,
            &account.customer_code,
        )
        .await
        .map_err(error_reply)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(WalletResponse::from(wallet))),
    ))
}

/// Get the ledger history for a wallet owner.
pub async fn get_ledger_history(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
    Query(query): Query<LedgerHistoryQuery>,
) -> Result<Json<ApiResponse<Vec<LedgerEntryResponse>>>, ErrorReply> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);

    let entries = state
        .ledger_service
        .entry_history(owner_id, limit, offset)
        .await
        .map_err(error_reply)?;

    Ok(Json(ApiResponse::success(
        entries.into_iter().map(LedgerEntryResponse::from).collect(),
    )))
}

// ============================================================================
// Withdrawals
// ============================================================================

/// Initiate a withdrawal to a bank account.
pub async fn create_withdrawal(
    State(state): State<AppState>,
    Json(request): Json<CreateWithdrawalRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TransferResponse>>), ErrorReply> {
    request.validate().map_err(validation_reply)?;

    let transfer = state
        .transfer_service
        .initiate_withdrawal(WithdrawalRequest {
            owner: EntryOwner::User(request.owner_id),
            amount: request.amount,
            currency: state.settings.fees.currency.clone(),
            kind: EntryKind::Withdrawal,
            bank_code: request.bank_code,
            account_number: request.account_number,
            account_name: request.account_name,
            reason: request.reason,
        })
        .await
        .map_err(error_reply)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(TransferResponse::from(transfer))),
    ))
}

/// Finalize an OTP-gated withdrawal.
pub async fn finalize_withdrawal(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Json(request): Json<FinalizeTransferRequest>,
) -> Result<Json<ApiResponse<TransferResponse>>, ErrorReply> {
    request.validate().map_err(validation_reply)?;

    let transfer = state
        .transfer_service
        .finalize_transfer(&reference, &request.otp)
        .await
        .map_err(error_reply)?;

    Ok(Json(ApiResponse::success(TransferResponse::from(transfer))))
}

// ============================================================================
// Refunds
// ============================================================================

/// Refund an order, fully or partially.
pub async fn create_refund(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<CreateRefundRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RefundResponse>>), ErrorReply> {
    request.validate().map_err(validation_reply)?;

    let refund = state
        .refund_service
        .process_refund(RefundRequest {
            order_id,
            refund_type: request.refund_type,
            amount: request.amount,
            reason: request.reason,
        })
        .await
        .map_err(error_reply)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(RefundResponse::from(refund))),
    ))
}

/// List refunds for an order.
pub async fn list_refunds(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<RefundResponse>>>, ErrorReply> {
    let refunds = state
        .refund_service
        .refunds_for_order(order_id)
        .await
        .map_err(error_reply)?;

    Ok(Json(ApiResponse::success(
        refunds.into_iter().map(RefundResponse::from).collect(),
    )))
}

// ============================================================================
// Settlements
// ============================================================================

/// Manually trigger a due-settlement run. Includes manually scheduled
/// settlements, unlike the background run.
pub async fn run_settlements(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SettlementRunResponse>>, ErrorReply> {
    let report = state
        .settlement_service
        .run_due_settlements(true)
        .await
        .map_err(error_reply)?;

    Ok(Json(ApiResponse::success(SettlementRunResponse::from(report))))
}

// ============================================================================
// Banks
// ============================================================================

/// List banks supported by the processor.
pub async fn list_banks(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<provider::Bank>>>, ErrorReply> {
    let banks = state.provider.list_banks().await.map_err(error_reply)?;
    Ok(Json(ApiResponse::success(banks)))
}

/// Resolve a bank account number to its holder's name.
pub async fn resolve_account(
    State(state): State<AppState>,
    Json(request): Json<ResolveAccountRequest>,
) -> Result<Json<ApiResponse<provider::ResolvedAccount>>, ErrorReply> {
    request.validate().map_err(validation_reply)?;

    let resolved = state
        .provider
        .resolve_account(&request.account_number, &request.bank_code)
        .await
        .map_err(error_reply)?;

    Ok(Json(ApiResponse::success(resolved)))
}
