use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    EntryFlow, EntryKind, EntryStatus, LedgerEntry, OrderRefund, RefundStatus, RefundType,
    Transfer, TransferStatus, Wallet, WalletStatus,
};
use crate::services::SettlementRunReport;

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorResponse>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: ErrorResponse) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<ValidationErrorDetail>) -> Self {
        self.details = Some(details);
        self
    }
}

/// Validation error detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub services: ServiceHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub database: bool,
    pub provider_configured: bool,
}

/// Wallet response DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub currency: String,
    pub available_balance: Decimal,
    pub pending_balance: Decimal,
    pub ledger_balance: Decimal,
    pub status: WalletStatus,
    pub account_number: Option<String>,
    pub bank_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Wallet> for WalletResponse {
    fn from(wallet: Wallet) -> Self {
        Self {
            id: wallet.id,
            owner_id: wallet.owner_id,
            currency: wallet.currency,
            available_balance: wallet.available_balance,
            pending_balance: wallet.pending_balance,
            ledger_balance: wallet.ledger_balance,
            status: wallet.status,
            account_number: wallet.account_number,
            bank_name: wallet.bank_name,
            created_at: wallet.created_at,
        }
    }
}

/// Ledger entry response DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntryResponse {
    pub id: Uuid,
    pub reference: String,
    pub kind: EntryKind,
    pub flow: EntryFlow,
    pub status: EntryStatus,
    pub amount: Decimal,
    pub fee: Decimal,
    pub net_amount: Decimal,
    pub currency: String,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for LedgerEntryResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            reference: entry.reference,
            kind: entry.kind,
            flow: entry.flow,
            status: entry.status,
            amount: entry.amount,
            fee: entry.fee,
            net_amount: entry.net_amount,
            currency: entry.currency,
            balance_before: entry.balance_before,
            balance_after: entry.balance_after,
            order_id: entry.order_id,
            created_at: entry.created_at,
        }
    }
}

/// Transfer response DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResponse {
    pub id: Uuid,
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: TransferStatus,
    pub bank_code: String,
    pub bank_account_number: String,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Transfer> for TransferResponse {
    fn from(transfer: Transfer) -> Self {
        Self {
            id: transfer.id,
            reference: transfer.reference,
            amount: transfer.amount,
            currency: transfer.currency,
            status: transfer.status,
            bank_code: transfer.bank_code,
            bank_account_number: transfer.bank_account_number,
            failure_reason: transfer.failure_reason,
            created_at: transfer.created_at,
            completed_at: transfer.completed_at,
        }
    }
}

/// Refund response DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub refund_type: RefundType,
    pub amount_refunded: Decimal,
    pub platform_share: Decimal,
    pub merchant_share: Decimal,
    pub currency: String,
    pub status: RefundStatus,
    pub created_at: DateTime<Utc>,
}

impl From<OrderRefund> for RefundResponse {
    fn from(refund: OrderRefund) -> Self {
        Self {
            id: refund.id,
            order_id: refund.order_id,
            refund_type: refund.refund_type,
            amount_refunded: refund.amount_refunded,
            platform_share: refund.platform_share,
            merchant_share: refund.merchant_share,
            currency: refund.currency,
            status: refund.status,
            created_at: refund.created_at,
        }
    }
}

/// Settlement run response DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRunResponse {
    pub released: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl From<SettlementRunReport> for SettlementRunResponse {
    fn from(report: SettlementRunReport) -> Self {
        Self {
            released: report.released,
            skipped: report.skipped,
            failed: report.failed,
        }
    }
}
