pub mod ledger_service;
pub mod reconciliation_service;
pub mod refund_service;
pub mod settlement_service;
pub mod transfer_service;
pub mod webhook_service;

pub use ledger_service::LedgerService;
pub use reconciliation_service::{ReconciliationReport, ReconciliationService};
pub use refund_service::{RefundRequest, RefundService};
pub use settlement_service::{
    calculate_settlement_amount, fee_split, platform_fee, SettlementRunReport, SettlementService,
};
pub use transfer_service::{TransferService, WithdrawalRequest};
pub use webhook_service::WebhookService;
