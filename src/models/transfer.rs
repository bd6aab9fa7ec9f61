use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Status machine for an outbound payout attempt:
/// pending → success | failed | otp_required → success | failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transfer_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Pending,
    OtpRequired,
    Success,
    Failed,
}

impl TransferStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Success | TransferStatus::Failed)
    }

    pub fn valid_transitions(&self) -> Vec<TransferStatus> {
        match self {
            TransferStatus::Pending => vec![
                TransferStatus::Success,
                TransferStatus::Failed,
                TransferStatus::OtpRequired,
            ],
            TransferStatus::OtpRequired => {
                vec![TransferStatus::Success, TransferStatus::Failed]
            }
            TransferStatus::Success | TransferStatus::Failed => vec![],
        }
    }

    pub fn can_transition(&self, to: TransferStatus) -> bool {
        self.valid_transitions().contains(&to)
    }
}

/// One payout attempt. The reference is unique and shared with the ledger
/// debit, so a retried orchestration with the same reference is rejected
/// rather than double-processed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transfer {
    pub id: Uuid,
    pub reference: String,
    pub wallet_owner_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: TransferStatus,
    pub bank_code: String,
    pub bank_account_number: String,
    pub bank_account_name: String,
    /// Recipient handle created at the processor.
    pub recipient_code: Option<String>,
    /// Processor transfer handle, needed to finalize an OTP-gated transfer.
    pub transfer_code: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transfer {
    pub fn new(
        reference: impl Into<String>,
        wallet_owner_id: Uuid,
        amount: Decimal,
        currency: impl Into<String>,
        bank_code: impl Into<String>,
        bank_account_number: impl Into<String>,
        bank_account_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            reference: reference.into(),
            wallet_owner_id,
            amount,
            currency: currency.into(),
            status: TransferStatus::Pending,
            bank_code: bank_code.into(),
            bank_account_number: bank_account_number.into(),
            bank_account_name: bank_account_name.into(),
            recipient_code: None,
            transfer_code: None,
            failure_reason: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_transfer_pending() {
        let t = Transfer::new(
            "TRF-001",
            Uuid::new_v4(),
            dec!(5000),
            "NGN",
            "058",
            "0123456789",
            "ADA OBI",
        );
        assert_eq!(t.status, TransferStatus::Pending);
        assert!(t.transfer_code.is_none());
    }

    #[test]
    fn test_transfer_state_machine() {
        assert!(TransferStatus::Pending.can_transition(TransferStatus::Success));
        assert!(TransferStatus::Pending.can_transition(TransferStatus::Failed));
        assert!(TransferStatus::Pending.can_transition(TransferStatus::OtpRequired));
        assert!(TransferStatus::OtpRequired.can_transition(TransferStatus::Success));
        assert!(TransferStatus::OtpRequired.can_transition(TransferStatus::Failed));
        assert!(!TransferStatus::Success.can_transition(TransferStatus::Failed));
        assert!(!TransferStatus::Failed.can_transition(TransferStatus::Pending));
        assert!(!TransferStatus::OtpRequired.can_transition(TransferStatus::Pending));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TransferStatus::Success.is_terminal());
        assert!(TransferStatus::Failed.is_terminal());
        assert!(!TransferStatus::Pending.is_terminal());
        assert!(!TransferStatus::OtpRequired.is_terminal());
    }
}
