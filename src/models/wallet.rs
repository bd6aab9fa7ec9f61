use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle status of a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "wallet_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletStatus {
    /// Created but no virtual account assigned yet.
    Pending,
    Active,
    Inactive,
    Suspended,
    Closed,
}

impl WalletStatus {
    /// Whether the wallet can take part in money movements.
    pub fn is_operational(&self) -> bool {
        matches!(self, WalletStatus::Active)
    }
}

/// One wallet per owner (user or merchant). The balances are a materialized
/// cache of the ledger: available_balance must always equal the sum of
/// applied credits minus applied debits for this owner.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub currency: String,
    /// Balance available for immediate use.
    pub available_balance: Decimal,
    /// Balance awaiting settlement or hold expiry.
    pub pending_balance: Decimal,
    /// Running ledger balance (available + pending).
    pub ledger_balance: Decimal,
    pub status: WalletStatus,
    /// Virtual account issued by the processor, once assigned.
    pub account_number: Option<String>,
    pub bank_name: Option<String>,
    /// Processor-side customer handle used to match webhook events.
    pub provider_customer_code: Option<String>,
    /// Version for optimistic locking on non-balance updates.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(owner_id: Uuid, currency: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            currency: currency.into(),
            available_balance: Decimal::ZERO,
            pending_balance: Decimal::ZERO,
            ledger_balance: Decimal::ZERO,
            status: WalletStatus::Pending,
            account_number: None,
            bank_name: None,
            provider_customer_code: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_sufficient_funds(&self, amount: Decimal) -> bool {
        self.available_balance >= amount
    }

    /// Attaches an issued virtual account and activates the wallet.
    pub fn attach_virtual_account(
        &mut self,
        account_number: impl Into<String>,
        bank_name: impl Into<String>,
    ) {
        self.account_number = Some(account_number.into());
        self.bank_name = Some(bank_name.into());
        self.status = WalletStatus::Active;
        self.version += 1;
        self.updated_at = Utc::now();
    }
}
