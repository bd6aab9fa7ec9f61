use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// What kind of money movement an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entry_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    /// Customer payment for an order.
    OrderPayment,
    /// Merchant's net share of a paid order.
    Settlement,
    /// Outbound payout from a wallet to a bank account.
    Withdrawal,
    /// Money returned to a customer.
    Refund,
    /// Inbound top-up of a wallet via its virtual account.
    WalletFunding,
    /// Platform or processor fee.
    Fee,
    /// Scheduled merchant payout.
    Payout,
}

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entry_flow", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryFlow {
    /// Increases the wallet balance.
    Credit,
    /// Decreases the wallet balance.
    Debit,
}

impl EntryFlow {
    /// Returns the opposite flow, used when building compensating entries.
    pub fn opposite(&self) -> Self {
        match self {
            EntryFlow::Credit => EntryFlow::Debit,
            EntryFlow::Debit => EntryFlow::Credit,
        }
    }

    /// Sign applied to the net amount when computing a running balance.
    pub fn sign(&self) -> i32 {
        match self {
            EntryFlow::Credit => 1,
            EntryFlow::Debit => -1,
        }
    }
}

/// Lifecycle status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entry_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Pending,
    Success,
    Failed,
    Reversed,
}

impl EntryStatus {
    /// Returns true once the entry can no longer change status, except for
    /// the success→reversed compensation transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EntryStatus::Success | EntryStatus::Failed | EntryStatus::Reversed
        )
    }

    /// Valid next statuses. Entries are append-only: pending resolves once,
    /// and a successful entry may later be flagged reversed by a
    /// compensating entry. History is never rewritten.
    pub fn valid_transitions(&self) -> Vec<EntryStatus> {
        match self {
            EntryStatus::Pending => vec![EntryStatus::Success, EntryStatus::Failed],
            EntryStatus::Success => vec![EntryStatus::Reversed],
            EntryStatus::Failed => vec![],
            EntryStatus::Reversed => vec![],
        }
    }

    pub fn can_transition(&self, to: EntryStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Whether this entry contributed to the wallet balance. A reversed
    /// entry did move money; its effect is cancelled by the explicit
    /// compensating entry, not by excluding it from history.
    pub fn affects_balance(&self) -> bool {
        matches!(self, EntryStatus::Success | EntryStatus::Reversed)
    }
}

/// One immutable record of a single money movement, with the wallet balance
/// snapshot taken at write time. Source of truth for all balances.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    /// Unique reference for this movement. Reused as the provider-side
    /// reference so retried operations collide instead of double-applying.
    pub reference: String,
    pub user_id: Option<Uuid>,
    pub merchant_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub kind: EntryKind,
    pub flow: EntryFlow,
    pub status: EntryStatus,
    /// Gross amount of the movement.
    pub amount: Decimal,
    /// Fee charged on this movement.
    pub fee: Decimal,
    /// Net amount applied to the balance (amount - fee).
    pub net_amount: Decimal,
    pub currency: String,
    /// Wallet balance before this entry was applied.
    pub balance_before: Decimal,
    /// Wallet balance after this entry was applied.
    pub balance_after: Decimal,
    /// Reference assigned by the external processor, when one exists.
    pub provider_reference: Option<String>,
    /// Back-reference to the entry this one compensates.
    pub reversal_of: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Signed net amount: positive for credits, negative for debits.
    pub fn signed_net_amount(&self) -> Decimal {
        match self.flow {
            EntryFlow::Credit => self.net_amount,
            EntryFlow::Debit => -self.net_amount,
        }
    }

    /// The wallet this entry belongs to: a user wallet or a merchant wallet.
    pub fn owner_id(&self) -> Option<Uuid> {
        self.user_id.or(self.merchant_id)
    }

    pub fn is_reversal(&self) -> bool {
        self.reversal_of.is_some()
    }
}

/// The wallet owner an entry is recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOwner {
    User(Uuid),
    Merchant(Uuid),
}

impl EntryOwner {
    pub fn id(&self) -> Uuid {
        match self {
            EntryOwner::User(id) | EntryOwner::Merchant(id) => *id,
        }
    }
}

/// Input for recording a new ledger entry. The ledger service fills in the
/// balance snapshot and status at write time.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub reference: String,
    pub user_id: Option<Uuid>,
    pub merchant_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub kind: EntryKind,
    pub flow: EntryFlow,
    pub amount: Decimal,
    pub fee: Decimal,
    pub currency: String,
    pub provider_reference: Option<String>,
    pub reversal_of: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
}

impl NewLedgerEntry {
    pub fn credit(
        reference: impl Into<String>,
        kind: EntryKind,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self::new(reference, kind, EntryFlow::Credit, amount, currency)
    }

    pub fn debit(
        reference: impl Into<String>,
        kind: EntryKind,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self::new(reference, kind, EntryFlow::Debit, amount, currency)
    }

    fn new(
        reference: impl Into<String>,
        kind: EntryKind,
        flow: EntryFlow,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            reference: reference.into(),
            user_id: None,
            merchant_id: None,
            order_id: None,
            kind,
            flow,
            amount,
            fee: Decimal::ZERO,
            currency: currency.into(),
            provider_reference: None,
            reversal_of: None,
            metadata: None,
        }
    }

    pub fn for_owner(self, owner: EntryOwner) -> Self {
        match owner {
            EntryOwner::User(id) => self.for_user(id),
            EntryOwner::Merchant(id) => self.for_merchant(id),
        }
    }

    pub fn for_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn for_merchant(mut self, merchant_id: Uuid) -> Self {
        self.merchant_id = Some(merchant_id);
        self
    }

    pub fn for_order(mut self, order_id: Uuid) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_provider_reference(mut self, reference: impl Into<String>) -> Self {
        self.provider_reference = Some(reference.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Net amount applied to the balance.
    pub fn net_amount(&self) -> Decimal {
        self.amount - self.fee
    }

    /// The wallet owner this entry targets.
    pub fn owner_id(&self) -> Option<Uuid> {
        self.user_id.or(self.merchant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_flow_opposite() {
        assert_eq!(EntryFlow::Credit.opposite(), EntryFlow::Debit);
        assert_eq!(EntryFlow::Debit.opposite(), EntryFlow::Credit);
    }

    #[test]
    fn test_flow_sign() {
        assert_eq!(EntryFlow::Credit.sign(), 1);
        assert_eq!(EntryFlow::Debit.sign(), -1);
    }

    #[test]
    fn test_status_transitions() {
        assert!(EntryStatus::Pending.can_transition(EntryStatus::Success));
        assert!(EntryStatus::Pending.can_transition(EntryStatus::Failed));
        assert!(EntryStatus::Success.can_transition(EntryStatus::Reversed));
        assert!(!EntryStatus::Failed.can_transition(EntryStatus::Success));
        assert!(!EntryStatus::Reversed.can_transition(EntryStatus::Pending));
        assert!(!EntryStatus::Pending.can_transition(EntryStatus::Reversed));
    }

    #[test]
    fn test_status_affects_balance() {
        assert!(EntryStatus::Success.affects_balance());
        assert!(EntryStatus::Reversed.affects_balance());
        assert!(!EntryStatus::Pending.affects_balance());
        assert!(!EntryStatus::Failed.affects_balance());
    }

    #[test]
    fn test_new_entry_net_amount() {
        let entry = NewLedgerEntry::credit("STL-001", EntryKind::Settlement, dec!(10000), "NGN")
            .with_fee(dec!(150));
        assert_eq!(entry.net_amount(), dec!(9850));
    }

    #[test]
    fn test_new_entry_owner_prefers_user() {
        let user = Uuid::new_v4();
        let merchant = Uuid::new_v4();
        let entry = NewLedgerEntry::debit("WDR-001", EntryKind::Withdrawal, dec!(50), "NGN")
            .for_user(user)
            .for_merchant(merchant);
        assert_eq!(entry.owner_id(), Some(user));
    }

    #[test]
    fn test_builder_fields() {
        let order_id = Uuid::new_v4();
        let entry = NewLedgerEntry::credit("STL-002", EntryKind::Settlement, dec!(500), "NGN")
            .for_order(order_id)
            .with_provider_reference("PSK-123")
            .with_metadata(serde_json::json!({"channel": "card"}));

        assert_eq!(entry.order_id, Some(order_id));
        assert_eq!(entry.provider_reference.as_deref(), Some("PSK-123"));
        assert!(entry.metadata.is_some());
        assert_eq!(entry.flow, EntryFlow::Credit);
    }
}
