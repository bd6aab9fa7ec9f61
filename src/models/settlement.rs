use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Status of a merchant settlement in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "settlement_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl SettlementStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, SettlementStatus::Completed | SettlementStatus::Cancelled)
    }

    /// Failed settlements stay eligible until the retry cap parks them.
    pub fn can_release(&self) -> bool {
        matches!(self, SettlementStatus::Pending | SettlementStatus::Failed)
    }
}

/// How often a merchant's settlements are released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "settlement_schedule", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementSchedule {
    Instant,
    Daily,
    Weekly,
    Monthly,
    Manual,
}

impl SettlementSchedule {
    /// Next release time after `from`. Manual schedules are never released
    /// automatically.
    pub fn next_settlement_date(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            SettlementSchedule::Instant => Some(from),
            SettlementSchedule::Daily => Some(from + chrono::Duration::days(1)),
            SettlementSchedule::Weekly => Some(from + chrono::Duration::days(7)),
            SettlementSchedule::Monthly => from.checked_add_months(Months::new(1)),
            SettlementSchedule::Manual => None,
        }
    }
}

/// The merchant payout owed for one order: gross minus platform fee minus
/// processor fee.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Settlement {
    pub id: Uuid,
    pub order_id: Uuid,
    pub merchant_id: Uuid,
    pub order_amount: Decimal,
    pub platform_fee: Decimal,
    pub gateway_fee: Decimal,
    /// order_amount - platform_fee - gateway_fee, never negative.
    pub settlement_amount: Decimal,
    pub currency: String,
    pub status: SettlementStatus,
    pub schedule: SettlementSchedule,
    /// Destination bank for the payout.
    pub bank_code: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_account_name: Option<String>,
    /// Reference of the payout transfer once one is initiated.
    pub transfer_reference: Option<String>,
    pub retry_count: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    /// The qualifying payment event; the hold period counts from here.
    pub qualified_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Settlement {
    pub fn new(
        order_id: Uuid,
        merchant_id: Uuid,
        order_amount: Decimal,
        platform_fee: Decimal,
        gateway_fee: Decimal,
        settlement_amount: Decimal,
        currency: impl Into<String>,
        schedule: SettlementSchedule,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            merchant_id,
            order_amount,
            platform_fee,
            gateway_fee,
            settlement_amount,
            currency: currency.into(),
            status: SettlementStatus::Pending,
            schedule,
            bank_code: None,
            bank_account_number: None,
            bank_account_name: None,
            transfer_reference: None,
            retry_count: 0,
            next_retry_at: None,
            qualified_at: now,
            created_at: now,
            settled_at: None,
        }
    }

    pub fn with_bank_account(
        mut self,
        bank_code: impl Into<String>,
        account_number: impl Into<String>,
        account_name: impl Into<String>,
    ) -> Self {
        self.bank_code = Some(bank_code.into());
        self.bank_account_number = Some(account_number.into());
        self.bank_account_name = Some(account_name.into());
        self
    }

    /// Whether the hold period has elapsed since the qualifying event.
    pub fn hold_elapsed(&self, hold_period_days: i64, now: DateTime<Utc>) -> bool {
        now - self.qualified_at >= chrono::Duration::days(hold_period_days)
    }

    /// Whether a retry is currently allowed.
    pub fn retry_due(&self, now: DateTime<Utc>) -> bool {
        match self.next_retry_at {
            Some(at) => now >= at,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn settlement() -> Settlement {
        Settlement::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(10000),
            dec!(500),
            dec!(150),
            dec!(9350),
            "NGN",
            SettlementSchedule::Daily,
        )
    }

    #[test]
    fn test_new_settlement_pending() {
        let s = settlement();
        assert_eq!(s.status, SettlementStatus::Pending);
        assert_eq!(s.retry_count, 0);
        assert!(s.settled_at.is_none());
    }

    #[test]
    fn test_schedule_next_dates() {
        let from = Utc::now();
        assert_eq!(
            SettlementSchedule::Instant.next_settlement_date(from),
            Some(from)
        );
        assert_eq!(
            SettlementSchedule::Daily.next_settlement_date(from),
            Some(from + chrono::Duration::days(1))
        );
        assert_eq!(
            SettlementSchedule::Weekly.next_settlement_date(from),
            Some(from + chrono::Duration::days(7))
        );
        assert!(SettlementSchedule::Monthly.next_settlement_date(from).is_some());
        assert_eq!(SettlementSchedule::Manual.next_settlement_date(from), None);
    }

    #[test]
    fn test_hold_elapsed() {
        let mut s = settlement();
        s.qualified_at = Utc::now() - chrono::Duration::days(3);
        assert!(s.hold_elapsed(2, Utc::now()));
        assert!(!s.hold_elapsed(7, Utc::now()));
    }

    #[test]
    fn test_retry_due() {
        let mut s = settlement();
        assert!(s.retry_due(Utc::now()));
        s.next_retry_at = Some(Utc::now() + chrono::Duration::hours(1));
        assert!(!s.retry_due(Utc::now()));
        s.next_retry_at = Some(Utc::now() - chrono::Duration::hours(1));
        assert!(s.retry_due(Utc::now()));
    }

    #[test]
    fn test_status_release_eligibility() {
        assert!(SettlementStatus::Pending.can_release());
        assert!(SettlementStatus::Failed.can_release());
        assert!(!SettlementStatus::Processing.can_release());
        assert!(!SettlementStatus::Completed.can_release());
        assert!(SettlementStatus::Completed.is_final());
        assert!(!SettlementStatus::Failed.is_final());
    }
}
