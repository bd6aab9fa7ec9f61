use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Whether a refund returns the whole order or part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "refund_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundType {
    Full,
    Partial,
}

/// Lifecycle of a refund request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "refund_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    Requested,
    Approved,
    Processing,
    Completed,
    Failed,
    Rejected,
}

impl RefundStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RefundStatus::Completed | RefundStatus::Failed | RefundStatus::Rejected
        )
    }

    /// Only completed refunds count against the order's refundable total.
    pub fn counts_as_refunded(&self) -> bool {
        matches!(self, RefundStatus::Completed)
    }
}

/// One refund against an order. An order can accumulate several partial
/// refunds; their completed amounts can never exceed the order total.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderRefund {
    pub id: Uuid,
    pub order_id: Uuid,
    pub merchant_id: Uuid,
    pub refund_type: RefundType,
    pub amount_requested: Decimal,
    pub amount_approved: Decimal,
    pub amount_refunded: Decimal,
    /// Platform's share of the refunded amount.
    pub platform_share: Decimal,
    /// Merchant's share of the refunded amount.
    pub merchant_share: Decimal,
    pub currency: String,
    pub reason: String,
    pub status: RefundStatus,
    /// Reference returned by the processor for the customer-facing refund.
    pub provider_refund_reference: Option<String>,
    /// Ledger reference of the merchant-side compensating debit.
    pub merchant_debit_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OrderRefund {
    pub fn new(
        order_id: Uuid,
        merchant_id: Uuid,
        refund_type: RefundType,
        amount_requested: Decimal,
        currency: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            merchant_id,
            refund_type,
            amount_requested,
            amount_approved: Decimal::ZERO,
            amount_refunded: Decimal::ZERO,
            platform_share: Decimal::ZERO,
            merchant_share: Decimal::ZERO,
            currency: currency.into(),
            reason: reason.into(),
            status: RefundStatus::Requested,
            provider_refund_reference: None,
            merchant_debit_reference: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Records the approved split. `platform + merchant` must equal `total`.
    pub fn approve(&mut self, total: Decimal, platform_share: Decimal, merchant_share: Decimal) {
        self.amount_approved = total;
        self.platform_share = platform_share;
        self.merchant_share = merchant_share;
        self.status = RefundStatus::Approved;
    }

    pub fn complete(&mut self, provider_reference: impl Into<String>) {
        self.amount_refunded = self.amount_approved;
        self.provider_refund_reference = Some(provider_reference.into());
        self.status = RefundStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self) {
        self.status = RefundStatus::Failed;
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn refund() -> OrderRefund {
        OrderRefund::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            RefundType::Full,
            dec!(10000),
            "NGN",
            "item damaged in transit",
        )
    }

    #[test]
    fn test_new_refund_requested() {
        let r = refund();
        assert_eq!(r.status, RefundStatus::Requested);
        assert_eq!(r.amount_refunded, Decimal::ZERO);
    }

    #[test]
    fn test_approve_then_complete() {
        let mut r = refund();
        r.approve(dec!(10000), dec!(500), dec!(9500));
        assert_eq!(r.status, RefundStatus::Approved);
        assert_eq!(r.platform_share + r.merchant_share, r.amount_approved);

        r.complete("PSK-REF-001");
        assert_eq!(r.status, RefundStatus::Completed);
        assert_eq!(r.amount_refunded, dec!(10000));
        assert!(r.completed_at.is_some());
        assert!(r.status.counts_as_refunded());
    }

    #[test]
    fn test_failed_refund_does_not_count() {
        let mut r = refund();
        r.approve(dec!(10000), dec!(500), dec!(9500));
        r.fail();
        assert_eq!(r.status, RefundStatus::Failed);
        assert!(r.status.is_terminal());
        assert!(!r.status.counts_as_refunded());
    }
}
