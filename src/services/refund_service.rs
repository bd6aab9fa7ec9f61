use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::FeeSettings;
use crate::error::{AppError, Result};
use crate::models::{
    EntryKind, NewLedgerEntry, OrderRefund, OrderStatus, OrderWithItems, PaymentStatus,
    RefundType,
};
use crate::provider::PaymentProvider;
use crate::repositories::{InventoryRepository, OrderRepository, RefundRepository, WalletRepository};
use crate::services::settlement_service::fee_split;
use crate::services::LedgerService;

/// A refund request against an order.
#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub order_id: Uuid,
    pub refund_type: RefundType,
    /// Required for partial refunds; ignored for full refunds.
    pub amount: Option<Decimal>,
    pub reason: String,
}

/// Validates refund eligibility, computes the platform/merchant split,
/// orchestrates the external refund and the compensating ledger debits, and
/// restores inventory. The ledger writes, the refund record, and the order
/// status flip commit as one unit; restock is best-effort afterwards.
pub struct RefundService {
    pool: PgPool,
    ledger: Arc<LedgerService>,
    order_repo: OrderRepository,
    refund_repo: RefundRepository,
    wallet_repo: WalletRepository,
    inventory_repo: InventoryRepository,
    provider: Arc<dyn PaymentProvider>,
    fees: FeeSettings,
}

impl RefundService {
    pub fn new(
        pool: PgPool,
        ledger: Arc<LedgerService>,
        provider: Arc<dyn PaymentProvider>,
        fees: FeeSettings,
    ) -> Self {
        Self {
            ledger,
            order_repo: OrderRepository::new(pool.clone()),
            refund_repo: RefundRepository::new(pool.clone()),
            wallet_repo: WalletRepository::new(pool.clone()),
            inventory_repo: InventoryRepository::new(pool.clone()),
            provider,
            fees,
            pool,
        }
    }

    pub async fn process_refund(&self, request: RefundRequest) -> Result<OrderRefund> {
        let OrderWithItems { order, items } = self
            .order_repo
            .find_with_items(request.order_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Order '{}' not found", request.order_id))
            })?;

        let already_refunded = self.refund_repo.completed_total(order.id).await?;
        let total_refund =
            Self::eligible_amount(&request, order.total, order.is_paid(), already_refunded)?;

        let (platform_share, merchant_share) = fee_split(total_refund, self.fees.platform_fee_rate);

        // Make sure both paying wallets exist, and fail fast on an obviously
        // short merchant balance before anything external happens.
        self.wallet_repo
            .get_or_create(self.fees.platform_account_id, &order.currency)
            .await?;
        let merchant_wallet = self
            .wallet_repo
            .get_or_create(order.merchant_id, &order.currency)
            .await?;
        if !merchant_wallet.has_sufficient_funds(merchant_share) {
            return Err(AppError::InsufficientFunds {
                requested: merchant_share,
                available: merchant_wallet.available_balance,
            });
        }

        // The customer-facing refund at the processor. Partial refunds name
        // the amount; full refunds return the whole charge.
        let refund_amount = match request.refund_type {
            RefundType::Full => None,
            RefundType::Partial => Some(total_refund),
        };
        let initiation = self
            .provider
            .create_refund(&order.payment_reference, refund_amount)
            .await?;

        let mut refund = OrderRefund::new(
            order.id,
            order.merchant_id,
            request.refund_type,
            total_refund,
            order.currency.clone(),
            request.reason.clone(),
        );
        refund.approve(total_refund, platform_share, merchant_share);
        refund.complete(initiation.provider_reference.clone());

        let platform_reference = format!("RF-PLT-{}", refund.id.simple());
        let merchant_reference = format!("RF-MCH-{}", refund.id.simple());
        refund.merchant_debit_reference = Some(merchant_reference.clone());

        // One atomic unit: both compensating debits, the refund record, and
        // (for full refunds) the order status flip.
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        self.ledger
            .record_entry_in(
                &mut tx,
                NewLedgerEntry::debit(
                    platform_reference,
                    EntryKind::Refund,
                    platform_share,
                    order.currency.clone(),
                )
                .for_user(self.fees.platform_account_id)
                .for_order(order.id)
                .with_provider_reference(initiation.provider_reference.clone()),
            )
            .await?;

        self.ledger
            .record_entry_in(
                &mut tx,
                NewLedgerEntry::debit(
                    merchant_reference,
                    EntryKind::Refund,
                    merchant_share,
                    order.currency.clone(),
                )
                .for_merchant(order.merchant_id)
                .for_order(order.id)
                .with_provider_reference(initiation.provider_reference.clone()),
            )
            .await?;

        let refund = self.refund_repo.insert_in(&mut tx, &refund).await?;

        match request.refund_type {
            RefundType::Full => {
                self.order_repo
                    .update_status_in(&mut tx, order.id, OrderStatus::Refunded, PaymentStatus::Refunded)
                    .await?;
            }
            RefundType::Partial => {
                self.order_repo
                    .update_status_in(
                        &mut tx,
                        order.id,
                        order.status,
                        PaymentStatus::PartiallyRefunded,
                    )
                    .await?;
            }
        }

        tx.commit().await.map_err(AppError::Database)?;

        info!(
            order_id = %order.id,
            refund_id = %refund.id,
            total = %total_refund,
            platform = %platform_share,
            merchant = %merchant_share,
            "refund completed"
        );

        // Restock is best-effort: a failure here is logged, never surfaced.
        if request.refund_type == RefundType::Full {
            for item in &items {
                if let Err(e) = self
                    .inventory_repo
                    .increment_stock(item.product_id, item.quantity)
                    .await
                {
                    warn!(
                        product_id = %item.product_id,
                        quantity = item.quantity,
                        error = %e,
                        "inventory restock failed"
                    );
                }
            }
        }

        Ok(refund)
    }

    /// Eligibility rules: the order must be paid, must not already be fully
    /// refunded, and a partial request cannot exceed what is left.
    fn eligible_amount(
        request: &RefundRequest,
        order_total: Decimal,
        order_paid: bool,
        already_refunded: Decimal,
    ) -> Result<Decimal> {
        if !order_paid {
            return Err(AppError::Validation(
                "order has not been paid, nothing to refund".to_string(),
            ));
        }

        let remaining = order_total - already_refunded;
        if remaining <= Decimal::ZERO {
            return Err(AppError::Validation(
                "order is already fully refunded".to_string(),
            ));
        }

        match request.refund_type {
            RefundType::Full => {
                if already_refunded > Decimal::ZERO {
                    return Err(AppError::Validation(
                        "order has partial refunds; request a partial refund for the remainder"
                            .to_string(),
                    ));
                }
                Ok(order_total)
            }
            RefundType::Partial => {
                let amount = request.amount.ok_or_else(|| {
                    AppError::Validation("partial refunds require an amount".to_string())
                })?;
                if amount <= Decimal::ZERO {
                    return Err(AppError::Validation(
                        "refund amount must be positive".to_string(),
                    ));
                }
                if amount > remaining {
                    return Err(AppError::Validation(format!(
                        "refund amount {amount} exceeds refundable remainder {remaining}"
                    )));
                }
                Ok(amount)
            }
        }
    }

    pub async fn refunds_for_order(&self, order_id: Uuid) -> Result<Vec<OrderRefund>> {
        self.refund_repo.find_by_order(order_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn full_request() -> RefundRequest {
        RefundRequest {
            order_id: Uuid::new_v4(),
            refund_type: RefundType::Full,
            amount: None,
            reason: "damaged".to_string(),
        }
    }

    fn partial_request(amount: Decimal) -> RefundRequest {
        RefundRequest {
            order_id: Uuid::new_v4(),
            refund_type: RefundType::Partial,
            amount: Some(amount),
            reason: "one item returned".to_string(),
        }
    }

    #[test]
    fn test_unpaid_order_rejected() {
        let result =
            RefundService::eligible_amount(&full_request(), dec!(10000), false, Decimal::ZERO);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_full_refund_amount_is_order_total() {
        let amount =
            RefundService::eligible_amount(&full_request(), dec!(10000), true, Decimal::ZERO)
                .unwrap();
        assert_eq!(amount, dec!(10000));
    }

    #[test]
    fn test_full_refund_rejected_after_partial() {
        let result =
            RefundService::eligible_amount(&full_request(), dec!(10000), true, dec!(2000));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_fully_refunded_order_rejected() {
        let result = RefundService::eligible_amount(
            &partial_request(dec!(1)),
            dec!(10000),
            true,
            dec!(10000),
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_partial_bounded_by_remainder() {
        // 10,000 order with 6,000 already refunded leaves 4,000.
        let ok = RefundService::eligible_amount(
            &partial_request(dec!(4000)),
            dec!(10000),
            true,
            dec!(6000),
        );
        assert_eq!(ok.unwrap(), dec!(4000));

        let too_much = RefundService::eligible_amount(
            &partial_request(dec!(4000.01)),
            dec!(10000),
            true,
            dec!(6000),
        );
        assert!(matches!(too_much, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_partial_requires_amount() {
        let mut request = partial_request(dec!(100));
        request.amount = None;
        let result = RefundService::eligible_amount(&request, dec!(10000), true, Decimal::ZERO);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
