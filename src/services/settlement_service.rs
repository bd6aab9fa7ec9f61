use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SettlementSettings;
use crate::error::Result;
use crate::models::{
    EntryKind, EntryOwner, Order, Settlement, SettlementSchedule, TransferStatus,
};
use crate::repositories::SettlementRepository;
use crate::services::transfer_service::{TransferService, WithdrawalRequest};

/// Platform's cut of an amount, rounded half-up to 2 decimal places.
pub fn platform_fee(amount: Decimal, platform_fee_rate: Decimal) -> Decimal {
    (amount * platform_fee_rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Splits a total into (platform share, merchant share). The merchant share
/// is the exact remainder, so the two always sum to the total.
pub fn fee_split(total: Decimal, platform_fee_rate: Decimal) -> (Decimal, Decimal) {
    let platform = platform_fee(total, platform_fee_rate);
    (platform, total - platform)
}

/// The merchant payout for an order: gross minus platform fee minus
/// processor fee, never negative.
pub fn calculate_settlement_amount(
    order_amount: Decimal,
    platform_fee_rate: Decimal,
    gateway_fee: Decimal,
) -> Decimal {
    let amount = order_amount - platform_fee(order_amount, platform_fee_rate) - gateway_fee;
    amount.max(Decimal::ZERO)
}

/// Outcome of one due-settlement run.
#[derive(Debug, Default, Clone, Copy)]
pub struct SettlementRunReport {
    pub released: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Computes merchant settlements and releases the due ones. A settlement is
/// only released when the merchant's accumulated unsettled total meets the
/// configured minimum and the hold period has elapsed since the qualifying
/// payment event.
pub struct SettlementService {
    settlement_repo: SettlementRepository,
    transfer_service: Arc<TransferService>,
    settings: SettlementSettings,
}

impl SettlementService {
    pub fn new(
        pool: PgPool,
        transfer_service: Arc<TransferService>,
        settings: SettlementSettings,
    ) -> Self {
        Self {
            settlement_repo: SettlementRepository::new(pool),
            transfer_service,
            settings,
        }
    }

    /// Builds and persists the settlement owed for a freshly paid order.
    pub async fn create_for_order(
        &self,
        order: &Order,
        platform_fee_rate: Decimal,
        gateway_fee: Decimal,
    ) -> Result<Settlement> {
        let fee = platform_fee(order.total, platform_fee_rate);
        let amount = calculate_settlement_amount(order.total, platform_fee_rate, gateway_fee);

        let settlement = Settlement::new(
            order.id,
            order.merchant_id,
            order.total,
            fee,
            gateway_fee,
            amount,
            order.currency.clone(),
            self.settings.default_schedule,
        );

        self.settlement_repo.create(&settlement).await
    }

    pub async fn find_by_order(&self, order_id: uuid::Uuid) -> Result<Option<Settlement>> {
        self.settlement_repo.find_by_order(order_id).await
    }

    /// When the next automatic run covers a schedule, counted from `from`.
    pub fn next_settlement_date(
        &self,
        schedule: SettlementSchedule,
        from: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        schedule.next_settlement_date(from)
    }

    /// Releases every due settlement. `include_manual` distinguishes the
    /// operator-triggered run from the scheduled one. The minimum-amount
    /// threshold is judged against each merchant's unsettled total as of the
    /// start of the run: once a merchant qualifies, all their due
    /// settlements release together.
    pub async fn run_due_settlements(&self, include_manual: bool) -> Result<SettlementRunReport> {
        let now = Utc::now();
        let mut report = SettlementRunReport::default();
        let mut unsettled_at_start: HashMap<Uuid, Decimal> = HashMap::new();

        let candidates = self
            .settlement_repo
            .find_releasable(self.settings.max_retries, now)
            .await?;

        for settlement in candidates {
            if settlement.schedule == SettlementSchedule::Manual && !include_manual {
                report.skipped += 1;
                continue;
            }
            if !settlement.hold_elapsed(self.settings.hold_period_days, now) {
                report.skipped += 1;
                continue;
            }

            let unsettled = match unsettled_at_start.get(&settlement.merchant_id) {
                Some(total) => *total,
                None => {
                    let total = self
                        .settlement_repo
                        .unsettled_total(settlement.merchant_id)
                        .await?;
                    unsettled_at_start.insert(settlement.merchant_id, total);
                    total
                }
            };
            if unsettled < self.settings.minimum_settlement_amount {
                info!(
                    merchant_id = %settlement.merchant_id,
                    unsettled = %unsettled,
                    minimum = %self.settings.minimum_settlement_amount,
                    "merchant below minimum settlement amount, skipping"
                );
                report.skipped += 1;
                continue;
            }

            let (Some(bank_code), Some(account_number), Some(account_name)) = (
                settlement.bank_code.clone(),
                settlement.bank_account_number.clone(),
                settlement.bank_account_name.clone(),
            ) else {
                warn!(
                    settlement_id = %settlement.id,
                    "settlement has no destination bank account, skipping"
                );
                report.skipped += 1;
                continue;
            };

            match self.release(&settlement, bank_code, account_number, account_name).await {
                Ok(true) => report.released += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!(settlement_id = %settlement.id, error = %e, "settlement release failed");
                    let next_retry = now + Self::retry_backoff(settlement.retry_count);
                    self.settlement_repo
                        .mark_failed(settlement.id, next_retry)
                        .await?;
                    report.failed += 1;
                }
            }
        }

        info!(
            released = report.released,
            skipped = report.skipped,
            failed = report.failed,
            "settlement run complete"
        );
        Ok(report)
    }

    async fn release(
        &self,
        settlement: &Settlement,
        bank_code: String,
        account_number: String,
        account_name: String,
    ) -> Result<bool> {
        // The reference is scoped to this attempt: a duplicate run of the
        // same attempt collides at the ledger instead of paying twice, while
        // a later retry (whose failed debit was already reversed) gets a
        // fresh reference.
        let reference = format!(
            "PAYOUT-{}-{}",
            settlement.id.simple(),
            settlement.retry_count
        );
        self.settlement_repo
            .mark_processing(settlement.id, &reference)
            .await?;

        let transfer = self
            .transfer_service
            .initiate_with_reference(
                WithdrawalRequest {
                    owner: EntryOwner::Merchant(settlement.merchant_id),
                    amount: settlement.settlement_amount,
                    currency: settlement.currency.clone(),
                    kind: EntryKind::Payout,
                    bank_code,
                    account_number,
                    account_name,
                    reason: Some(format!("Settlement for order {}", settlement.order_id)),
                },
                reference,
            )
            .await?;

        match transfer.status {
            TransferStatus::Success => {
                self.settlement_repo.mark_completed(settlement.id).await?;
                Ok(true)
            }
            // OTP-gated payouts stay in processing until finalized.
            TransferStatus::OtpRequired => Ok(false),
            _ => Ok(false),
        }
    }

    /// Exponential backoff for failed releases, capped at a day.
    fn retry_backoff(retry_count: i32) -> Duration {
        let minutes = 30i64.saturating_mul(1 << retry_count.clamp(0, 10));
        Duration::minutes(minutes.min(24 * 60))
    }
}
