use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::FeeSettings;
use crate::error::{AppError, Result};
use crate::models::{EntryKind, EntryStatus, NewLedgerEntry, OrderStatus, RefundStatus};
use crate::provider::WebhookEvent;
use crate::repositories::{OrderRepository, RefundRepository, WalletRepository};
use crate::services::settlement_service::platform_fee;
use crate::services::{LedgerService, SettlementService, TransferService};

/// Applies asynchronous processor callbacks to orders, wallets, and the
/// ledger. Every handler is safe to invoke more than once with the same
/// payload: the guard is always "check current terminal state before
/// mutating". Unknown events are logged and ignored.
pub struct WebhookService {
    ledger: Arc<LedgerService>,
    transfer_service: Arc<TransferService>,
    settlement_service: Arc<SettlementService>,
    order_repo: OrderRepository,
    wallet_repo: WalletRepository,
    refund_repo: RefundRepository,
    fees: FeeSettings,
}

impl WebhookService {
    pub fn new(
        pool: PgPool,
        ledger: Arc<LedgerService>,
        transfer_service: Arc<TransferService>,
        settlement_service: Arc<SettlementService>,
        fees: FeeSettings,
    ) -> Self {
        Self {
            ledger,
            transfer_service,
            settlement_service,
            order_repo: OrderRepository::new(pool.clone()),
            wallet_repo: WalletRepository::new(pool.clone()),
            refund_repo: RefundRepository::new(pool),
            fees,
        }
    }

    /// Dispatches one event. Errors propagate to the caller for logging
    /// only; the HTTP acknowledgement has already been decided by then.
    pub async fn process(&self, event: WebhookEvent) -> Result<()> {
        match event {
            WebhookEvent::PaymentSucceeded {
                reference,
                amount,
                fees,
            } => self.handle_payment_succeeded(&reference, amount, fees).await,
            WebhookEvent::WalletFunded {
                provider_reference,
                customer_code,
                amount,
            } => {
                self.handle_wallet_funded(&provider_reference, &customer_code, amount)
                    .await
            }
            WebhookEvent::VirtualAccountAssigned {
                customer_code,
                account_number,
                bank_name,
            } => {
                self.handle_virtual_account_assigned(&customer_code, &account_number, &bank_name)
                    .await
            }
            WebhookEvent::TransferSucceeded { reference } => {
                self.handle_transfer_succeeded(&reference).await
            }
            WebhookEvent::TransferFailed { reference, reason } => {
                self.handle_transfer_failed(&reference, reason.as_deref())
                    .await
            }
            WebhookEvent::RefundProcessed { provider_reference } => {
                self.handle_refund_terminal(&provider_reference, RefundStatus::Completed)
                    .await
            }
            WebhookEvent::RefundFailed { provider_reference } => {
                self.handle_refund_terminal(&provider_reference, RefundStatus::Failed)
                    .await
            }
            WebhookEvent::Unknown { event } => {
                warn!(event, "ignoring unrecognized webhook event");
                Ok(())
            }
        }
    }

    /// A paid order: mark it, record the merchant's settlement credit, and
    /// open the settlement that will later pay the merchant out.
    async fn handle_payment_succeeded(
        &self,
        reference: &str,
        _amount: Decimal,
        gateway_fee: Decimal,
    ) -> Result<()> {
        let Some(order) = self.order_repo.find_by_payment_reference(reference).await? else {
            warn!(reference, "payment event for unknown order");
            return Ok(());
        };

        if order.is_paid() {
            info!(reference, order_id = %order.id, "order already paid, ignoring replay");
            return Ok(());
        }

        let order = self.order_repo.mark_paid(order.id, OrderStatus::Processing).await?;

        // A racing duplicate delivery may have created the settlement first.
        let settlement = match self
            .settlement_service
            .create_for_order(&order, self.fees.platform_fee_rate, gateway_fee)
            .await
        {
            Ok(settlement) => settlement,
            Err(AppError::Conflict(_)) => self
                .settlement_service
                .find_by_order(order.id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Settlement for order '{}' not found", order.id))
                })?,
            Err(e) => return Err(e),
        };

        // The settlement credit: gross order total less the platform and
        // gateway shares, landing in the merchant wallet.
        self.wallet_repo
            .get_or_create(order.merchant_id, &order.currency)
            .await?;

        // Fees can only eat the whole order, never more; the settlement
        // amount is clamped at zero the same way.
        let fee = (platform_fee(order.total, self.fees.platform_fee_rate) + gateway_fee)
            .min(order.total);
        let credit = NewLedgerEntry::credit(
            format!("STL-{}", order.id.simple()),
            EntryKind::Settlement,
            order.total,
            order.currency.clone(),
        )
        .for_merchant(order.merchant_id)
        .for_order(order.id)
        .with_fee(fee)
        .with_provider_reference(reference);

        match self.ledger.record_entry(credit).await {
            Ok(entry) => {
                info!(
                    order_id = %order.id,
                    settlement_id = %settlement.id,
                    net = %entry.net_amount,
                    "settlement credit recorded"
                );
                Ok(())
            }
            // A racing replay already wrote the credit.
            Err(AppError::Conflict(_)) => {
                info!(order_id = %order.id, "settlement credit already recorded");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Money arrived in a dedicated virtual account: one funding credit,
    /// keyed by the processor's reference so replays collide.
    async fn handle_wallet_funded(
        &self,
        provider_reference: &str,
        customer_code: &str,
        amount: Decimal,
    ) -> Result<()> {
        let Some(wallet) = self.wallet_repo.find_by_customer_code(customer_code).await? else {
            warn!(customer_code, "funding event for unknown wallet");
            return Ok(());
        };

        let credit = NewLedgerEntry::credit(
            format!("FND-{provider_reference}"),
            EntryKind::WalletFunding,
            amount,
            wallet.currency.clone(),
        )
        .for_user(wallet.owner_id)
        .with_provider_reference(provider_reference);

        match self.ledger.record_entry(credit).await {
            Ok(entry) => {
                info!(
                    owner_id = %wallet.owner_id,
                    amount = %entry.net_amount,
                    "wallet funding credited"
                );
                Ok(())
            }
            Err(AppError::Conflict(_)) => {
                info!(provider_reference, "funding already credited, ignoring replay");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn handle_virtual_account_assigned(
        &self,
        customer_code: &str,
        account_number: &str,
        bank_name: &str,
    ) -> Result<()> {
        let Some(wallet) = self.wallet_repo.find_by_customer_code(customer_code).await? else {
            warn!(customer_code, "virtual account event for unknown wallet");
            return Ok(());
        };

        self.wallet_repo
            .attach_virtual_account(wallet.id, account_number, bank_name, customer_code)
            .await?;
        info!(owner_id = %wallet.owner_id, "virtual account attached, wallet active");
        Ok(())
    }

    async fn handle_transfer_succeeded(&self, reference: &str) -> Result<()> {
        let Some(transfer) = self.transfer_service.find_by_reference(reference).await? else {
            warn!(reference, "transfer event for unknown transfer");
            return Ok(());
        };

        if transfer.status.is_terminal() {
            info!(reference, status = ?transfer.status, "transfer already terminal");
            return Ok(());
        }

        self.transfer_service.confirm_success(&transfer).await?;
        info!(reference, "transfer confirmed successful");
        Ok(())
    }

    /// A failed transfer keeps its debit until compensation runs; this path
    /// shares the saga's compensation so webhook and local failure handling
    /// cannot double-credit.
    async fn handle_transfer_failed(&self, reference: &str, reason: Option<&str>) -> Result<()> {
        let Some(transfer) = self.transfer_service.find_by_reference(reference).await? else {
            warn!(reference, "transfer event for unknown transfer");
            return Ok(());
        };

        if transfer.status.is_terminal() {
            info!(reference, status = ?transfer.status, "transfer already terminal");
            return Ok(());
        }

        self.transfer_service
            .fail_with_compensation(&transfer, reason.unwrap_or("transfer failed at provider"))
            .await?;
        info!(reference, "transfer failure applied");
        Ok(())
    }

    /// Terminal refund confirmation from the processor. A failure also
    /// unwinds the two compensating debits written when the refund ran.
    async fn handle_refund_terminal(
        &self,
        provider_reference: &str,
        status: RefundStatus,
    ) -> Result<()> {
        let Some(refund) = self
            .refund_repo
            .find_by_provider_reference(provider_reference)
            .await?
        else {
            warn!(provider_reference, "refund event for unknown refund");
            return Ok(());
        };

        if refund.status == status {
            info!(provider_reference, status = ?status, "refund already in state");
            return Ok(());
        }
        if refund.status.is_terminal() && status == RefundStatus::Completed {
            // Completed-after-failed never applies; failed-after-completed does
            // (the processor can bounce an already-recorded refund).
            info!(provider_reference, "refund already terminal, ignoring");
            return Ok(());
        }

        if status == RefundStatus::Failed {
            let references = [
                format!("RF-PLT-{}", refund.id.simple()),
                format!("RF-MCH-{}", refund.id.simple()),
            ];
            for reference in references {
                if let Some(entry) = self.ledger.find_entry_by_reference(&reference).await? {
                    if entry.status == EntryStatus::Success {
                        self.ledger
                            .reverse_if_needed(entry.id, "refund failed at provider")
                            .await?;
                    }
                }
            }
        }

        self.refund_repo.update_status(refund.id, status).await?;
        info!(provider_reference, status = ?status, "refund status applied");
        Ok(())
    }
}
