use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    EntryKind, EntryOwner, EntryStatus, NewLedgerEntry, Transfer, TransferStatus,
};
use crate::provider::{
    CreateRecipientRequest, InitiateTransferRequest, PaymentProvider, TransferInitiation,
};
use crate::repositories::TransferRepository;
use crate::services::LedgerService;

/// A request to pay out from a wallet to a bank account.
#[derive(Debug, Clone)]
pub struct WithdrawalRequest {
    pub owner: EntryOwner,
    pub amount: Decimal,
    pub currency: String,
    pub kind: EntryKind,
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
    pub reason: Option<String>,
}

impl WithdrawalRequest {
    fn validate(&self) -> Result<()> {
        if self.amount <= Decimal::ZERO {
            return Err(AppError::Validation("amount must be positive".to_string()));
        }
        if self.bank_code.trim().is_empty() || self.account_number.trim().is_empty() {
            return Err(AppError::Validation(
                "destination bank account is required".to_string(),
            ));
        }
        if !matches!(self.kind, EntryKind::Withdrawal | EntryKind::Payout) {
            return Err(AppError::Validation(
                "transfers must be withdrawals or payouts".to_string(),
            ));
        }
        Ok(())
    }
}

/// Drives an outbound payout as a two-step saga: reserve the funds with a
/// ledger debit, call the external transfer API, and compensate with a
/// re-credit on any failure. The debit-then-call ordering is deliberate:
/// the external call is the only unpredictable step, so the compensating
/// action is always "give the money back", never "take it twice".
pub struct TransferService {
    ledger: Arc<LedgerService>,
    transfer_repo: TransferRepository,
    provider: Arc<dyn PaymentProvider>,
}

impl TransferService {
    pub fn new(pool: PgPool, ledger: Arc<LedgerService>, provider: Arc<dyn PaymentProvider>) -> Self {
        Self {
            ledger,
            transfer_repo: TransferRepository::new(pool),
            provider,
        }
    }

    /// Initiates a payout. The generated reference is unique and shared
    /// with the ledger debit, so a retried orchestration with the same
    /// reference is rejected instead of double-processed.
    pub async fn initiate_withdrawal(&self, request: WithdrawalRequest) -> Result<Transfer> {
        request.validate()?;
        let reference = format!("TRF-{}", Uuid::new_v4().simple());
        self.initiate_with_reference(request, reference).await
    }

    /// Same as `initiate_withdrawal` with a caller-supplied reference
    /// (settlement runs derive theirs from the settlement id).
    pub async fn initiate_with_reference(
        &self,
        request: WithdrawalRequest,
        reference: String,
    ) -> Result<Transfer> {
        request.validate()?;

        // Durable record of the attempt, written before any money moves, so
        // a crash mid-saga is recoverable by reconciliation.
        let transfer = self
            .transfer_repo
            .create(&Transfer::new(
                reference.clone(),
                request.owner.id(),
                request.amount,
                request.currency.clone(),
                request.bank_code.clone(),
                request.account_number.clone(),
                request.account_name.clone(),
            ))
            .await?;

        // Step 1: reserve the funds. The debit entry carries the transfer
        // reference; insufficient funds aborts before anything external.
        let debit = NewLedgerEntry::debit(
            reference.clone(),
            request.kind,
            request.amount,
            request.currency.clone(),
        )
        .for_owner(request.owner);

        let debit_entry = match self.ledger.record_entry(debit).await {
            Ok(entry) => entry,
            Err(e) => {
                let reason = e.to_string();
                self.transfer_repo
                    .update_status(transfer.id, TransferStatus::Failed, Some(reason.as_str()))
                    .await?;
                return Err(e);
            }
        };

        // Step 2: the external call, outside any held database lock.
        match self.execute_transfer(&transfer, &request).await {
            Ok(TransferInitiation::Accepted { transfer_code }) => {
                info!(reference = %reference, "transfer accepted by provider");
                self.transfer_repo
                    .set_provider_handles(transfer.id, &transfer_code, Some(&transfer_code))
                    .await?;
                self.transfer_repo
                    .update_status(transfer.id, TransferStatus::Success, None)
                    .await
            }
            Ok(TransferInitiation::OtpRequired { transfer_code }) => {
                // Funds are already committed at the processor; the debit
                // stays applied until finalize resolves the transfer.
                info!(reference = %reference, "transfer awaiting OTP");
                self.transfer_repo
                    .set_provider_handles(transfer.id, &transfer_code, Some(&transfer_code))
                    .await?;
                self.transfer_repo
                    .update_status(transfer.id, TransferStatus::OtpRequired, None)
                    .await
            }
            Err(e) => {
                // Step 3: compensate. One re-credit of the same net amount.
                warn!(reference = %reference, error = %e, "transfer failed, compensating debit");
                self.ledger
                    .reverse_if_needed(debit_entry.id, "transfer failed")
                    .await?;
                let reason = e.to_string();
                self.transfer_repo
                    .update_status(transfer.id, TransferStatus::Failed, Some(reason.as_str()))
                    .await?;
                Err(e)
            }
        }
    }

    async fn execute_transfer(
        &self,
        transfer: &Transfer,
        request: &WithdrawalRequest,
    ) -> Result<TransferInitiation> {
        let recipient_code = self
            .provider
            .create_transfer_recipient(CreateRecipientRequest {
                name: request.account_name.clone(),
                account_number: request.account_number.clone(),
                bank_code: request.bank_code.clone(),
                currency: request.currency.clone(),
            })
            .await?;

        self.transfer_repo
            .set_provider_handles(transfer.id, &recipient_code, None)
            .await?;

        self.provider
            .initiate_transfer(InitiateTransferRequest {
                recipient_code,
                amount: request.amount,
                reference: transfer.reference.clone(),
                reason: request.reason.clone(),
            })
            .await
    }

    /// Completes or fails an OTP-gated transfer.
    pub async fn finalize_transfer(&self, reference: &str, otp: &str) -> Result<Transfer> {
        let transfer = self
            .transfer_repo
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transfer '{reference}' not found")))?;

        if transfer.status != TransferStatus::OtpRequired {
            return Err(AppError::Conflict(format!(
                "transfer '{reference}' is not awaiting an OTP (status: {:?})",
                transfer.status
            )));
        }
        let transfer_code = transfer.transfer_code.clone().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("OTP-gated transfer has no transfer code"))
        })?;

        match self.provider.finalize_transfer(&transfer_code, otp).await {
            Ok(TransferInitiation::Accepted { .. }) => {
                info!(reference, "transfer finalized");
                self.transfer_repo
                    .update_status(transfer.id, TransferStatus::Success, None)
                    .await
            }
            Ok(TransferInitiation::OtpRequired { .. }) => Err(AppError::Provider(
                "provider still requires an OTP".to_string(),
            )),
            Err(e) => {
                warn!(reference, error = %e, "transfer finalization failed, compensating");
                self.fail_with_compensation(&transfer, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    /// Marks a transfer failed and re-credits its debit if that has not
    /// happened yet. Safe to call more than once: used by the saga itself,
    /// by webhook processing, and by reconciliation.
    pub async fn fail_with_compensation(&self, transfer: &Transfer, reason: &str) -> Result<()> {
        if transfer.status == TransferStatus::Failed {
            return Ok(());
        }

        if let Some(entry) = self.ledger.find_entry_by_reference(&transfer.reference).await? {
            if entry.status == EntryStatus::Success && !entry.is_reversal() {
                self.ledger.reverse_if_needed(entry.id, reason).await?;
            }
        } else {
            error!(reference = %transfer.reference, "failed transfer has no ledger debit");
        }

        self.transfer_repo
            .update_status(transfer.id, TransferStatus::Failed, Some(reason))
            .await?;
        Ok(())
    }

    /// Marks a transfer successful. Idempotent: terminal transfers are left
    /// untouched.
    pub async fn confirm_success(&self, transfer: &Transfer) -> Result<()> {
        if transfer.status.is_terminal() {
            return Ok(());
        }
        self.transfer_repo
            .update_status(transfer.id, TransferStatus::Success, None)
            .await?;
        Ok(())
    }

    pub async fn find_by_reference(&self, reference: &str) -> Result<Option<Transfer>> {
        self.transfer_repo.find_by_reference(reference).await
    }
}
