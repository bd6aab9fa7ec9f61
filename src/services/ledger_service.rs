use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{EntryFlow, EntryStatus, LedgerEntry, NewLedgerEntry, Wallet, WalletStatus};
use crate::repositories::{LedgerRepository, WalletRepository};

/// Applies an entry's net amount to a balance according to its flow.
pub fn apply_flow(balance_before: Decimal, flow: EntryFlow, net_amount: Decimal) -> Decimal {
    match flow {
        EntryFlow::Credit => balance_before + net_amount,
        EntryFlow::Debit => balance_before - net_amount,
    }
}

/// The transaction ledger and wallet balance manager. Every money movement
/// goes through `record_entry`: the wallet row is locked, the balance
/// snapshot is taken, and the entry plus the updated balance are persisted
/// as one atomic unit. Compensation is additive: `reverse` writes a new
/// opposite-flow entry and never edits history.
pub struct LedgerService {
    pool: PgPool,
    ledger_repo: LedgerRepository,
    wallet_repo: WalletRepository,
}

impl LedgerService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            ledger_repo: LedgerRepository::new(pool.clone()),
            wallet_repo: WalletRepository::new(pool.clone()),
            pool,
        }
    }

    fn validate(new: &NewLedgerEntry) -> Result<Uuid> {
        if new.reference.trim().is_empty() {
            return Err(AppError::Validation("reference is required".to_string()));
        }
        if new.amount <= Decimal::ZERO {
            return Err(AppError::Validation("amount must be positive".to_string()));
        }
        if new.fee < Decimal::ZERO {
            return Err(AppError::Validation("fee cannot be negative".to_string()));
        }
        if new.fee > new.amount {
            return Err(AppError::Validation(
                "fee cannot exceed the amount".to_string(),
            ));
        }
        if new.currency.len() != 3 {
            return Err(AppError::Validation(
                "currency must be a 3-letter ISO code".to_string(),
            ));
        }
        new.owner_id()
            .ok_or_else(|| AppError::Validation("entry must have an owner".to_string()))
    }

    fn check_wallet(wallet: &Wallet, flow: EntryFlow) -> Result<()> {
        match flow {
            // Debits only leave operational wallets.
            EntryFlow::Debit if !wallet.status.is_operational() => Err(AppError::Validation(
                format!("wallet is not operational (status: {:?})", wallet.status),
            )),
            // Credits land anywhere except a closed wallet.
            EntryFlow::Credit if wallet.status == WalletStatus::Closed => Err(
                AppError::Validation("wallet is closed".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Records a single entry in its own transaction.
    pub async fn record_entry(&self, new: NewLedgerEntry) -> Result<LedgerEntry> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        let entry = self.record_entry_in(&mut tx, new).await?;
        tx.commit().await.map_err(AppError::Database)?;
        Ok(entry)
    }

    /// Records an entry inside a caller-owned transaction, so larger units
    /// of work (the refund's dual debit) stay atomic. Locks the wallet row
    /// for the read-modify-write: two concurrent debits against the same
    /// wallet serialize here instead of both reading the same balance.
    pub async fn record_entry_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        new: NewLedgerEntry,
    ) -> Result<LedgerEntry> {
        let owner_id = Self::validate(&new)?;

        let wallet = self.wallet_repo.lock_by_owner(tx, owner_id).await?;
        Self::check_wallet(&wallet, new.flow)?;

        let net_amount = new.net_amount();
        let balance_before = wallet.available_balance;

        if new.flow == EntryFlow::Debit && balance_before < net_amount {
            return Err(AppError::InsufficientFunds {
                requested: net_amount,
                available: balance_before,
            });
        }

        let balance_after = apply_flow(balance_before, new.flow, net_amount);

        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            reference: new.reference,
            user_id: new.user_id,
            merchant_id: new.merchant_id,
            order_id: new.order_id,
            kind: new.kind,
            flow: new.flow,
            status: EntryStatus::Success,
            amount: new.amount,
            fee: new.fee,
            net_amount,
            currency: new.currency,
            balance_before,
            balance_after,
            provider_reference: new.provider_reference,
            reversal_of: new.reversal_of,
            metadata: new.metadata,
            created_at: Utc::now(),
        };

        let entry = self.ledger_repo.insert_in(tx, &entry).await?;
        self.wallet_repo
            .update_balances_in(tx, wallet.id, balance_after, balance_after + wallet.pending_balance)
            .await?;

        info!(
            reference = %entry.reference,
            flow = ?entry.flow,
            kind = ?entry.kind,
            net_amount = %entry.net_amount,
            "ledger entry recorded"
        );

        Ok(entry)
    }

    /// Creates the compensating entry for a successful entry: opposite flow,
    /// identical net amount, back-referenced to the original. The original
    /// is flagged reversed, never rewritten.
    pub async fn reverse(&self, entry_id: Uuid, reason: &str) -> Result<LedgerEntry> {
        let original = self
            .ledger_repo
            .find_by_id(entry_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ledger entry '{entry_id}' not found")))?;

        if original.status != EntryStatus::Success {
            return Err(AppError::Conflict(format!(
                "cannot reverse entry with status {:?}",
                original.status
            )));
        }
        if self.ledger_repo.find_reversal_of(entry_id).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "entry '{}' is already reversed",
                original.reference
            )));
        }

        let compensating = NewLedgerEntry {
            reference: format!("{}-REV", original.reference),
            user_id: original.user_id,
            merchant_id: original.merchant_id,
            order_id: original.order_id,
            kind: original.kind,
            flow: original.flow.opposite(),
            // The reversal restores exactly what was applied, so the gross
            // amount is the original net and the fee is zero.
            amount: original.net_amount,
            fee: Decimal::ZERO,
            currency: original.currency.clone(),
            provider_reference: original.provider_reference.clone(),
            reversal_of: Some(original.id),
            metadata: Some(serde_json::json!({ "reason": reason })),
        };

        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        let entry = self.record_entry_in(&mut tx, compensating).await?;
        self.ledger_repo
            .update_status_in(&mut tx, original.id, EntryStatus::Reversed)
            .await?;
        tx.commit().await.map_err(AppError::Database)?;

        info!(
            original = %original.reference,
            reversal = %entry.reference,
            reason,
            "ledger entry reversed"
        );

        Ok(entry)
    }

    /// Idempotent variant of `reverse`: a second attempt (or a webhook
    /// racing local compensation) is a no-op returning the existing
    /// reversal.
    pub async fn reverse_if_needed(&self, entry_id: Uuid, reason: &str) -> Result<LedgerEntry> {
        if let Some(existing) = self.ledger_repo.find_reversal_of(entry_id).await? {
            return Ok(existing);
        }
        match self.reverse(entry_id, reason).await {
            Err(AppError::Conflict(_)) => {
                self.ledger_repo
                    .find_reversal_of(entry_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Conflict(format!("entry '{entry_id}' cannot be reversed"))
                    })
            }
            other => other,
        }
    }

    pub async fn find_entry_by_reference(&self, reference: &str) -> Result<Option<LedgerEntry>> {
        self.ledger_repo.find_by_reference(reference).await
    }

    pub async fn get_balance(&self, owner_id: Uuid) -> Result<Decimal> {
        let wallet = self
            .wallet_repo
            .find_by_owner(owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Wallet for owner '{owner_id}' not found")))?;
        Ok(wallet.available_balance)
    }

    pub async fn entry_history(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>> {
        self.ledger_repo.find_by_owner(owner_id, limit, offset).await
    }

    /// Checks the central invariant: the materialized wallet balance equals
    /// the ledger-derived balance.
    pub async fn verify_wallet_invariant(&self, owner_id: Uuid) -> Result<bool> {
        let wallet = self
            .wallet_repo
            .find_by_owner(owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Wallet for owner '{owner_id}' not found")))?;
        let derived = self.wallet_repo.recompute_balance(owner_id).await?;
        Ok(wallet.available_balance == derived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryKind;
    use rust_decimal_macros::dec;

    #[test]
    fn test_apply_flow() {
        assert_eq!(apply_flow(dec!(100), EntryFlow::Credit, dec!(50)), dec!(150));
        assert_eq!(apply_flow(dec!(100), EntryFlow::Debit, dec!(50)), dec!(50));
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let owner = Uuid::new_v4();

        let no_owner = NewLedgerEntry::credit("R-1", EntryKind::WalletFunding, dec!(10), "NGN");
        assert!(matches!(
            LedgerService::validate(&no_owner),
            Err(AppError::Validation(_))
        ));

        let zero = NewLedgerEntry::credit("R-2", EntryKind::WalletFunding, dec!(0), "NGN")
            .for_user(owner);
        assert!(matches!(
            LedgerService::validate(&zero),
            Err(AppError::Validation(_))
        ));

        let fee_over = NewLedgerEntry::credit("R-3", EntryKind::Settlement, dec!(10), "NGN")
            .for_user(owner)
            .with_fee(dec!(11));
        assert!(matches!(
            LedgerService::validate(&fee_over),
            Err(AppError::Validation(_))
        ));

        let bad_currency = NewLedgerEntry::credit("R-4", EntryKind::Settlement, dec!(10), "NAIRA")
            .for_user(owner);
        assert!(matches!(
            LedgerService::validate(&bad_currency),
            Err(AppError::Validation(_))
        ));

        let empty_ref = NewLedgerEntry::credit("  ", EntryKind::Settlement, dec!(10), "NGN")
            .for_user(owner);
        assert!(matches!(
            LedgerService::validate(&empty_ref),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_accepts_good_input() {
        let owner = Uuid::new_v4();
        let entry = NewLedgerEntry::debit("WDR-1", EntryKind::Withdrawal, dec!(500), "NGN")
            .for_user(owner)
            .with_fee(dec!(10));
        assert_eq!(LedgerService::validate(&entry).unwrap(), owner);
    }

    #[test]
    fn test_check_wallet_rules() {
        let mut wallet = Wallet::new(Uuid::new_v4(), "NGN");

        // Pending wallet can receive credits but not pay out.
        assert!(LedgerService::check_wallet(&wallet, EntryFlow::Credit).is_ok());
        assert!(LedgerService::check_wallet(&wallet, EntryFlow::Debit).is_err());

        wallet.status = WalletStatus::Active;
        assert!(LedgerService::check_wallet(&wallet, EntryFlow::Debit).is_ok());

        wallet.status = WalletStatus::Closed;
        assert!(LedgerService::check_wallet(&wallet, EntryFlow::Credit).is_err());
        assert!(LedgerService::check_wallet(&wallet, EntryFlow::Debit).is_err());
    }
}
