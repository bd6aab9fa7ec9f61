use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::Wallet;

const WALLET_COLUMNS: &str = "id, owner_id, currency, available_balance, pending_balance, \
     ledger_balance, status, account_number, bank_name, provider_customer_code, version, \
     created_at, updated_at";

/// Repository for wallet rows. Balance mutations always happen inside a
/// caller-owned transaction holding the row lock from `lock_by_owner`.
pub struct WalletRepository {
    pool: PgPool,
}

impl WalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, wallet: &Wallet) -> Result<Wallet> {
        let row = sqlx::query_as::<_, Wallet>(&format!(
            r#"
            INSERT INTO wallets (id, owner_id, currency, available_balance, pending_balance, ledger_balance, status, account_number, bank_name, provider_customer_code, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {WALLET_COLUMNS}
            "#,
        ))
        .bind(wallet.id)
        .bind(wallet.owner_id)
        .bind(&wallet.currency)
        .bind(wallet.available_balance)
        .bind(wallet.pending_balance)
        .bind(wallet.ledger_balance)
        .bind(wallet.status)
        .bind(&wallet.account_number)
        .bind(&wallet.bank_name)
        .bind(&wallet.provider_customer_code)
        .bind(wallet.version)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if AppError::is_unique_violation(&e) {
                AppError::Conflict(format!("wallet already exists for owner '{}'", wallet.owner_id))
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(row)
    }

    pub async fn find_by_owner(&self, owner_id: Uuid) -> Result<Option<Wallet>> {
        let row = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE owner_id = $1",
        ))
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_customer_code(&self, customer_code: &str) -> Result<Option<Wallet>> {
        let row = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE provider_customer_code = $1",
        ))
        .bind(customer_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn get_or_create(&self, owner_id: Uuid, currency: &str) -> Result<Wallet> {
        if let Some(wallet) = self.find_by_owner(owner_id).await? {
            return Ok(wallet);
        }
        self.create(&Wallet::new(owner_id, currency)).await
    }

    /// Row-locks the owner's wallet for the duration of the transaction.
    /// Every balance read-modify-write must go through this lock so that
    /// concurrent debits cannot both observe the same balance.
    pub async fn lock_by_owner(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_id: Uuid,
    ) -> Result<Wallet> {
        let row = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE owner_id = $1 FOR UPDATE",
        ))
        .bind(owner_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Wallet for owner '{owner_id}' not found")))
    }

    /// Writes new balances for a wallet previously locked in this
    /// transaction.
    pub async fn update_balances_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        wallet_id: Uuid,
        available_balance: Decimal,
        ledger_balance: Decimal,
    ) -> Result<Wallet> {
        let row = sqlx::query_as::<_, Wallet>(&format!(
            r#"
            UPDATE wallets
            SET available_balance = $2,
                ledger_balance = $3,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {WALLET_COLUMNS}
            "#,
        ))
        .bind(wallet_id)
        .bind(available_balance)
        .bind(ledger_balance)
        .fetch_one(&mut **tx)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Attaches an issued virtual account and activates the wallet.
    pub async fn attach_virtual_account(
        &self,
        wallet_id: Uuid,
        account_number: &str,
        bank_name: &str,
        customer_code: &str,
    ) -> Result<Wallet> {
        let row = sqlx::query_as::<_, Wallet>(&format!(
            r#"
            UPDATE wallets
            SET account_number = $2,
                bank_name = $3,
                provider_customer_code = $4,
                status = 'ACTIVE',
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {WALLET_COLUMNS}
            "#,
        ))
        .bind(wallet_id)
        .bind(account_number)
        .bind(bank_name)
        .bind(customer_code)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Recomputes the balance from the ledger. Used by invariant checks and
    /// tests, never as the transactional read path.
    pub async fn recompute_balance(&self, owner_id: Uuid) -> Result<Decimal> {
        let (balance,): (Option<Decimal>,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(
                CASE WHEN flow = 'CREDIT' THEN net_amount ELSE -net_amount END
            ), 0)
            FROM ledger_entries
            WHERE COALESCE(user_id, merchant_id) = $1
              AND status IN ('SUCCESS', 'REVERSED')
            "#,
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(balance.unwrap_or(Decimal::ZERO))
    }
}
