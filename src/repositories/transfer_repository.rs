use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Transfer, TransferStatus};

const TRANSFER_COLUMNS: &str = "id, reference, wallet_owner_id, amount, currency, status, \
     bank_code, bank_account_number, bank_account_name, recipient_code, transfer_code, \
     failure_reason, created_at, completed_at";

/// Repository for payout attempts.
pub struct TransferRepository {
    pool: PgPool,
}

impl TransferRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, transfer: &Transfer) -> Result<Transfer> {
        let row = sqlx::query_as::<_, Transfer>(&format!(
            r#"
            INSERT INTO transfers (id, reference, wallet_owner_id, amount, currency, status, bank_code, bank_account_number, bank_account_name, recipient_code, transfer_code, failure_reason, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {TRANSFER_COLUMNS}
            "#,
        ))
        .bind(transfer.id)
        .bind(&transfer.reference)
        .bind(transfer.wallet_owner_id)
        .bind(transfer.amount)
        .bind(&transfer.currency)
        .bind(transfer.status)
        .bind(&transfer.bank_code)
        .bind(&transfer.bank_account_number)
        .bind(&transfer.bank_account_name)
        .bind(&transfer.recipient_code)
        .bind(&transfer.transfer_code)
        .bind(&transfer.failure_reason)
        .bind(transfer.created_at)
        .bind(transfer.completed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if AppError::is_unique_violation(&e) {
                AppError::Conflict(format!(
                    "transfer reference '{}' already used",
                    transfer.reference
                ))
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(row)
    }

    pub async fn find_by_reference(&self, reference: &str) -> Result<Option<Transfer>> {
        let row = sqlx::query_as::<_, Transfer>(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE reference = $1",
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        status: TransferStatus,
        failure_reason: Option<&str>,
    ) -> Result<Transfer> {
        let completed_at = status.is_terminal().then(Utc::now);

        let row = sqlx::query_as::<_, Transfer>(&format!(
            r#"
            UPDATE transfers
            SET status = $2,
                failure_reason = COALESCE($3, failure_reason),
                completed_at = COALESCE($4, completed_at)
            WHERE id = $1
            RETURNING {TRANSFER_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(status)
        .bind(failure_reason)
        .bind(completed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Transfer '{id}' not found")))
    }

    pub async fn set_provider_handles(
        &self,
        id: Uuid,
        recipient_code: &str,
        transfer_code: Option<&str>,
    ) -> Result<Transfer> {
        let row = sqlx::query_as::<_, Transfer>(&format!(
            r#"
            UPDATE transfers
            SET recipient_code = $2,
                transfer_code = COALESCE($3, transfer_code)
            WHERE id = $1
            RETURNING {TRANSFER_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(recipient_code)
        .bind(transfer_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Transfer '{id}' not found")))
    }

    /// Non-terminal transfers older than the cutoff, for reconciliation.
    pub async fn find_stale_pending(&self, older_than: DateTime<Utc>) -> Result<Vec<Transfer>> {
        let rows = sqlx::query_as::<_, Transfer>(&format!(
            r#"
            SELECT {TRANSFER_COLUMNS} FROM transfers
            WHERE status IN ('PENDING', 'OTP_REQUIRED') AND created_at < $1
            ORDER BY created_at
            "#,
        ))
        .bind(older_than)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }
}
