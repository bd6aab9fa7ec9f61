use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{EntryStatus, LedgerEntry};

const ENTRY_COLUMNS: &str = "id, reference, user_id, merchant_id, order_id, kind, flow, status, \
     amount, fee, net_amount, currency, balance_before, balance_after, provider_reference, \
     reversal_of, metadata, created_at";

/// Repository for the append-only ledger. Inserts happen inside the ledger
/// service's transaction; status updates are the only permitted mutation.
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts an entry inside a caller-owned transaction. A duplicate
    /// reference surfaces as a conflict, which is how retried operations
    /// are rejected instead of double-applied.
    pub async fn insert_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        entry: &LedgerEntry,
    ) -> Result<LedgerEntry> {
        let row = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            INSERT INTO ledger_entries (id, reference, user_id, merchant_id, order_id, kind, flow, status, amount, fee, net_amount, currency, balance_before, balance_after, provider_reference, reversal_of, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING {ENTRY_COLUMNS}
            "#,
        ))
        .bind(entry.id)
        .bind(&entry.reference)
        .bind(entry.user_id)
        .bind(entry.merchant_id)
        .bind(entry.order_id)
        .bind(entry.kind)
        .bind(entry.flow)
        .bind(entry.status)
        .bind(entry.amount)
        .bind(entry.fee)
        .bind(entry.net_amount)
        .bind(&entry.currency)
        .bind(entry.balance_before)
        .bind(entry.balance_after)
        .bind(&entry.provider_reference)
        .bind(entry.reversal_of)
        .bind(&entry.metadata)
        .bind(entry.created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            if AppError::is_unique_violation(&e) {
                AppError::Conflict(format!("ledger reference '{}' already used", entry.reference))
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<LedgerEntry>> {
        let row = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_reference(&self, reference: &str) -> Result<Option<LedgerEntry>> {
        let row = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE reference = $1",
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_provider_reference(
        &self,
        provider_reference: &str,
    ) -> Result<Option<LedgerEntry>> {
        let row = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE provider_reference = $1",
        ))
        .bind(provider_reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// The entry that reverses the given one, if a reversal exists.
    pub async fn find_reversal_of(&self, entry_id: Uuid) -> Result<Option<LedgerEntry>> {
        let row = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE reversal_of = $1",
        ))
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_owner(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM ledger_entries
            WHERE user_id = $1 OR merchant_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        ))
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    pub async fn update_status(&self, id: Uuid, status: EntryStatus) -> Result<LedgerEntry> {
        let row = sqlx::query_as::<_, LedgerEntry>(&format!(
            "UPDATE ledger_entries SET status = $2 WHERE id = $1 RETURNING {ENTRY_COLUMNS}",
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Ledger entry '{id}' not found")))
    }

    pub async fn update_status_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: EntryStatus,
    ) -> Result<LedgerEntry> {
        let row = sqlx::query_as::<_, LedgerEntry>(&format!(
            "UPDATE ledger_entries SET status = $2 WHERE id = $1 RETURNING {ENTRY_COLUMNS}",
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Ledger entry '{id}' not found")))
    }

    pub async fn set_provider_reference(
        &self,
        id: Uuid,
        provider_reference: &str,
    ) -> Result<LedgerEntry> {
        let row = sqlx::query_as::<_, LedgerEntry>(&format!(
            "UPDATE ledger_entries SET provider_reference = $2 WHERE id = $1 RETURNING {ENTRY_COLUMNS}",
        ))
        .bind(id)
        .bind(provider_reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Ledger entry '{id}' not found")))
    }
}
