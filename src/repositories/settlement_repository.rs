use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Settlement, SettlementStatus};

const SETTLEMENT_COLUMNS: &str = "id, order_id, merchant_id, order_amount, platform_fee, \
     gateway_fee, settlement_amount, currency, status, schedule, bank_code, \
     bank_account_number, bank_account_name, transfer_reference, retry_count, next_retry_at, \
     qualified_at, created_at, settled_at";

/// Repository for merchant settlements.
pub struct SettlementRepository {
    pool: PgPool,
}

impl SettlementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, settlement: &Settlement) -> Result<Settlement> {
        let row = sqlx::query_as::<_, Settlement>(&format!(
            r#"
            INSERT INTO settlements (id, order_id, merchant_id, order_amount, platform_fee, gateway_fee, settlement_amount, currency, status, schedule, bank_code, bank_account_number, bank_account_name, transfer_reference, retry_count, next_retry_at, qualified_at, created_at, settled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING {SETTLEMENT_COLUMNS}
            "#,
        ))
        .bind(settlement.id)
        .bind(settlement.order_id)
        .bind(settlement.merchant_id)
        .bind(settlement.order_amount)
        .bind(settlement.platform_fee)
        .bind(settlement.gateway_fee)
        .bind(settlement.settlement_amount)
        .bind(&settlement.currency)
        .bind(settlement.status)
        .bind(settlement.schedule)
        .bind(&settlement.bank_code)
        .bind(&settlement.bank_account_number)
        .bind(&settlement.bank_account_name)
        .bind(&settlement.transfer_reference)
        .bind(settlement.retry_count)
        .bind(settlement.next_retry_at)
        .bind(settlement.qualified_at)
        .bind(settlement.created_at)
        .bind(settlement.settled_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if AppError::is_unique_violation(&e) {
                AppError::Conflict(format!(
                    "settlement already exists for order '{}'",
                    settlement.order_id
                ))
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(row)
    }

    pub async fn find_by_order(&self, order_id: Uuid) -> Result<Option<Settlement>> {
        let row = sqlx::query_as::<_, Settlement>(&format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM settlements WHERE order_id = $1",
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Settlements eligible for a release run: pending or retryable-failed,
    /// with any scheduled retry time in the past.
    pub async fn find_releasable(&self, max_retries: i32, now: DateTime<Utc>) -> Result<Vec<Settlement>> {
        let rows = sqlx::query_as::<_, Settlement>(&format!(
            r#"
            SELECT {SETTLEMENT_COLUMNS} FROM settlements
            WHERE status IN ('PENDING', 'FAILED')
              AND retry_count < $1
              AND (next_retry_at IS NULL OR next_retry_at <= $2)
            ORDER BY qualified_at
            "#,
        ))
        .bind(max_retries)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    /// Total not-yet-settled amount accumulated by a merchant.
    pub async fn unsettled_total(&self, merchant_id: Uuid) -> Result<Decimal> {
        let (total,): (Option<Decimal>,) = sqlx::query_as(
            r#"
            SELECT SUM(settlement_amount) FROM settlements
            WHERE merchant_id = $1 AND status IN ('PENDING', 'FAILED')
            "#,
        )
        .bind(merchant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(total.unwrap_or(Decimal::ZERO))
    }

    pub async fn mark_processing(&self, id: Uuid, transfer_reference: &str) -> Result<Settlement> {
        let row = sqlx::query_as::<_, Settlement>(&format!(
            r#"
            UPDATE settlements
            SET status = 'PROCESSING', transfer_reference = $2
            WHERE id = $1 AND status IN ('PENDING', 'FAILED')
            RETURNING {SETTLEMENT_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(transfer_reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        row.ok_or_else(|| {
            AppError::Conflict(format!("settlement '{id}' is not eligible for processing"))
        })
    }

    pub async fn mark_completed(&self, id: Uuid) -> Result<Settlement> {
        let row = sqlx::query_as::<_, Settlement>(&format!(
            r#"
            UPDATE settlements
            SET status = 'COMPLETED', settled_at = NOW()
            WHERE id = $1
            RETURNING {SETTLEMENT_COLUMNS}
            "#,
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Settlement '{id}' not found")))
    }

    /// Records a failed release attempt and schedules the next retry.
    pub async fn mark_failed(&self, id: Uuid, next_retry_at: DateTime<Utc>) -> Result<Settlement> {
        let row = sqlx::query_as::<_, Settlement>(&format!(
            r#"
            UPDATE settlements
            SET status = 'FAILED',
                retry_count = retry_count + 1,
                next_retry_at = $2
            WHERE id = $1
            RETURNING {SETTLEMENT_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(next_retry_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Settlement '{id}' not found")))
    }

    pub async fn update_status(&self, id: Uuid, status: SettlementStatus) -> Result<Settlement> {
        let row = sqlx::query_as::<_, Settlement>(&format!(
            "UPDATE settlements SET status = $2 WHERE id = $1 RETURNING {SETTLEMENT_COLUMNS}",
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Settlement '{id}' not found")))
    }
}
