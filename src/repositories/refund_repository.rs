use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{OrderRefund, RefundStatus};

const REFUND_COLUMNS: &str = "id, order_id, merchant_id, refund_type, amount_requested, \
     amount_approved, amount_refunded, platform_share, merchant_share, currency, reason, \
     status, provider_refund_reference, merchant_debit_reference, created_at, completed_at";

/// Repository for order refunds.
pub struct RefundRepository {
    pool: PgPool,
}

impl RefundRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a refund inside the refund engine's transaction.
    pub async fn insert_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        refund: &OrderRefund,
    ) -> Result<OrderRefund> {
        let row = sqlx::query_as::<_, OrderRefund>(&format!(
            r#"
            INSERT INTO order_refunds (id, order_id, merchant_id, refund_type, amount_requested, amount_approved, amount_refunded, platform_share, merchant_share, currency, reason, status, provider_refund_reference, merchant_debit_reference, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {REFUND_COLUMNS}
            "#,
        ))
        .bind(refund.id)
        .bind(refund.order_id)
        .bind(refund.merchant_id)
        .bind(refund.refund_type)
        .bind(refund.amount_requested)
        .bind(refund.amount_approved)
        .bind(refund.amount_refunded)
        .bind(refund.platform_share)
        .bind(refund.merchant_share)
        .bind(&refund.currency)
        .bind(&refund.reason)
        .bind(refund.status)
        .bind(&refund.provider_refund_reference)
        .bind(&refund.merchant_debit_reference)
        .bind(refund.created_at)
        .bind(refund.completed_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_order(&self, order_id: Uuid) -> Result<Vec<OrderRefund>> {
        let rows = sqlx::query_as::<_, OrderRefund>(&format!(
            "SELECT {REFUND_COLUMNS} FROM order_refunds WHERE order_id = $1 ORDER BY created_at",
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    pub async fn find_by_provider_reference(
        &self,
        provider_reference: &str,
    ) -> Result<Option<OrderRefund>> {
        let row = sqlx::query_as::<_, OrderRefund>(&format!(
            "SELECT {REFUND_COLUMNS} FROM order_refunds WHERE provider_refund_reference = $1",
        ))
        .bind(provider_reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Sum of completed refund amounts for an order. Bounds any new refund.
    pub async fn completed_total(&self, order_id: Uuid) -> Result<Decimal> {
        let (total,): (Option<Decimal>,) = sqlx::query_as(
            r#"
            SELECT SUM(amount_refunded) FROM order_refunds
            WHERE order_id = $1 AND status = 'COMPLETED'
            "#,
        )
        .bind(order_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(total.unwrap_or(Decimal::ZERO))
    }

    pub async fn update_status(&self, id: Uuid, status: RefundStatus) -> Result<OrderRefund> {
        let completed_at = status.is_terminal().then(Utc::now);

        let row = sqlx::query_as::<_, OrderRefund>(&format!(
            r#"
            UPDATE order_refunds
            SET status = $2, completed_at = COALESCE($3, completed_at)
            WHERE id = $1
            RETURNING {REFUND_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(status)
        .bind(completed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Refund '{id}' not found")))
    }
}
