use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Order, OrderItem, OrderStatus, OrderWithItems, PaymentStatus};

const ORDER_COLUMNS: &str = "id, user_id, merchant_id, total, currency, status, \
     payment_status, payment_reference, created_at, updated_at";

/// Order collaborator: this core only reads orders and advances their
/// status/payment status on payment and refund events.
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_payment_reference(&self, reference: &str) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_reference = $1",
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_with_items(&self, id: Uuid) -> Result<Option<OrderWithItems>> {
        let Some(order) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, product_id, quantity, unit_price FROM order_items WHERE order_id = $1",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Some(OrderWithItems { order, items }))
    }

    pub async fn update_payment_status(
        &self,
        id: Uuid,
        payment_status: PaymentStatus,
    ) -> Result<Order> {
        let row = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders SET payment_status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(payment_status)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Order '{id}' not found")))
    }

    pub async fn update_status_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: OrderStatus,
        payment_status: PaymentStatus,
    ) -> Result<Order> {
        let row = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders SET status = $2, payment_status = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(status)
        .bind(payment_status)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Order '{id}' not found")))
    }

    pub async fn mark_paid(&self, id: Uuid, status: OrderStatus) -> Result<Order> {
        let row = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders SET status = $2, payment_status = 'PAID', updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Order '{id}' not found")))
    }
}

/// Inventory collaborator: restock on refund is the only operation this
/// core needs.
pub struct InventoryRepository {
    pool: PgPool,
}

impl InventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn increment_stock(&self, product_id: Uuid, quantity: i32) -> Result<()> {
        let result = sqlx::query(
            "UPDATE products SET stock_quantity = stock_quantity + $2 WHERE id = $1",
        )
        .bind(product_id)
        .bind(quantity)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Product '{product_id}' not found")));
        }
        Ok(())
    }
}
