mod common;

use chrono::{Duration, Utc};
use common::{
    create_funded_wallet, setup_test_db, test_stack, test_stack_with_settings,
    test_settlement_settings, TransferBehavior,
};
use payments_engine::models::{SettlementSchedule, SettlementStatus};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::PgPool;
use sqlx::Row;
use uuid::Uuid;

/// Inserts a pending settlement with bank details, qualified in the past.
async fn seed_settlement(
    pool: &PgPool,
    merchant_id: Uuid,
    amount: Decimal,
    schedule: SettlementSchedule,
    qualified_days_ago: i64,
) -> Uuid {
    let settlement_id = Uuid::new_v4();
    let order_id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO orders (id, user_id, merchant_id, total, currency, status, payment_status, payment_reference, created_at, updated_at)
        VALUES ($1, $2, $3, $4, 'NGN', 'PROCESSING', 'PAID', $5, NOW(), NOW())
        "#,
    )
    .bind(order_id)
    .bind(Uuid::new_v4())
    .bind(merchant_id)
    .bind(amount)
    .bind(format!("ORD-{}", order_id.simple()))
    .execute(pool)
    .await
    .unwrap();

    sqlx::query(
        r#"
        INSERT INTO settlements (id, order_id, merchant_id, order_amount, platform_fee, gateway_fee, settlement_amount, currency, status, schedule, bank_code, bank_account_number, bank_account_name, retry_count, qualified_at, created_at)
        VALUES ($1, $2, $3, $4, 0, 0, $4, 'NGN', 'PENDING', $5, '058', '0123456789', 'SHOP LTD', 0, $6, NOW())
        "#,
    )
    .bind(settlement_id)
    .bind(order_id)
    .bind(merchant_id)
    .bind(amount)
    .bind(schedule)
    .bind(Utc::now() - Duration::days(qualified_days_ago))
    .execute(pool)
    .await
    .unwrap();

    settlement_id
}

async fn settlement_status(pool: &PgPool, id: Uuid) -> String {
    sqlx::query("SELECT status::TEXT AS s FROM settlements WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
        .get::<String, _>("s")
}

#[tokio::test]
async fn below_minimum_is_skipped_until_threshold_met() {
    let stack = test_stack(setup_test_db().await).await;
    let merchant = Uuid::new_v4();
    create_funded_wallet(&stack, merchant, dec!(2000)).await;

    // 500 unsettled against a minimum of 1,000: the run must skip it.
    let first = seed_settlement(&stack.pool, merchant, dec!(500), SettlementSchedule::Daily, 1).await;
    let report = stack.settlements.run_due_settlements(false).await.unwrap();
    assert_eq!(report.released, 0);
    assert_eq!(settlement_status(&stack.pool, first).await, "PENDING");

    // A second order pushes the merchant to 1,000; the next run releases.
    let second = seed_settlement(&stack.pool, merchant, dec!(500), SettlementSchedule::Daily, 1).await;
    let report = stack.settlements.run_due_settlements(false).await.unwrap();
    assert_eq!(report.released, 2);
    assert_eq!(settlement_status(&stack.pool, first).await, "COMPLETED");
    assert_eq!(settlement_status(&stack.pool, second).await, "COMPLETED");

    // Both payouts debited the merchant wallet.
    assert_eq!(stack.ledger.get_balance(merchant).await.unwrap(), dec!(1000));
}

#[tokio::test]
async fn hold_period_defers_release() {
    let mut settings = test_settlement_settings();
    settings.hold_period_days = 2;
    let stack = test_stack_with_settings(setup_test_db().await, settings).await;

    let merchant = Uuid::new_v4();
    create_funded_wallet(&stack, merchant, dec!(10000)).await;

    // Qualified today: inside the 2-day hold.
    let held = seed_settlement(&stack.pool, merchant, dec!(5000), SettlementSchedule::Daily, 0).await;
    let report = stack.settlements.run_due_settlements(false).await.unwrap();
    assert_eq!(report.released, 0);
    assert_eq!(settlement_status(&stack.pool, held).await, "PENDING");

    // Qualified three days ago: past the hold, releases.
    let ripe = seed_settlement(&stack.pool, merchant, dec!(3000), SettlementSchedule::Daily, 3).await;
    let report = stack.settlements.run_due_settlements(false).await.unwrap();
    assert_eq!(report.released, 1);
    assert_eq!(settlement_status(&stack.pool, ripe).await, "COMPLETED");
}

#[tokio::test]
async fn manual_schedule_only_releases_on_manual_run() {
    let stack = test_stack(setup_test_db().await).await;
    let merchant = Uuid::new_v4();
    create_funded_wallet(&stack, merchant, dec!(10000)).await;

    let manual =
        seed_settlement(&stack.pool, merchant, dec!(5000), SettlementSchedule::Manual, 1).await;

    let scheduled_run = stack.settlements.run_due_settlements(false).await.unwrap();
    assert_eq!(scheduled_run.released, 0);
    assert_eq!(settlement_status(&stack.pool, manual).await, "PENDING");

    let manual_run = stack.settlements.run_due_settlements(true).await.unwrap();
    assert_eq!(manual_run.released, 1);
    assert_eq!(settlement_status(&stack.pool, manual).await, "COMPLETED");
}

#[tokio::test]
async fn failed_release_schedules_retry() {
    let stack = test_stack(setup_test_db().await).await;
    let merchant = Uuid::new_v4();
    create_funded_wallet(&stack, merchant, dec!(10000)).await;

    let settlement =
        seed_settlement(&stack.pool, merchant, dec!(5000), SettlementSchedule::Daily, 1).await;

    stack.provider.set_transfer_behavior(TransferBehavior::Fail);
    let report = stack.settlements.run_due_settlements(false).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(settlement_status(&stack.pool, settlement).await, "FAILED");

    let row = sqlx::query(
        "SELECT retry_count, next_retry_at FROM settlements WHERE id = $1",
    )
    .bind(settlement)
    .fetch_one(&stack.pool)
    .await
    .unwrap();
    assert_eq!(row.get::<i32, _>("retry_count"), 1);
    assert!(row
        .get::<Option<chrono::DateTime<Utc>>, _>("next_retry_at")
        .is_some());

    // The failed attempt's debit was compensated: balance unchanged.
    assert_eq!(stack.ledger.get_balance(merchant).await.unwrap(), dec!(10000));
    assert!(stack.ledger.verify_wallet_invariant(merchant).await.unwrap());
}

#[tokio::test]
async fn completed_settlement_is_not_picked_up_again() {
    let stack = test_stack(setup_test_db().await).await;
    let merchant = Uuid::new_v4();
    create_funded_wallet(&stack, merchant, dec!(10000)).await;

    let settlement =
        seed_settlement(&stack.pool, merchant, dec!(5000), SettlementSchedule::Daily, 1).await;

    let first = stack.settlements.run_due_settlements(false).await.unwrap();
    assert_eq!(first.released, 1);
    let balance_after_first = stack.ledger.get_balance(merchant).await.unwrap();

    let second = stack.settlements.run_due_settlements(false).await.unwrap();
    assert_eq!(second.released, 0);
    assert_eq!(settlement_status(&stack.pool, settlement).await, "COMPLETED");
    assert_eq!(
        stack.ledger.get_balance(merchant).await.unwrap(),
        balance_after_first
    );
}

#[tokio::test]
async fn settlement_statuses_gate_release() {
    assert!(SettlementStatus::Pending.can_release());
    assert!(SettlementStatus::Failed.can_release());
    assert!(!SettlementStatus::Completed.can_release());
    assert!(!SettlementStatus::Cancelled.can_release());
}
