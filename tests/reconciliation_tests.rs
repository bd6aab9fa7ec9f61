mod common;

use common::{create_funded_wallet, setup_test_db, test_stack, TransferBehavior};
use payments_engine::config::ReconciliationSettings;
use payments_engine::models::{EntryKind, EntryOwner, TransferStatus};
use payments_engine::provider::{PaymentProvider, RemoteTransferStatus};
use payments_engine::services::{ReconciliationService, WithdrawalRequest};
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

fn reconciliation(stack: &common::TestStack) -> ReconciliationService {
    let provider: Arc<dyn PaymentProvider> = stack.provider.clone();
    ReconciliationService::new(
        stack.pool.clone(),
        stack.transfers.clone(),
        provider,
        ReconciliationSettings {
            interval_secs: 60,
            stale_after_secs: 0,
        },
    )
}

async fn stale_otp_transfer(stack: &common::TestStack, owner: Uuid) -> String {
    stack.provider.set_transfer_behavior(TransferBehavior::RequireOtp);
    let transfer = stack
        .transfers
        .initiate_withdrawal(WithdrawalRequest {
            owner: EntryOwner::User(owner),
            amount: dec!(2000),
            currency: "NGN".to_string(),
            kind: EntryKind::Withdrawal,
            bank_code: "058".to_string(),
            account_number: "0123456789".to_string(),
            account_name: "ADA OBI".to_string(),
            reason: None,
        })
        .await
        .unwrap();

    // Age the attempt past the staleness cutoff.
    sqlx::query("UPDATE transfers SET created_at = NOW() - INTERVAL '1 hour' WHERE reference = $1")
        .bind(&transfer.reference)
        .execute(&stack.pool)
        .await
        .unwrap();

    transfer.reference
}

#[tokio::test]
async fn drift_to_success_is_confirmed() {
    let stack = test_stack(setup_test_db().await).await;
    let owner = Uuid::new_v4();
    create_funded_wallet(&stack, owner, dec!(10000)).await;
    let reference = stale_otp_transfer(&stack, owner).await;

    stack
        .provider
        .set_remote_transfer_status(RemoteTransferStatus::Success);
    let report = reconciliation(&stack).run_once().await.unwrap();

    assert!(report.confirmed >= 1);
    let transfer = stack
        .transfers
        .find_by_reference(&reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transfer.status, TransferStatus::Success);
    // The debit stands: money really left.
    assert_eq!(stack.ledger.get_balance(owner).await.unwrap(), dec!(8000));
}

#[tokio::test]
async fn drift_to_failure_is_compensated() {
    let stack = test_stack(setup_test_db().await).await;
    let owner = Uuid::new_v4();
    create_funded_wallet(&stack, owner, dec!(10000)).await;
    let reference = stale_otp_transfer(&stack, owner).await;

    stack
        .provider
        .set_remote_transfer_status(RemoteTransferStatus::Failed);
    let report = reconciliation(&stack).run_once().await.unwrap();

    assert!(report.compensated >= 1);
    let transfer = stack
        .transfers
        .find_by_reference(&reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transfer.status, TransferStatus::Failed);
    assert_eq!(stack.ledger.get_balance(owner).await.unwrap(), dec!(10000));
    assert!(stack.ledger.verify_wallet_invariant(owner).await.unwrap());
}

#[tokio::test]
async fn still_pending_transfers_are_left_alone() {
    let stack = test_stack(setup_test_db().await).await;
    let owner = Uuid::new_v4();
    create_funded_wallet(&stack, owner, dec!(10000)).await;
    let reference = stale_otp_transfer(&stack, owner).await;

    stack
        .provider
        .set_remote_transfer_status(RemoteTransferStatus::Pending);
    let report = reconciliation(&stack).run_once().await.unwrap();

    assert!(report.still_pending >= 1);
    let transfer = stack
        .transfers
        .find_by_reference(&reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transfer.status, TransferStatus::OtpRequired);
    assert_eq!(stack.ledger.get_balance(owner).await.unwrap(), dec!(8000));
}

#[tokio::test]
async fn reconciliation_pass_is_idempotent() {
    let stack = test_stack(setup_test_db().await).await;
    let owner = Uuid::new_v4();
    create_funded_wallet(&stack, owner, dec!(10000)).await;
    stale_otp_transfer(&stack, owner).await;

    stack
        .provider
        .set_remote_transfer_status(RemoteTransferStatus::Failed);
    let service = reconciliation(&stack);
    service.run_once().await.unwrap();
    service.run_once().await.unwrap();

    // A second pass finds no stale non-terminal transfer and credits nothing.
    assert_eq!(stack.ledger.get_balance(owner).await.unwrap(), dec!(10000));
    assert!(stack.ledger.verify_wallet_invariant(owner).await.unwrap());
}
