mod common;

use common::{
    create_funded_wallet, create_unpaid_order, ledger_entry_count, setup_test_db, test_stack,
    TransferBehavior,
};
use payments_engine::models::{
    EntryKind, EntryOwner, EntryStatus, PaymentStatus, SettlementStatus, TransferStatus,
};
use payments_engine::provider::WebhookEvent;
use payments_engine::services::WithdrawalRequest;
use rust_decimal_macros::dec;
use sqlx::Row;
use uuid::Uuid;

#[tokio::test]
async fn payment_succeeded_marks_order_and_credits_merchant() {
    let stack = test_stack(setup_test_db().await).await;
    let merchant = Uuid::new_v4();
    let (order_id, reference, _) = create_unpaid_order(&stack.pool, merchant, dec!(10000), 1).await;

    stack
        .webhooks
        .process(WebhookEvent::PaymentSucceeded {
            reference: reference.clone(),
            amount: dec!(10000),
            fees: dec!(150),
        })
        .await
        .unwrap();

    let row = sqlx::query("SELECT payment_status::TEXT AS ps FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_one(&stack.pool)
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("ps"), "PAID");

    // Settlement: 10,000 - 500 platform - 150 gateway = 9,350.
    let settlement = stack.settlements.find_by_order(order_id).await.unwrap().unwrap();
    assert_eq!(settlement.platform_fee, dec!(500));
    assert_eq!(settlement.gateway_fee, dec!(150));
    assert_eq!(settlement.settlement_amount, dec!(9350));
    assert_eq!(settlement.status, SettlementStatus::Pending);

    // The merchant's settlement credit nets to the same figure.
    let credit = stack
        .ledger
        .find_entry_by_reference(&format!("STL-{}", order_id.simple()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(credit.kind, EntryKind::Settlement);
    assert_eq!(credit.net_amount, dec!(9350));
    assert_eq!(credit.merchant_id, Some(merchant));
    assert_eq!(stack.ledger.get_balance(merchant).await.unwrap(), dec!(9350));
}

#[tokio::test]
async fn payment_succeeded_replay_is_a_no_op() {
    let stack = test_stack(setup_test_db().await).await;
    let merchant = Uuid::new_v4();
    let (_, reference, _) = create_unpaid_order(&stack.pool, merchant, dec!(10000), 1).await;

    let event = WebhookEvent::PaymentSucceeded {
        reference,
        amount: dec!(10000),
        fees: dec!(150),
    };
    stack.webhooks.process(event.clone()).await.unwrap();
    let balance_after_first = stack.ledger.get_balance(merchant).await.unwrap();
    let entries_after_first = ledger_entry_count(&stack.pool, merchant).await;

    // Second delivery of the identical payload: no ledger writes.
    stack.webhooks.process(event).await.unwrap();

    assert_eq!(stack.ledger.get_balance(merchant).await.unwrap(), balance_after_first);
    assert_eq!(ledger_entry_count(&stack.pool, merchant).await, entries_after_first);
}

#[tokio::test]
async fn wallet_funding_is_idempotent_on_provider_reference() {
    let stack = test_stack(setup_test_db().await).await;
    let owner = Uuid::new_v4();
    let wallet = create_funded_wallet(&stack, owner, dec!(0)).await;

    let event = WebhookEvent::WalletFunded {
        provider_reference: format!("PSK-{}", Uuid::new_v4().simple()),
        customer_code: wallet.provider_customer_code.clone().unwrap(),
        amount: dec!(2500),
    };

    stack.webhooks.process(event.clone()).await.unwrap();
    stack.webhooks.process(event).await.unwrap();

    assert_eq!(stack.ledger.get_balance(owner).await.unwrap(), dec!(2500));
    assert_eq!(ledger_entry_count(&stack.pool, owner).await, 1);
}

#[tokio::test]
async fn virtual_account_assignment_activates_wallet() {
    let stack = test_stack(setup_test_db().await).await;
    let owner = Uuid::new_v4();

    let customer_code = format!("CUS_{}", owner.simple());
    sqlx::query(
        r#"
        INSERT INTO wallets (id, owner_id, currency, available_balance, pending_balance, ledger_balance, status, provider_customer_code, version, created_at, updated_at)
        VALUES ($1, $2, 'NGN', 0, 0, 0, 'PENDING', $3, 1, NOW(), NOW())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner)
    .bind(&customer_code)
    .execute(&stack.pool)
    .await
    .unwrap();

    stack
        .webhooks
        .process(WebhookEvent::VirtualAccountAssigned {
            customer_code,
            account_number: "0123456789".to_string(),
            bank_name: "Wema Bank".to_string(),
        })
        .await
        .unwrap();

    let row = sqlx::query(
        "SELECT status::TEXT AS status, account_number FROM wallets WHERE owner_id = $1",
    )
    .bind(owner)
    .fetch_one(&stack.pool)
    .await
    .unwrap();
    assert_eq!(row.get::<String, _>("status"), "ACTIVE");
    assert_eq!(row.get::<Option<String>, _>("account_number").as_deref(), Some("0123456789"));
}

#[tokio::test]
async fn transfer_failed_webhook_compensates_pending_transfer() {
    let stack = test_stack(setup_test_db().await).await;
    let owner = Uuid::new_v4();
    create_funded_wallet(&stack, owner, dec!(10000)).await;

    // OTP-gated transfer stays non-terminal with its debit applied.
    stack.provider.set_transfer_behavior(TransferBehavior::RequireOtp);
    let transfer = stack
        .transfers
        .initiate_withdrawal(WithdrawalRequest {
            owner: EntryOwner::User(owner),
            amount: dec!(3000),
            currency: "NGN".to_string(),
            kind: EntryKind::Withdrawal,
            bank_code: "058".to_string(),
            account_number: "0123456789".to_string(),
            account_name: "ADA OBI".to_string(),
            reason: None,
        })
        .await
        .unwrap();
    assert_eq!(stack.ledger.get_balance(owner).await.unwrap(), dec!(7000));

    let event = WebhookEvent::TransferFailed {
        reference: transfer.reference.clone(),
        reason: Some("could not credit recipient".to_string()),
    };
    stack.webhooks.process(event.clone()).await.unwrap();

    let transfer = stack
        .transfers
        .find_by_reference(&transfer.reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transfer.status, TransferStatus::Failed);
    assert_eq!(stack.ledger.get_balance(owner).await.unwrap(), dec!(10000));

    // Replaying the failure changes nothing more.
    stack.webhooks.process(event).await.unwrap();
    assert_eq!(stack.ledger.get_balance(owner).await.unwrap(), dec!(10000));
    assert!(stack.ledger.verify_wallet_invariant(owner).await.unwrap());
}

#[tokio::test]
async fn transfer_succeeded_webhook_is_idempotent() {
    let stack = test_stack(setup_test_db().await).await;
    let owner = Uuid::new_v4();
    create_funded_wallet(&stack, owner, dec!(10000)).await;

    stack.provider.set_transfer_behavior(TransferBehavior::RequireOtp);
    let transfer = stack
        .transfers
        .initiate_withdrawal(WithdrawalRequest {
            owner: EntryOwner::User(owner),
            amount: dec!(1000),
            currency: "NGN".to_string(),
            kind: EntryKind::Withdrawal,
            bank_code: "058".to_string(),
            account_number: "0123456789".to_string(),
            account_name: "ADA OBI".to_string(),
            reason: None,
        })
        .await
        .unwrap();

    let event = WebhookEvent::TransferSucceeded {
        reference: transfer.reference.clone(),
    };
    stack.webhooks.process(event.clone()).await.unwrap();
    stack.webhooks.process(event).await.unwrap();

    let transfer = stack
        .transfers
        .find_by_reference(&transfer.reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transfer.status, TransferStatus::Success);
    assert_eq!(stack.ledger.get_balance(owner).await.unwrap(), dec!(9000));
}

#[tokio::test]
async fn refund_failed_webhook_unwinds_refund_debits() {
    let stack = test_stack(setup_test_db().await).await;
    let merchant = Uuid::new_v4();
    create_funded_wallet(&stack, merchant, dec!(20000)).await;
    create_funded_wallet(&stack, stack.platform_account_id, dec!(50000)).await;

    let (order_id, _, _) = create_unpaid_order(&stack.pool, merchant, dec!(10000), 1).await;
    common::mark_order_paid(&stack.pool, order_id).await;

    let refund = stack
        .refunds
        .process_refund(payments_engine::services::RefundRequest {
            order_id,
            refund_type: payments_engine::models::RefundType::Full,
            amount: None,
            reason: "damaged".to_string(),
        })
        .await
        .unwrap();

    let merchant_balance_after_refund = stack.ledger.get_balance(merchant).await.unwrap();
    assert_eq!(merchant_balance_after_refund, dec!(20000) - dec!(9500));

    let event = WebhookEvent::RefundFailed {
        provider_reference: refund.provider_refund_reference.clone().unwrap(),
    };
    stack.webhooks.process(event.clone()).await.unwrap();

    // Both compensating debits were reversed; balances restored.
    assert_eq!(stack.ledger.get_balance(merchant).await.unwrap(), dec!(20000));
    assert_eq!(
        stack
            .ledger
            .get_balance(stack.platform_account_id)
            .await
            .unwrap(),
        dec!(50000)
    );

    // Replay changes nothing.
    stack.webhooks.process(event).await.unwrap();
    assert_eq!(stack.ledger.get_balance(merchant).await.unwrap(), dec!(20000));
}

#[tokio::test]
async fn unknown_events_are_ignored() {
    let stack = test_stack(setup_test_db().await).await;
    let result = stack
        .webhooks
        .process(WebhookEvent::Unknown {
            event: "subscription.create".to_string(),
        })
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn events_for_unknown_entities_are_swallowed() {
    let stack = test_stack(setup_test_db().await).await;

    let results = [
        stack
            .webhooks
            .process(WebhookEvent::PaymentSucceeded {
                reference: "ORD-missing".to_string(),
                amount: dec!(10),
                fees: dec!(0),
            })
            .await,
        stack
            .webhooks
            .process(WebhookEvent::TransferFailed {
                reference: "TRF-missing".to_string(),
                reason: None,
            })
            .await,
        stack
            .webhooks
            .process(WebhookEvent::WalletFunded {
                provider_reference: "PSK-missing".to_string(),
                customer_code: "CUS_missing".to_string(),
                amount: dec!(10),
            })
            .await,
    ];

    for result in results {
        assert!(result.is_ok());
    }
}

#[tokio::test]
async fn entry_status_terminality_guards_updates() {
    // Pure status-machine sanity used by the webhook guards.
    assert!(EntryStatus::Success.is_terminal());
    assert!(!EntryStatus::Pending.is_terminal());
    assert_eq!(PaymentStatus::Paid, PaymentStatus::Paid);
}
