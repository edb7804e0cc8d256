mod support;

use pi_market_engine::{
    db_types::{NewPayout, OrderId, PayoutStatus},
    events::EventProducers,
    PayoutApi,
    PayoutApiError,
    StoreApi,
};
use pmg_common::MicroPi;
use support::{actor_for, setup};

fn failed_attempt(order_id: &OrderId, store_id: i64) -> NewPayout {
    NewPayout {
        order_id: order_id.clone(),
        store_id,
        amount: MicroPi::from_pi(9),
        status: PayoutStatus::Failed,
        txid: None,
        failure_reason: Some("ledger rejected the transfer".to_string()),
        attempt: 0,
    }
}

#[tokio::test]
async fn retrying_a_failed_payout_is_owner_only() {
    let world = setup().await;
    let api = PayoutApi::new(world.db.clone(), EventProducers::default());
    let order_id = OrderId::from("ord-payout-1".to_string());
    let payout = api.record_attempt(failed_attempt(&order_id, world.store.id)).await.unwrap();
    assert_eq!(payout.attempt, 1);

    let stranger = actor_for(&world.customer);
    let refused = api.retry_failed_payout(&stranger, payout.id).await;
    assert!(matches!(refused, Err(PayoutApiError::Unauthorized(_))));

    let owner = actor_for(&world.owner);
    let task = api.retry_failed_payout(&owner, payout.id).await.unwrap();
    assert_eq!(task.order_id, order_id);
    assert_eq!(task.amount, MicroPi::from_pi(9));
    // The retry queued a task; the original attempt row is untouched.
    let rows = api.payouts_for_store(&owner, world.store.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, PayoutStatus::Failed);
}

#[tokio::test]
async fn only_failed_payouts_can_be_retried() {
    let world = setup().await;
    let api = PayoutApi::new(world.db.clone(), EventProducers::default());
    let order_id = OrderId::from("ord-payout-2".to_string());
    let completed = api
        .record_attempt(NewPayout {
            status: PayoutStatus::Completed,
            txid: Some("tx-done".to_string()),
            failure_reason: None,
            ..failed_attempt(&order_id, world.store.id)
        })
        .await
        .unwrap();
    let owner = actor_for(&world.owner);
    let result = api.retry_failed_payout(&owner, completed.id).await;
    assert!(matches!(result, Err(PayoutApiError::NotRetryable(_))));
}

#[tokio::test]
async fn relinking_propagates_to_every_store() {
    let world = setup().await;
    let stores = StoreApi::new(world.db.clone());
    let owner = actor_for(&world.owner);
    // A second store for the same owner.
    stores.create_store(&owner, "Bob's Other Pies").await.unwrap();
    assert!(!world.store.has_payout_destination());

    let updated = stores.relink_pi_account(&owner, "wallet-bob-new", "uid-bob").await.unwrap();
    assert_eq!(updated, 2);
    for store in stores.stores_for_owner(world.owner.id).await.unwrap() {
        assert!(store.has_payout_destination());
        assert_eq!(store.wallet_address.as_deref(), Some("wallet-bob-new"));
        assert_eq!(store.pi_user_id.as_deref(), Some("uid-bob"));
    }
}
