mod support;

use pi_market_engine::{
    db_types::{CartLine, NewDiscountCode, NewPaymentRecord, PaymentMetadata, PiPaymentStatus},
    events::EventProducers,
    traits::{OrderManagement, PaymentManagement, PaymentStoreError, StoreManagement},
    PaymentFlowApi,
    PaymentFlowError,
    PayoutApi,
};
use pmg_common::MicroPi;
use support::{seed_product, seed_product_with_choices, setup};

fn cart_payment(
    payment_id: &str,
    user_id: i64,
    store_id: i64,
    amount: MicroPi,
    items: Vec<CartLine>,
    discount_code: Option<&str>,
) -> NewPaymentRecord {
    NewPaymentRecord {
        payment_id: payment_id.into(),
        user_id,
        amount,
        metadata: PaymentMetadata::Cart {
            store_id,
            items,
            delivery_address: "12 Main Rd".to_string(),
            delivery_fee: MicroPi::from_pi(2),
            discount_code: discount_code.map(|s| s.to_string()),
        },
    }
}

#[tokio::test]
async fn completing_a_payment_twice_creates_exactly_one_order() {
    let world = setup().await;
    let product_id = seed_product(&world, "Steak pie", 4, 10).await;
    let api = PaymentFlowApi::new(world.db.clone(), EventProducers::default());
    let line = CartLine { product_id, choice: None, quantity: 2, unit_price: MicroPi::from_pi(4) };
    let payment = cart_payment("pay-dup", world.customer.id, world.store.id, MicroPi::from_pi(10), vec![line], None);
    api.approve_payment(payment).await.unwrap();

    let first = api.complete_payment(&"pay-dup".into(), "tx-1").await.unwrap();
    assert!(first.newly_fulfilled);
    // A redelivered webhook (or a racing client confirmation) is a no-op.
    let second = api.complete_payment(&"pay-dup".into(), "tx-1").await.unwrap();
    assert!(!second.newly_fulfilled);
    assert_eq!(first.order.order_id, second.order.order_id);

    let orders = world.db.fetch_orders_for_store(world.store.id).await.unwrap();
    assert_eq!(orders.len(), 1);
    // Stock was decremented once, not twice.
    let product = world.db.fetch_product(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 8);
}

#[tokio::test]
async fn discount_and_payout_amounts() {
    let world = setup().await;
    let product_id = seed_product(&world, "Quiche", 9, 5).await;
    world
        .db
        .create_discount_code(NewDiscountCode {
            store_id: world.store.id,
            code: "WELCOME10".to_string(),
            percent: 10,
            expires_at: None,
            max_uses: 100,
        })
        .await
        .unwrap();
    let api = PaymentFlowApi::new(world.db.clone(), EventProducers::default());
    let payouts = PayoutApi::new(world.db.clone(), EventProducers::default());

    let line = CartLine { product_id, choice: None, quantity: 1, unit_price: MicroPi::from_pi(9) };
    let payment = cart_payment(
        "pay-discount",
        world.customer.id,
        world.store.id,
        MicroPi::from_pi(10),
        vec![line],
        Some("WELCOME10"),
    );
    api.approve_payment(payment).await.unwrap();
    let result = api.complete_payment(&"pay-discount".into(), "tx-2").await.unwrap();

    // A 10π payment with a 10% code and a 2π delivery fee: the order total stays 10π, the
    // discount is recorded separately, and the scheduled payout is 10π less 5% commission.
    assert_eq!(result.order.total_amount, MicroPi::from_pi(10));
    assert_eq!(result.order.discount_amount, MicroPi::from_pi(1));
    assert_eq!(result.order.delivery_fee, MicroPi::from_pi(2));
    let due = payouts.due_tasks(10).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].amount, MicroPi::from(9_500_000));
    assert_eq!(due[0].order_id, result.order.order_id);
}

#[tokio::test]
async fn insufficient_stock_applies_nothing() {
    let world = setup().await;
    let plentiful = seed_product(&world, "Bread", 1, 100).await;
    let scarce = seed_product(&world, "Truffle", 50, 1).await;
    let api = PaymentFlowApi::new(world.db.clone(), EventProducers::default());
    let lines = vec![
        CartLine { product_id: plentiful, choice: None, quantity: 3, unit_price: MicroPi::from_pi(1) },
        CartLine { product_id: scarce, choice: None, quantity: 2, unit_price: MicroPi::from_pi(50) },
    ];
    let payment =
        cart_payment("pay-short", world.customer.id, world.store.id, MicroPi::from_pi(103), lines, None);
    api.approve_payment(payment).await.unwrap();

    let result = api.complete_payment(&"pay-short".into(), "tx-3").await;
    assert!(matches!(
        result,
        Err(PaymentFlowError::OrderFlow(pi_market_engine::traits::OrderFlowError::InsufficientStock { .. }))
    ));
    // The whole fulfilment rolled back: the first line's decrement did not stick, and no order
    // exists for the payment.
    let bread = world.db.fetch_product(plentiful).await.unwrap().unwrap();
    assert_eq!(bread.stock, 100);
    assert!(world.db.fetch_order_by_payment_id(&"pay-short".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn choice_level_stock_is_decremented_alone() {
    let world = setup().await;
    let product_id =
        seed_product_with_choices(&world, "Hoodie", 12, 7, &[("small", 5), ("large", 5)]).await;
    let api = PaymentFlowApi::new(world.db.clone(), EventProducers::default());
    let line =
        CartLine { product_id, choice: Some("large".to_string()), quantity: 2, unit_price: MicroPi::from_pi(12) };
    let payment = cart_payment("pay-choice", world.customer.id, world.store.id, MicroPi::from_pi(24), vec![line], None);
    api.approve_payment(payment).await.unwrap();
    api.complete_payment(&"pay-choice".into(), "tx-4").await.unwrap();

    let choices = world.db.fetch_product_choices(product_id).await.unwrap();
    let large = choices.iter().find(|c| c.name == "large").unwrap();
    let small = choices.iter().find(|c| c.name == "small").unwrap();
    assert_eq!(large.stock, 3);
    // Sibling choices and the parent product's own stock are untouched.
    assert_eq!(small.stock, 5);
    let product = world.db.fetch_product(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 7);
}

#[tokio::test]
async fn terminal_payment_states_are_sticky() {
    let world = setup().await;
    let product_id = seed_product(&world, "Tart", 3, 4).await;
    let api = PaymentFlowApi::new(world.db.clone(), EventProducers::default());
    let line = CartLine { product_id, choice: None, quantity: 1, unit_price: MicroPi::from_pi(3) };
    let payment = cart_payment("pay-cancel", world.customer.id, world.store.id, MicroPi::from_pi(5), vec![line], None);
    api.approve_payment(payment).await.unwrap();

    let cancelled = api.cancel_payment(&"pay-cancel".into(), "user backed out").await.unwrap();
    assert_eq!(cancelled.status, PiPaymentStatus::Cancelled);
    // Cancelling again is a no-op, but completing a cancelled payment is refused.
    api.cancel_payment(&"pay-cancel".into(), "again").await.unwrap();
    let completed = api.complete_payment(&"pay-cancel".into(), "tx-5").await;
    assert!(matches!(
        completed,
        Err(PaymentFlowError::PaymentStore(PaymentStoreError::InvalidStatusChange { .. }))
    ));
    let record = world.db.fetch_payment_record(&"pay-cancel".into()).await.unwrap().unwrap();
    assert_eq!(record.status, PiPaymentStatus::Cancelled);
}
