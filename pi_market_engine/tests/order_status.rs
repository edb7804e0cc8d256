mod support;

use pi_market_engine::{
    db_types::{CartLine, NewPaymentRecord, Order, OrderStatusType, PaymentMetadata},
    events::EventProducers,
    traits::OrderFlowError,
    OrderStatusApi,
    PaymentFlowApi,
};
use pmg_common::MicroPi;
use support::{actor_for, seed_product, setup, TestWorld};

/// Completes a single-product payment and returns the resulting order.
async fn place_order(world: &TestWorld, payment_id: &str) -> Order {
    let product_id = seed_product(world, "Lasagne", 6, 20).await;
    let api = PaymentFlowApi::new(world.db.clone(), EventProducers::default());
    let payment = NewPaymentRecord {
        payment_id: payment_id.into(),
        user_id: world.customer.id,
        amount: MicroPi::from_pi(6),
        metadata: PaymentMetadata::Single {
            store_id: world.store.id,
            line: CartLine { product_id, choice: None, quantity: 1, unit_price: MicroPi::from_pi(6) },
            delivery_address: "3 Hill St".to_string(),
            delivery_fee: MicroPi::from_pi(1),
        },
    };
    api.approve_payment(payment).await.unwrap();
    api.complete_payment(&payment_id.into(), "tx-order").await.unwrap().order
}

#[tokio::test]
async fn the_happy_path_ends_with_an_archived_conversation() {
    let world = setup().await;
    let order = place_order(&world, "pay-happy").await;
    let api = OrderStatusApi::new(world.db.clone(), EventProducers::default());
    let owner = actor_for(&world.owner);
    let driver = actor_for(&world.driver);
    let customer = actor_for(&world.customer);

    assert_eq!(order.status, OrderStatusType::Pending);
    api.update_status(&owner, &order.order_id, OrderStatusType::Confirmed).await.unwrap();
    // Chat works while the order is live.
    api.post_message(&customer, &order.order_id, "please ring the bell").await.unwrap();
    api.update_status(&owner, &order.order_id, OrderStatusType::Preparing).await.unwrap();
    api.assign_driver(&owner, &order.order_id, world.driver.id).await.unwrap();
    api.update_status(&owner, &order.order_id, OrderStatusType::OutForDelivery).await.unwrap();
    let delivered = api.update_status(&driver, &order.order_id, OrderStatusType::Delivered).await.unwrap();
    assert_eq!(delivered.status, OrderStatusType::Delivered);

    // Delivery archived the conversation; nobody can post any more.
    let result = api.post_message(&customer, &order.order_id, "thanks!").await;
    assert!(matches!(result, Err(OrderFlowError::ConversationArchived(_))));
}

#[tokio::test]
async fn only_the_assigned_driver_may_deliver() {
    let world = setup().await;
    let order = place_order(&world, "pay-deliver").await;
    let api = OrderStatusApi::new(world.db.clone(), EventProducers::default());
    let owner = actor_for(&world.owner);
    let driver = actor_for(&world.driver);

    api.update_status(&owner, &order.order_id, OrderStatusType::Confirmed).await.unwrap();
    api.update_status(&owner, &order.order_id, OrderStatusType::Preparing).await.unwrap();
    api.assign_driver(&owner, &order.order_id, world.driver.id).await.unwrap();
    api.update_status(&owner, &order.order_id, OrderStatusType::OutForDelivery).await.unwrap();

    // The store owner can never set Delivered, even on their own store's order.
    let by_owner = api.update_status(&owner, &order.order_id, OrderStatusType::Delivered).await;
    assert!(matches!(by_owner, Err(OrderFlowError::Unauthorized(_))));
    // A different driver cannot deliver either.
    let other = actor_for(&world.customer);
    let by_other = api.update_status(&other, &order.order_id, OrderStatusType::Delivered).await;
    assert!(matches!(by_other, Err(OrderFlowError::Unauthorized(_))));
    api.update_status(&driver, &order.order_id, OrderStatusType::Delivered).await.unwrap();
}

#[tokio::test]
async fn out_for_delivery_requires_a_driver() {
    let world = setup().await;
    let order = place_order(&world, "pay-nodriver").await;
    let api = OrderStatusApi::new(world.db.clone(), EventProducers::default());
    let owner = actor_for(&world.owner);

    api.update_status(&owner, &order.order_id, OrderStatusType::Confirmed).await.unwrap();
    api.update_status(&owner, &order.order_id, OrderStatusType::Preparing).await.unwrap();
    let result = api.update_status(&owner, &order.order_id, OrderStatusType::OutForDelivery).await;
    assert!(matches!(result, Err(OrderFlowError::DriverNotAssigned)));
}

#[tokio::test]
async fn transitions_follow_the_sequence() {
    let world = setup().await;
    let order = place_order(&world, "pay-sequence").await;
    let api = OrderStatusApi::new(world.db.clone(), EventProducers::default());
    let owner = actor_for(&world.owner);

    // Skipping Confirmed is not allowed.
    let skipped = api.update_status(&owner, &order.order_id, OrderStatusType::Preparing).await;
    assert!(matches!(skipped, Err(OrderFlowError::InvalidTransition { .. })));
    // Customers cannot drive the store-side transitions.
    let customer = actor_for(&world.customer);
    let by_customer = api.update_status(&customer, &order.order_id, OrderStatusType::Confirmed).await;
    assert!(matches!(by_customer, Err(OrderFlowError::Unauthorized(_))));
}

#[tokio::test]
async fn cancellation_is_terminal() {
    let world = setup().await;
    let order = place_order(&world, "pay-cancelled").await;
    let api = OrderStatusApi::new(world.db.clone(), EventProducers::default());
    let owner = actor_for(&world.owner);

    let cancelled = api.update_status(&owner, &order.order_id, OrderStatusType::Cancelled).await.unwrap();
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);
    let revived = api.update_status(&owner, &order.order_id, OrderStatusType::Confirmed).await;
    assert!(matches!(revived, Err(OrderFlowError::InvalidTransition { .. })));
}
