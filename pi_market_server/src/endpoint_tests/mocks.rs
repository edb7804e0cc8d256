use chrono::{DateTime, Utc};
use mockall::mock;
use pi_market_engine::{
    db_types::{
        CartLine,
        ChatMessage,
        Conversation,
        DiscountCode,
        Json,
        NewDiscountCode,
        NewPaymentRecord,
        NewPayout,
        NewProduct,
        NewStore,
        Notification,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        PaymentId,
        PaymentMetadata,
        PaymentRecord,
        Payout,
        PayoutStatus,
        PayoutTask,
        PiPaymentStatus,
        Product,
        ProductChoice,
        Store,
    },
    traits::{
        CompletionOutcome,
        FulfilmentOutcome,
        InsertPaymentOutcome,
        OrderFlowError,
        PaymentStoreError,
        PayoutStoreError,
        StoreApiError,
    },
};
use pmg_common::MicroPi;

mock! {
    pub PaymentDb {}

    impl Clone for PaymentDb {
        fn clone(&self) -> Self;
    }

    impl pi_market_engine::traits::PaymentManagement for PaymentDb {
        async fn insert_approved_payment(&self, payment: NewPaymentRecord) -> Result<InsertPaymentOutcome, PaymentStoreError>;
        async fn mark_payment_completed(&self, payment_id: &PaymentId, txid: &str) -> Result<CompletionOutcome, PaymentStoreError>;
        async fn mark_payment_cancelled(&self, payment_id: &PaymentId, reason: &str) -> Result<PaymentRecord, PaymentStoreError>;
        async fn mark_payment_failed(&self, payment_id: &PaymentId, reason: &str) -> Result<PaymentRecord, PaymentStoreError>;
        async fn fetch_payment_record(&self, payment_id: &PaymentId) -> Result<Option<PaymentRecord>, PaymentStoreError>;
    }

    impl pi_market_engine::traits::OrderManagement for PaymentDb {
        async fn fulfil_payment(&self, payment: &PaymentRecord) -> Result<FulfilmentOutcome, OrderFlowError>;
        async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError>;
        async fn fetch_order_by_payment_id(&self, payment_id: &PaymentId) -> Result<Option<Order>, OrderFlowError>;
        async fn fetch_orders_for_store(&self, store_id: i64) -> Result<Vec<Order>, OrderFlowError>;
        async fn fetch_orders_for_customer(&self, customer_id: i64) -> Result<Vec<Order>, OrderFlowError>;
        async fn update_order_status(&self, order_id: &OrderId, status: OrderStatusType) -> Result<Order, OrderFlowError>;
        async fn mark_order_delivered(&self, order_id: &OrderId) -> Result<Order, OrderFlowError>;
        async fn assign_driver(&self, order_id: &OrderId, driver_id: i64) -> Result<Order, OrderFlowError>;
        async fn conversation_for_order(&self, order_id: &OrderId) -> Result<Option<Conversation>, OrderFlowError>;
        async fn post_chat_message(&self, order_id: &OrderId, sender_id: i64, body: &str) -> Result<ChatMessage, OrderFlowError>;
    }
}

mock! {
    pub PayoutDb {}

    impl Clone for PayoutDb {
        fn clone(&self) -> Self;
    }

    impl pi_market_engine::traits::PayoutManagement for PayoutDb {
        async fn record_payout(&self, payout: NewPayout) -> Result<Payout, PayoutStoreError>;
        async fn fetch_payout(&self, id: i64) -> Result<Option<Payout>, PayoutStoreError>;
        async fn fetch_payouts_for_store(&self, store_id: i64) -> Result<Vec<Payout>, PayoutStoreError>;
        async fn payout_attempts_for_order(&self, order_id: &OrderId) -> Result<i64, PayoutStoreError>;
        async fn enqueue_payout_task(&self, order_id: &OrderId, store_id: i64, amount: MicroPi, run_at: DateTime<Utc>) -> Result<PayoutTask, PayoutStoreError>;
        async fn due_payout_tasks(&self, limit: i64) -> Result<Vec<PayoutTask>, PayoutStoreError>;
        async fn reschedule_payout_task<'a>(&self, task_id: i64, run_at: DateTime<Utc>, error: Option<&'a str>) -> Result<PayoutTask, PayoutStoreError>;
        async fn remove_payout_task(&self, task_id: i64) -> Result<(), PayoutStoreError>;
    }

    impl pi_market_engine::traits::StoreManagement for PayoutDb {
        async fn create_store(&self, store: NewStore) -> Result<Store, StoreApiError>;
        async fn fetch_store(&self, id: i64) -> Result<Option<Store>, StoreApiError>;
        async fn fetch_stores_for_owner(&self, owner_id: i64) -> Result<Vec<Store>, StoreApiError>;
        async fn create_product(&self, product: NewProduct) -> Result<Product, StoreApiError>;
        async fn fetch_product(&self, id: i64) -> Result<Option<Product>, StoreApiError>;
        async fn fetch_product_choices(&self, product_id: i64) -> Result<Vec<ProductChoice>, StoreApiError>;
        async fn create_discount_code(&self, code: NewDiscountCode) -> Result<DiscountCode, StoreApiError>;
        async fn fetch_discount_code(&self, store_id: i64, code: &str) -> Result<Option<DiscountCode>, StoreApiError>;
        async fn relink_payout_destination(&self, owner_id: i64, wallet_address: &str, pi_user_id: &str) -> Result<u64, StoreApiError>;
        async fn create_notification(&self, user_id: i64, body: &str) -> Result<Notification, StoreApiError>;
        async fn fetch_notifications_for_user(&self, user_id: i64) -> Result<Vec<Notification>, StoreApiError>;
    }
}

//--------------------------------------      Fixtures       ---------------------------------------------------------

pub fn payment_record(payment_id: &str, status: PiPaymentStatus) -> PaymentRecord {
    PaymentRecord {
        id: 1,
        payment_id: payment_id.into(),
        user_id: 11,
        amount: MicroPi::from_pi(10),
        metadata: Json(PaymentMetadata::Single {
            store_id: 5,
            line: CartLine { product_id: 3, choice: None, quantity: 1, unit_price: MicroPi::from_pi(10) },
            delivery_address: "1 Test Lane".to_string(),
            delivery_fee: MicroPi::from_pi(2),
        }),
        status,
        txid: None,
        failure_reason: None,
        order_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn order(order_id: &str, payment_id: &str) -> Order {
    Order {
        id: 1,
        order_id: OrderId::from(order_id.to_string()),
        payment_id: Some(PaymentId::from(payment_id)),
        store_id: 5,
        customer_id: 11,
        items: Json(vec![OrderItem {
            product_id: 3,
            name: "Test product".to_string(),
            choice: None,
            quantity: 1,
            unit_price: MicroPi::from_pi(10),
        }]),
        total_amount: MicroPi::from_pi(10),
        discount_amount: MicroPi::from(0),
        delivery_fee: MicroPi::from_pi(2),
        delivery_address: "1 Test Lane".to_string(),
        status: OrderStatusType::Pending,
        driver_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn store(id: i64, destination: Option<&str>) -> Store {
    Store {
        id,
        owner_id: 21,
        name: "Test store".to_string(),
        wallet_address: destination.map(|s| format!("wallet-{s}")),
        pi_user_id: destination.map(|s| s.to_string()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn payout_task(id: i64, order_id: &str, store_id: i64) -> PayoutTask {
    PayoutTask {
        id,
        order_id: OrderId::from(order_id.to_string()),
        store_id,
        amount: MicroPi::from(9_500_000),
        run_at: Utc::now(),
        attempts: 0,
        last_error: None,
        created_at: Utc::now(),
    }
}

pub fn payout(id: i64, order_id: &str, store_id: i64, status: PayoutStatus) -> Payout {
    Payout {
        id,
        order_id: OrderId::from(order_id.to_string()),
        store_id,
        amount: MicroPi::from(9_500_000),
        status,
        txid: None,
        failure_reason: None,
        attempt: 1,
        created_at: Utc::now(),
    }
}
