//! `SqliteDatabase` is a concrete implementation of a Pi Market Engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the
//! [`crate::traits`] module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use pmg_common::MicroPi;
use sqlx::SqlitePool;

use super::db::{chat, db_url, discounts, new_pool, notifications, orders, payments, payouts, products, stores, users};
use crate::{
    db_types::{
        ChatMessage,
        Conversation,
        DiscountCode,
        NewDiscountCode,
        NewOrder,
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
        PaymentRecord,
        Payout,
        PayoutTask,
        PiPaymentStatus,
        Product,
        ProductChoice,
        Role,
        Roles,
        Store,
        User,
    },
    helpers::payout_amount,
    traits::{
        AuthApiError,
        AuthManagement,
        CompletionOutcome,
        FulfilmentOutcome,
        InsertPaymentOutcome,
        OrderFlowError,
        OrderManagement,
        PaymentManagement,
        PaymentStoreError,
        PayoutManagement,
        PayoutStoreError,
        StoreApiError,
        StoreManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new connection pool against the URL in `PMG_DATABASE_URL` (or the default).
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl PaymentManagement for SqliteDatabase {
    async fn insert_approved_payment(
        &self,
        payment: NewPaymentRecord,
    ) -> Result<InsertPaymentOutcome, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::insert_approved(payment, &mut conn).await
    }

    async fn mark_payment_completed(
        &self,
        payment_id: &PaymentId,
        txid: &str,
    ) -> Result<CompletionOutcome, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::mark_completed(payment_id, txid, &mut conn).await
    }

    async fn mark_payment_cancelled(
        &self,
        payment_id: &PaymentId,
        reason: &str,
    ) -> Result<PaymentRecord, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::mark_terminal(payment_id, PiPaymentStatus::Cancelled, reason, &mut conn).await
    }

    async fn mark_payment_failed(
        &self,
        payment_id: &PaymentId,
        reason: &str,
    ) -> Result<PaymentRecord, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::mark_terminal(payment_id, PiPaymentStatus::Failed, reason, &mut conn).await
    }

    async fn fetch_payment_record(&self, payment_id: &PaymentId) -> Result<Option<PaymentRecord>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_by_payment_id(payment_id, &mut conn).await
    }
}

impl OrderManagement for SqliteDatabase {
    /// The completion transaction. Everything between `begin` and `commit` either applies as a
    /// whole or not at all; in particular a stock shortfall on the last line unwinds the
    /// decrements already made for the earlier lines.
    async fn fulfil_payment(&self, payment: &PaymentRecord) -> Result<FulfilmentOutcome, OrderFlowError> {
        if payment.status != PiPaymentStatus::Completed {
            return Err(OrderFlowError::PaymentNotCompleted(payment.payment_id.clone()));
        }
        let mut tx = self.pool.begin().await?;
        if let Some(existing) = orders::fetch_order_by_payment_id(&payment.payment_id, &mut tx).await? {
            debug!("🗃️ Payment [{}] is already fulfilled by order {}", payment.payment_id, existing.order_id);
            return Ok(FulfilmentOutcome::AlreadyFulfilled(existing));
        }
        let meta = &payment.metadata.0;
        let store =
            stores::fetch_store(meta.store_id(), &mut tx).await?.ok_or(OrderFlowError::StoreNotFound(meta.store_id()))?;
        let mut items = Vec::new();
        for line in meta.lines() {
            products::decrement_stock_for_line(&line, &mut tx).await?;
            let product = products::fetch_product(line.product_id, &mut tx)
                .await?
                .ok_or(OrderFlowError::ProductNotFound(line.product_id))?;
            items.push(OrderItem {
                product_id: line.product_id,
                name: product.name,
                choice: line.choice.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }
        let order_id = OrderId::random();
        let discount_amount = match meta.discount_code() {
            Some(code) => {
                discounts::apply_code(store.id, code, &order_id, payment.user_id, payment.amount, &mut tx).await?
            },
            None => MicroPi::from(0),
        };
        let new_order = NewOrder {
            order_id: order_id.clone(),
            payment_id: Some(payment.payment_id.clone()),
            store_id: store.id,
            customer_id: payment.user_id,
            items,
            total_amount: payment.amount,
            discount_amount,
            delivery_fee: meta.delivery_fee(),
            delivery_address: meta.delivery_address().to_string(),
        };
        let order = match orders::try_insert_order(new_order, &mut tx).await? {
            Some(order) => order,
            None => {
                // A concurrent fulfilment won the insert race. Dropping the transaction unwinds
                // our decrements; return the winner's order.
                let existing = orders::fetch_order_by_payment_id(&payment.payment_id, &mut tx).await?.ok_or_else(
                    || OrderFlowError::DatabaseError(format!("Order for {} vanished mid-race", payment.payment_id)),
                )?;
                return Ok(FulfilmentOutcome::AlreadyFulfilled(existing));
            },
        };
        payments::link_order(&payment.payment_id, &order_id, &mut tx).await?;
        chat::open_conversation(&order_id, &mut tx).await?;
        payouts::enqueue_task(&order_id, store.id, payout_amount(order.total_amount), Utc::now(), &mut tx).await?;
        let note = format!("New order {} for {} ({} items)", order_id, order.total_amount, order.items.0.len());
        notifications::insert(store.owner_id, &note, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Payment [{}] fulfilled by order {order_id}", payment.payment_id);
        Ok(FulfilmentOutcome::Created(order))
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_order_id(order_id, &mut conn).await?)
    }

    async fn fetch_order_by_payment_id(&self, payment_id: &PaymentId) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_payment_id(payment_id, &mut conn).await?)
    }

    async fn fetch_orders_for_store(&self, store_id: i64) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_store(store_id, &mut conn).await?)
    }

    async fn fetch_orders_for_customer(&self, customer_id: i64) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_customer(customer_id, &mut conn).await?)
    }

    async fn update_order_status(&self, order_id: &OrderId, status: OrderStatusType) -> Result<Order, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order_status(order_id, status, &mut conn).await
    }

    async fn mark_order_delivered(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::update_order_status(order_id, OrderStatusType::Delivered, &mut tx).await?;
        chat::archive_for_order(order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn assign_driver(&self, order_id: &OrderId, driver_id: i64) -> Result<Order, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        orders::assign_driver(order_id, driver_id, &mut conn).await
    }

    async fn conversation_for_order(&self, order_id: &OrderId) -> Result<Option<Conversation>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(chat::conversation_for_order(order_id, &mut conn).await?)
    }

    async fn post_chat_message(
        &self,
        order_id: &OrderId,
        sender_id: i64,
        body: &str,
    ) -> Result<ChatMessage, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        chat::post_message(order_id, sender_id, body, &mut conn).await
    }
}

impl PayoutManagement for SqliteDatabase {
    async fn record_payout(&self, payout: NewPayout) -> Result<Payout, PayoutStoreError> {
        let mut conn = self.pool.acquire().await?;
        payouts::insert_payout(payout, &mut conn).await
    }

    async fn fetch_payout(&self, id: i64) -> Result<Option<Payout>, PayoutStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::fetch_payout(id, &mut conn).await?)
    }

    async fn fetch_payouts_for_store(&self, store_id: i64) -> Result<Vec<Payout>, PayoutStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::fetch_payouts_for_store(store_id, &mut conn).await?)
    }

    async fn payout_attempts_for_order(&self, order_id: &OrderId) -> Result<i64, PayoutStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::attempts_for_order(order_id, &mut conn).await?)
    }

    async fn enqueue_payout_task(
        &self,
        order_id: &OrderId,
        store_id: i64,
        amount: MicroPi,
        run_at: DateTime<Utc>,
    ) -> Result<PayoutTask, PayoutStoreError> {
        let mut conn = self.pool.acquire().await?;
        payouts::enqueue_task(order_id, store_id, amount, run_at, &mut conn).await
    }

    async fn due_payout_tasks(&self, limit: i64) -> Result<Vec<PayoutTask>, PayoutStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::due_tasks(limit, &mut conn).await?)
    }

    async fn reschedule_payout_task(
        &self,
        task_id: i64,
        run_at: DateTime<Utc>,
        error: Option<&str>,
    ) -> Result<PayoutTask, PayoutStoreError> {
        let mut conn = self.pool.acquire().await?;
        payouts::reschedule_task(task_id, run_at, error, &mut conn).await
    }

    async fn remove_payout_task(&self, task_id: i64) -> Result<(), PayoutStoreError> {
        let mut conn = self.pool.acquire().await?;
        payouts::remove_task(task_id, &mut conn).await
    }
}

impl StoreManagement for SqliteDatabase {
    async fn create_store(&self, store: NewStore) -> Result<Store, StoreApiError> {
        let mut conn = self.pool.acquire().await?;
        stores::insert_store(store, &mut conn).await
    }

    async fn fetch_store(&self, id: i64) -> Result<Option<Store>, StoreApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(stores::fetch_store(id, &mut conn).await?)
    }

    async fn fetch_stores_for_owner(&self, owner_id: i64) -> Result<Vec<Store>, StoreApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(stores::fetch_stores_for_owner(owner_id, &mut conn).await?)
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, StoreApiError> {
        let mut tx = self.pool.begin().await?;
        let created = products::insert_product(product, &mut tx).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn fetch_product(&self, id: i64) -> Result<Option<Product>, StoreApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::fetch_product(id, &mut conn).await?)
    }

    async fn fetch_product_choices(&self, product_id: i64) -> Result<Vec<ProductChoice>, StoreApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::fetch_choices(product_id, &mut conn).await?)
    }

    async fn create_discount_code(&self, code: NewDiscountCode) -> Result<DiscountCode, StoreApiError> {
        let mut conn = self.pool.acquire().await?;
        discounts::insert_code(code, &mut conn).await
    }

    async fn fetch_discount_code(&self, store_id: i64, code: &str) -> Result<Option<DiscountCode>, StoreApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(discounts::fetch_code(store_id, code, &mut conn).await?)
    }

    async fn relink_payout_destination(
        &self,
        owner_id: i64,
        wallet_address: &str,
        pi_user_id: &str,
    ) -> Result<u64, StoreApiError> {
        let mut tx = self.pool.begin().await?;
        users::set_wallet_address(owner_id, wallet_address, &mut tx)
            .await
            .map_err(|e| StoreApiError::DatabaseError(e.to_string()))?;
        let updated = stores::propagate_payout_destination(owner_id, wallet_address, pi_user_id, &mut tx).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn create_notification(&self, user_id: i64, body: &str) -> Result<Notification, StoreApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(notifications::insert(user_id, body, &mut conn).await?)
    }

    async fn fetch_notifications_for_user(&self, user_id: i64) -> Result<Vec<Notification>, StoreApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(notifications::fetch_for_user(user_id, &mut conn).await?)
    }
}

impl AuthManagement for SqliteDatabase {
    async fn upsert_network_user(
        &self,
        pi_uid: &str,
        username: &str,
        wallet_address: Option<&str>,
    ) -> Result<User, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        users::upsert_network_user(pi_uid, username, wallet_address, &mut conn).await
    }

    async fn fetch_user(&self, id: i64) -> Result<Option<User>, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(users::fetch_user(id, &mut conn).await?)
    }

    async fn fetch_user_by_pi_uid(&self, pi_uid: &str) -> Result<Option<User>, AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        Ok(users::fetch_user_by_pi_uid(pi_uid, &mut conn).await?)
    }

    async fn upsert_nonce_for_user(&self, user_id: i64, nonce: i64) -> Result<(), AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        users::update_nonce(user_id, nonce, &mut conn).await
    }

    async fn assign_roles(&self, user_id: i64, roles: &Roles) -> Result<(), AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        users::assign_roles(user_id, roles, &mut conn).await
    }

    async fn check_user_has_role(&self, user_id: i64, role: Role) -> Result<(), AuthApiError> {
        let mut conn = self.pool.acquire().await?;
        users::check_user_has_role(user_id, role, &mut conn).await
    }
}
