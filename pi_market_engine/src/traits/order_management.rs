use thiserror::Error;

use crate::{
    db_types::{ChatMessage, Conversation, Order, OrderId, OrderStatusType, PaymentId, PaymentRecord},
    traits::FulfilmentOutcome,
};

/// Order fulfilment and the order/chat lifecycle.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// Turns a completed payment record into an order, in a single atomic transaction:
    ///
    /// * every purchased line's stock is decremented conditionally (choice-level stock for lines
    ///   with a choice, product-level stock otherwise); any shortfall rolls the whole transaction
    ///   back, so a multi-line failure never applies partially;
    /// * the order is inserted with its items snapshot; the unique payment-id column turns a
    ///   duplicate fulfilment into [`FulfilmentOutcome::AlreadyFulfilled`];
    /// * a discount usage row is recorded when the metadata carried a code;
    /// * the payment record is linked to the order;
    /// * the order's chat conversation is opened;
    /// * a payout task for the order total less commission is enqueued;
    /// * the store owner gets a notification row.
    async fn fulfil_payment(&self, payment: &PaymentRecord) -> Result<FulfilmentOutcome, OrderFlowError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError>;

    async fn fetch_order_by_payment_id(&self, payment_id: &PaymentId) -> Result<Option<Order>, OrderFlowError>;

    async fn fetch_orders_for_store(&self, store_id: i64) -> Result<Vec<Order>, OrderFlowError>;

    async fn fetch_orders_for_customer(&self, customer_id: i64) -> Result<Vec<Order>, OrderFlowError>;

    /// Writes the new status. Legality of the transition and authorization of the actor are the
    /// responsibility of [`crate::OrderStatusApi`]; the backend only refuses unknown orders.
    async fn update_order_status(&self, order_id: &OrderId, status: OrderStatusType) -> Result<Order, OrderFlowError>;

    /// Marks the order delivered and archives its conversation, in one transaction.
    async fn mark_order_delivered(&self, order_id: &OrderId) -> Result<Order, OrderFlowError>;

    async fn assign_driver(&self, order_id: &OrderId, driver_id: i64) -> Result<Order, OrderFlowError>;

    async fn conversation_for_order(&self, order_id: &OrderId) -> Result<Option<Conversation>, OrderFlowError>;

    /// Inserts a chat message. The insert is conditional on the conversation not being archived.
    async fn post_chat_message(
        &self,
        order_id: &OrderId,
        sender_id: i64,
        body: &str,
    ) -> Result<ChatMessage, OrderFlowError>;
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Payment {0} is not in Completed state, refusing to fulfil it")]
    PaymentNotCompleted(PaymentId),
    #[error("Insufficient stock for product {product_id} (choice: {choice:?})")]
    InsufficientStock { product_id: i64, choice: Option<String> },
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Product {product_id} has no choice named {choice}")]
    ChoiceNotFound { product_id: i64, choice: String },
    #[error("Discount code cannot be used: {0}")]
    DiscountNotUsable(String),
    #[error("Store {0} does not exist")]
    StoreNotFound(i64),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("Not authorized: {0}")]
    Unauthorized(String),
    #[error("Order cannot go out for delivery without an assigned driver")]
    DriverNotAssigned,
    #[error("The conversation for order {0} is archived and accepts no further messages")]
    ConversationArchived(OrderId),
    #[error("Order {0} has no conversation")]
    ConversationNotFound(OrderId),
}

impl From<sqlx::Error> for OrderFlowError {
    fn from(e: sqlx::Error) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}

impl From<crate::traits::PaymentStoreError> for OrderFlowError {
    fn from(e: crate::traits::PaymentStoreError) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}

impl From<crate::traits::PayoutStoreError> for OrderFlowError {
    fn from(e: crate::traits::PayoutStoreError) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}
