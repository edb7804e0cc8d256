//! Database management and control.
//!
//! This module provides the interface contracts of the payment engine database backends.
//!
//! ## Payments, orders and payouts
//! A payment record mirrors one external-network payment. When a payment completes, the
//! completion flow turns it into exactly one order and schedules a payout toward the store owner.
//!
//! * [`PaymentManagement`] owns the payment-record lifecycle (conditional inserts, monotonic
//!   status transitions).
//! * [`OrderManagement`] owns order fulfilment (the inventory-decrementing transaction), the
//!   order-status rows and the per-order chat conversation.
//! * [`PayoutManagement`] owns payout attempt rows and the durable payout task queue.
//! * [`StoreManagement`] owns stores, products, discount codes and notifications.
//! * [`AuthManagement`] owns gateway users, their role sets and login nonces.
mod auth_management;
mod order_management;
mod payment_management;
mod payout_management;
mod store_management;

mod data_objects;

pub use auth_management::{AuthApiError, AuthManagement};
pub use data_objects::{CompletionOutcome, FulfilmentOutcome, InsertPaymentOutcome};
pub use order_management::{OrderFlowError, OrderManagement};
pub use payment_management::{PaymentManagement, PaymentStoreError};
pub use payout_management::{PayoutManagement, PayoutStoreError};
pub use store_management::{StoreApiError, StoreManagement};
