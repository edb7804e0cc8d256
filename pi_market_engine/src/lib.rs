//! Pi Market Engine
//!
//! The engine holds the reconciliation core of the Pi market gateway: payment records mirroring
//! the external network's payment lifecycle, the orders and payouts derived from them, and the
//! state machines that connect the three.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). You should never need to access the
//!    database directly; use the public API instead. The exception is the data types used in the
//!    database, which are defined in the `db_types` module and are public.
//! 2. The engine public API ([`mod@pme_api`]). This provides the payment completion flow, the
//!    order-status state machine, payout bookkeeping and store management. Backends implement the
//!    traits in [`mod@traits`] in order to power these APIs.
//!
//! The engine also emits events when orders are created or delivered. A simple actor framework
//! lets callers hook into these events and perform custom actions, such as webhooks to a
//! storefront.

pub mod db_types;
pub mod events;
pub mod helpers;
mod pme_api;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;

#[cfg(all(any(feature = "test_utils", test), feature = "sqlite"))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use pme_api::{
    auth_api::AuthApi,
    errors::{PaymentFlowError, PayoutApiError},
    order_objects,
    order_objects::Actor,
    order_status_api::OrderStatusApi,
    payment_flow_api::{CompletionResult, PaymentFlowApi},
    payout_api::PayoutApi,
    store_api::StoreApi,
};
