use thiserror::Error;

use crate::traits::{OrderFlowError, PaymentStoreError, PayoutStoreError, StoreApiError};

/// Errors from the approval/completion flow, which spans the payment store and the order flow.
#[derive(Debug, Clone, Error)]
pub enum PaymentFlowError {
    #[error("{0}")]
    PaymentStore(#[from] PaymentStoreError),
    #[error("{0}")]
    OrderFlow(#[from] OrderFlowError),
}

#[derive(Debug, Clone, Error)]
pub enum PayoutApiError {
    #[error("{0}")]
    Store(#[from] PayoutStoreError),
    #[error("{0}")]
    StoreApi(#[from] StoreApiError),
    #[error("Not authorized: {0}")]
    Unauthorized(String),
    #[error("Payout {0} is not in a failed state and cannot be retried")]
    NotRetryable(i64),
    #[error("Store {0} does not exist")]
    StoreNotFound(i64),
}
