use thiserror::Error;

use crate::{
    db_types::{NewPaymentRecord, PaymentId, PaymentRecord, PiPaymentStatus},
    traits::{CompletionOutcome, InsertPaymentOutcome},
};

/// Lifecycle management for payment records.
///
/// Every mutation here is a conditional insert or a compare-and-swap on the status column.
/// Duplicate webhook deliveries and duplicate client confirmations therefore race against the
/// database's uniqueness guarantees, not against read-then-write checks in application code.
#[allow(async_fn_in_trait)]
pub trait PaymentManagement: Clone {
    /// Records a newly approved payment. If a record with the same external payment id already
    /// exists, the existing record is returned and nothing is written.
    async fn insert_approved_payment(
        &self,
        payment: NewPaymentRecord,
    ) -> Result<InsertPaymentOutcome, PaymentStoreError>;

    /// Transitions `Approved → Completed`, storing the transaction id. Re-applying to a
    /// `Completed` record is a reported no-op. Applying to a `Cancelled` or `Failed` record is an
    /// error: terminal states are never left.
    async fn mark_payment_completed(
        &self,
        payment_id: &PaymentId,
        txid: &str,
    ) -> Result<CompletionOutcome, PaymentStoreError>;

    /// Transitions `Approved → Cancelled` with the given reason. Idempotent on `Cancelled`.
    async fn mark_payment_cancelled(
        &self,
        payment_id: &PaymentId,
        reason: &str,
    ) -> Result<PaymentRecord, PaymentStoreError>;

    /// Transitions `Approved → Failed` with the given reason. Idempotent on `Failed`.
    async fn mark_payment_failed(&self, payment_id: &PaymentId, reason: &str)
        -> Result<PaymentRecord, PaymentStoreError>;

    async fn fetch_payment_record(&self, payment_id: &PaymentId) -> Result<Option<PaymentRecord>, PaymentStoreError>;
}

#[derive(Debug, Clone, Error)]
pub enum PaymentStoreError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("No payment record exists for {0}")]
    PaymentNotFound(PaymentId),
    #[error("Payment {payment_id} cannot move from {from} to {to}")]
    InvalidStatusChange { payment_id: PaymentId, from: PiPaymentStatus, to: PiPaymentStatus },
}

impl From<sqlx::Error> for PaymentStoreError {
    fn from(e: sqlx::Error) -> Self {
        PaymentStoreError::DatabaseError(e.to_string())
    }
}
