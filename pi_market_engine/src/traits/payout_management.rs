use chrono::{DateTime, Utc};
use pmg_common::MicroPi;
use thiserror::Error;

use crate::db_types::{NewPayout, OrderId, Payout, PayoutTask};

/// Payout attempt bookkeeping and the durable payout task queue.
///
/// Payout rows are insert-only: a retry records a fresh attempt, terminal rows are never mutated.
/// The task queue replaces a managed platform's delayed-call scheduler; retry counts and the last
/// error are columns on the task row so stuck payouts are visible by query.
#[allow(async_fn_in_trait)]
pub trait PayoutManagement: Clone {
    async fn record_payout(&self, payout: NewPayout) -> Result<Payout, PayoutStoreError>;

    async fn fetch_payout(&self, id: i64) -> Result<Option<Payout>, PayoutStoreError>;

    async fn fetch_payouts_for_store(&self, store_id: i64) -> Result<Vec<Payout>, PayoutStoreError>;

    /// The number of payout attempts already recorded against the order. Used to number the next
    /// attempt row.
    async fn payout_attempts_for_order(&self, order_id: &OrderId) -> Result<i64, PayoutStoreError>;

    async fn enqueue_payout_task(
        &self,
        order_id: &OrderId,
        store_id: i64,
        amount: MicroPi,
        run_at: DateTime<Utc>,
    ) -> Result<PayoutTask, PayoutStoreError>;

    /// Tasks whose `run_at` has passed, oldest first.
    async fn due_payout_tasks(&self, limit: i64) -> Result<Vec<PayoutTask>, PayoutStoreError>;

    /// Pushes the task out to `run_at`, increments its attempt counter and records why.
    async fn reschedule_payout_task(
        &self,
        task_id: i64,
        run_at: DateTime<Utc>,
        error: Option<&str>,
    ) -> Result<PayoutTask, PayoutStoreError>;

    /// Removes a task once its payout has reached a terminal state.
    async fn remove_payout_task(&self, task_id: i64) -> Result<(), PayoutStoreError>;
}

#[derive(Debug, Clone, Error)]
pub enum PayoutStoreError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("No payout exists with id {0}")]
    PayoutNotFound(i64),
    #[error("No payout task exists with id {0}")]
    TaskNotFound(i64),
}

impl From<sqlx::Error> for PayoutStoreError {
    fn from(e: sqlx::Error) -> Self {
        PayoutStoreError::DatabaseError(e.to_string())
    }
}
