use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use pmg_common::MicroPi;

use crate::{
    db_types::{NewPayout, OrderId, Payout, PayoutStatus, PayoutTask},
    events::{EventProducers, PayoutRecordedEvent},
    pme_api::{errors::PayoutApiError, order_objects::Actor},
    traits::{PayoutManagement, PayoutStoreError, StoreManagement},
};

/// `PayoutApi` is the bookkeeping side of payouts: attempt rows, the durable task queue, and the
/// owner-facing retry entry point. The network-facing execution lives in the server crate.
pub struct PayoutApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for PayoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PayoutApi")
    }
}

impl<B> PayoutApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> PayoutApi<B>
where B: PayoutManagement + StoreManagement
{
    /// Records an attempt row and notifies subscribers. Attempt numbering picks up from the rows
    /// already recorded for the order.
    pub async fn record_attempt(&self, mut payout: NewPayout) -> Result<Payout, PayoutStoreError> {
        if payout.attempt == 0 {
            payout.attempt = self.db.payout_attempts_for_order(&payout.order_id).await? + 1;
        }
        let recorded = self.db.record_payout(payout).await?;
        self.call_payout_recorded_hook(&recorded).await;
        Ok(recorded)
    }

    pub async fn fetch_payout(&self, id: i64) -> Result<Option<Payout>, PayoutStoreError> {
        self.db.fetch_payout(id).await
    }

    /// Payouts for a store, restricted to the store's owner.
    pub async fn payouts_for_store(&self, actor: &Actor, store_id: i64) -> Result<Vec<Payout>, PayoutApiError> {
        let store = self.db.fetch_store(store_id).await?.ok_or(PayoutApiError::StoreNotFound(store_id))?;
        if store.owner_id != actor.user_id {
            return Err(PayoutApiError::Unauthorized("only the store owner may list its payouts".to_string()));
        }
        Ok(self.db.fetch_payouts_for_store(store_id).await?)
    }

    /// Re-queues a failed payout for execution. Ownership is checked before anything happens, and
    /// only `Failed` payouts are retryable; the retry will create a fresh attempt row rather than
    /// mutating the old one.
    pub async fn retry_failed_payout(&self, actor: &Actor, payout_id: i64) -> Result<PayoutTask, PayoutApiError> {
        let payout =
            self.db.fetch_payout(payout_id).await?.ok_or(PayoutApiError::Store(PayoutStoreError::PayoutNotFound(payout_id)))?;
        let store =
            self.db.fetch_store(payout.store_id).await?.ok_or(PayoutApiError::StoreNotFound(payout.store_id))?;
        if store.owner_id != actor.user_id {
            return Err(PayoutApiError::Unauthorized("only the store owner may retry its payouts".to_string()));
        }
        if payout.status != PayoutStatus::Failed {
            return Err(PayoutApiError::NotRetryable(payout_id));
        }
        info!("💸️ Retry requested for failed payout {payout_id} (order {})", payout.order_id);
        let task = self.db.enqueue_payout_task(&payout.order_id, payout.store_id, payout.amount, Utc::now()).await?;
        Ok(task)
    }

    //------------------------------------ Worker plumbing  ----------------------------------------

    pub async fn due_tasks(&self, limit: i64) -> Result<Vec<PayoutTask>, PayoutStoreError> {
        self.db.due_payout_tasks(limit).await
    }

    pub async fn reschedule_task(
        &self,
        task_id: i64,
        run_at: DateTime<Utc>,
        error: Option<&str>,
    ) -> Result<PayoutTask, PayoutStoreError> {
        self.db.reschedule_payout_task(task_id, run_at, error).await
    }

    pub async fn remove_task(&self, task_id: i64) -> Result<(), PayoutStoreError> {
        self.db.remove_payout_task(task_id).await
    }

    pub async fn enqueue_task(
        &self,
        order_id: &OrderId,
        store_id: i64,
        amount: MicroPi,
        run_at: DateTime<Utc>,
    ) -> Result<PayoutTask, PayoutStoreError> {
        self.db.enqueue_payout_task(order_id, store_id, amount, run_at).await
    }

    async fn call_payout_recorded_hook(&self, payout: &Payout) {
        for emitter in &self.producers.payout_recorded_producer {
            debug!("💸️ Notifying payout recorded hook subscribers");
            let event = PayoutRecordedEvent::new(payout.clone());
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
