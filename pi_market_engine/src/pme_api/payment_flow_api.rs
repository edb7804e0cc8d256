use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewPaymentRecord, Order, PaymentId, PaymentRecord},
    events::{EventProducers, OrderCreatedEvent},
    pme_api::errors::PaymentFlowError,
    traits::{InsertPaymentOutcome, OrderManagement, PaymentManagement, PaymentStoreError},
};

/// `PaymentFlowApi` handles the payment lifecycle: approval, completion and the fulfilment that
/// turns a completed payment into an order.
pub struct PaymentFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for PaymentFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B> PaymentFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

/// The result of driving a payment through completion. `newly_fulfilled` is false when a
/// duplicate delivery found the work already done.
#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub record: PaymentRecord,
    pub order: Order,
    pub newly_fulfilled: bool,
}

impl<B> PaymentFlowApi<B>
where B: PaymentManagement + OrderManagement
{
    /// Records a payment the server has approved. Safe to call more than once for the same
    /// payment id; the duplicate call returns the existing record.
    pub async fn approve_payment(&self, payment: NewPaymentRecord) -> Result<PaymentRecord, PaymentStoreError> {
        let outcome = self.db.insert_approved_payment(payment).await?;
        match &outcome {
            InsertPaymentOutcome::Inserted(r) => debug!("🔄️💰️ Payment [{}] approved", r.payment_id),
            InsertPaymentOutcome::AlreadyExists(r) => {
                info!("🔄️💰️ Duplicate approval for payment [{}]. Returning the existing record.", r.payment_id)
            },
        }
        Ok(outcome.record().clone())
    }

    /// Drives a payment to `Completed` and fulfils it. This is the single entry point for both
    /// webhook deliveries and client-side confirmation calls, so a race between the two collapses
    /// onto the database's uniqueness guarantees:
    ///
    /// * the status move is a compare-and-swap; the second caller sees a reported no-op;
    /// * fulfilment inserts the order under a unique payment id; the second caller gets the order
    ///   created by the first.
    ///
    /// Either way the caller receives the one true order for the payment.
    pub async fn complete_payment(&self, payment_id: &PaymentId, txid: &str) -> Result<CompletionResult, PaymentFlowError> {
        let outcome = self.db.mark_payment_completed(payment_id, txid).await?;
        let record = outcome.record().clone();
        // Fulfilment also runs for an already-completed record. It is idempotent, and this closes
        // the window where a crash landed between the status move and the fulfilment transaction.
        let fulfilment = self.db.fulfil_payment(&record).await?;
        let newly_fulfilled = fulfilment.is_new();
        let order = fulfilment.order().clone();
        if newly_fulfilled {
            self.call_order_created_hook(&order).await;
            info!("🔄️💰️ Payment [{payment_id}] completed and fulfilled by order {}", order.order_id);
        } else {
            info!("🔄️💰️ Payment [{payment_id}] was already fulfilled by order {}. No-op.", order.order_id);
        }
        Ok(CompletionResult { record, order, newly_fulfilled })
    }

    /// Marks an approved payment cancelled. Idempotent on already-cancelled records.
    pub async fn cancel_payment(&self, payment_id: &PaymentId, reason: &str) -> Result<PaymentRecord, PaymentStoreError> {
        trace!("🔄️❌️ Payment {payment_id} is being marked as cancelled");
        self.db.mark_payment_cancelled(payment_id, reason).await
    }

    /// Marks an approved payment permanently failed.
    pub async fn fail_payment(&self, payment_id: &PaymentId, reason: &str) -> Result<PaymentRecord, PaymentStoreError> {
        trace!("🔄️❌️ Payment {payment_id} is being marked as failed: {reason}");
        self.db.mark_payment_failed(payment_id, reason).await
    }

    pub async fn fetch_payment_record(&self, payment_id: &PaymentId) -> Result<Option<PaymentRecord>, PaymentStoreError> {
        self.db.fetch_payment_record(payment_id).await
    }

    async fn call_order_created_hook(&self, order: &Order) {
        for emitter in &self.producers.order_created_producer {
            debug!("🔄️📦️ Notifying order created hook subscribers");
            let event = OrderCreatedEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
