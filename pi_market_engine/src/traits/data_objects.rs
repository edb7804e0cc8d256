use crate::db_types::{Order, PaymentRecord};

/// Result of inserting an approved payment. The unique payment-id column makes the insert
/// idempotent, so a duplicate approval surfaces the existing record instead of failing.
#[derive(Debug, Clone)]
pub enum InsertPaymentOutcome {
    Inserted(PaymentRecord),
    AlreadyExists(PaymentRecord),
}

impl InsertPaymentOutcome {
    pub fn record(&self) -> &PaymentRecord {
        match self {
            InsertPaymentOutcome::Inserted(r) | InsertPaymentOutcome::AlreadyExists(r) => r,
        }
    }
}

/// Result of marking a payment completed. Re-completing a completed record is a no-op and is
/// reported as such so webhook redeliveries can short-circuit.
#[derive(Debug, Clone)]
pub enum CompletionOutcome {
    Completed(PaymentRecord),
    AlreadyCompleted(PaymentRecord),
}

impl CompletionOutcome {
    pub fn record(&self) -> &PaymentRecord {
        match self {
            CompletionOutcome::Completed(r) | CompletionOutcome::AlreadyCompleted(r) => r,
        }
    }
}

/// Result of the fulfilment transaction. Exactly one order ever exists per payment id; a
/// duplicate invocation returns the order created by the first one.
#[derive(Debug, Clone)]
pub enum FulfilmentOutcome {
    Created(Order),
    AlreadyFulfilled(Order),
}

impl FulfilmentOutcome {
    pub fn order(&self) -> &Order {
        match self {
            FulfilmentOutcome::Created(o) | FulfilmentOutcome::AlreadyFulfilled(o) => o,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, FulfilmentOutcome::Created(_))
    }
}
