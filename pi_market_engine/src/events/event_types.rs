use crate::db_types::{Order, Payout};

/// Emitted when the completion processor turns a payment into a new order.
#[derive(Debug, Clone)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted when the assigned driver marks an order delivered.
#[derive(Debug, Clone)]
pub struct OrderDeliveredEvent {
    pub order: Order,
}

impl OrderDeliveredEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted whenever a payout attempt reaches a recorded state (pending, completed or failed).
#[derive(Debug, Clone)]
pub struct PayoutRecordedEvent {
    pub payout: Payout,
}

impl PayoutRecordedEvent {
    pub fn new(payout: Payout) -> Self {
        Self { payout }
    }
}
