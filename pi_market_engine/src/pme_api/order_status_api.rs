use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{ChatMessage, Order, OrderId, OrderStatusType, Role, Store},
    events::{EventProducers, OrderDeliveredEvent},
    pme_api::order_objects::Actor,
    traits::{AuthManagement, OrderFlowError, OrderManagement, StoreManagement},
};

/// `OrderStatusApi` enforces the order-status state machine and its authorization rules.
///
/// The transition table:
///
/// | From \ To      | Confirmed | Preparing | OutForDelivery | Delivered | Cancelled |
/// |----------------|-----------|-----------|----------------|-----------|-----------|
/// | Pending        | owner     | Err       | Err            | Err       | owner     |
/// | Confirmed      | Err       | owner     | Err            | Err       | owner     |
/// | Preparing      | Err       | Err      | owner¹          | Err       | owner     |
/// | OutForDelivery | Err       | Err       | Err            | driver²   | owner     |
/// | Delivered      | Err       | Err       | Err            | Err       | Err       |
/// | Cancelled      | Err       | Err       | Err            | Err       | Err       |
///
/// ¹ requires a driver to be assigned first.
/// ² only the assigned driver; the store owner can never set `Delivered`.
///
/// Reaching `Delivered` also archives the order's chat conversation.
pub struct OrderStatusApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderStatusApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderStatusApi")
    }
}

impl<B> OrderStatusApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderStatusApi<B>
where B: OrderManagement + StoreManagement + AuthManagement
{
    pub async fn update_status(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        new_status: OrderStatusType,
    ) -> Result<Order, OrderFlowError> {
        let order =
            self.db.fetch_order_by_order_id(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        let store = self.fetch_store_for(&order).await?;
        check_transition_is_legal(&order, new_status)?;
        check_actor_may_transition(actor, &order, &store, new_status)?;
        let updated = if new_status == OrderStatusType::Delivered {
            let delivered = self.db.mark_order_delivered(order_id).await?;
            debug!("🔄️📦️ Order {order_id} delivered; conversation archived");
            self.call_order_delivered_hook(&delivered).await;
            delivered
        } else {
            self.db.update_order_status(order_id, new_status).await?
        };
        info!("🔄️📦️ Order {order_id} moved from {} to {new_status}", order.status);
        Ok(updated)
    }

    /// Assigns a driver to the order. A store-owner operation, valid while the order is being
    /// prepared; the assignee must hold the Driver role.
    pub async fn assign_driver(&self, actor: &Actor, order_id: &OrderId, driver_id: i64) -> Result<Order, OrderFlowError> {
        let order =
            self.db.fetch_order_by_order_id(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        let store = self.fetch_store_for(&order).await?;
        if store.owner_id != actor.user_id {
            return Err(OrderFlowError::Unauthorized("only the store owner may assign a driver".to_string()));
        }
        if !matches!(order.status, OrderStatusType::Confirmed | OrderStatusType::Preparing) {
            return Err(OrderFlowError::InvalidTransition { from: order.status, to: order.status });
        }
        self.db
            .check_user_has_role(driver_id, Role::Driver)
            .await
            .map_err(|e| OrderFlowError::Unauthorized(e.to_string()))?;
        self.db.assign_driver(order_id, driver_id).await
    }

    /// Posts a chat message on the order's conversation. Only the parties to the order may post,
    /// and an archived conversation (the order was delivered) accepts no further messages.
    pub async fn post_message(&self, actor: &Actor, order_id: &OrderId, body: &str) -> Result<ChatMessage, OrderFlowError> {
        let order =
            self.db.fetch_order_by_order_id(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        let store = self.fetch_store_for(&order).await?;
        let is_party = actor.user_id == order.customer_id
            || actor.user_id == store.owner_id
            || order.driver_id == Some(actor.user_id);
        if !is_party {
            return Err(OrderFlowError::Unauthorized("only parties to the order may use its chat".to_string()));
        }
        self.db.post_chat_message(order_id, actor.user_id, body).await
    }

    async fn fetch_store_for(&self, order: &Order) -> Result<Store, OrderFlowError> {
        self.db
            .fetch_store(order.store_id)
            .await
            .map_err(|e| OrderFlowError::DatabaseError(e.to_string()))?
            .ok_or(OrderFlowError::StoreNotFound(order.store_id))
    }

    async fn call_order_delivered_hook(&self, order: &Order) {
        for emitter in &self.producers.order_delivered_producer {
            debug!("🔄️📦️ Notifying order delivered hook subscribers");
            let event = OrderDeliveredEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

fn check_transition_is_legal(order: &Order, new_status: OrderStatusType) -> Result<(), OrderFlowError> {
    let legal = match new_status {
        OrderStatusType::Cancelled => !order.status.is_terminal(),
        s => order.status.next_in_sequence() == Some(s),
    };
    if legal {
        Ok(())
    } else {
        Err(OrderFlowError::InvalidTransition { from: order.status, to: new_status })
    }
}

fn check_actor_may_transition(
    actor: &Actor,
    order: &Order,
    store: &Store,
    new_status: OrderStatusType,
) -> Result<(), OrderFlowError> {
    let is_owner = store.owner_id == actor.user_id;
    match new_status {
        OrderStatusType::Confirmed | OrderStatusType::Preparing | OrderStatusType::Cancelled => {
            if is_owner {
                Ok(())
            } else {
                Err(OrderFlowError::Unauthorized(format!("only the store owner may set {new_status}")))
            }
        },
        OrderStatusType::OutForDelivery => {
            if !is_owner {
                return Err(OrderFlowError::Unauthorized("only the store owner may set OutForDelivery".to_string()));
            }
            if order.driver_id.is_none() {
                return Err(OrderFlowError::DriverNotAssigned);
            }
            Ok(())
        },
        OrderStatusType::Delivered => {
            // The owner can never set Delivered, not even for their own store.
            if order.driver_id == Some(actor.user_id) {
                Ok(())
            } else {
                Err(OrderFlowError::Unauthorized(
                    "only the assigned driver may mark an order delivered".to_string(),
                ))
            }
        },
        OrderStatusType::Pending => Err(OrderFlowError::InvalidTransition { from: order.status, to: new_status }),
    }
}
