use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{DiscountCode, NewDiscountCode, NewProduct, NewStore, Notification, Product, Role, Store},
    pme_api::order_objects::Actor,
    traits::{AuthManagement, StoreApiError, StoreManagement},
};

/// Store administration: creation, inventory, discount codes, and the account-linkage
/// propagation that feeds the payout executor its destination.
pub struct StoreApi<B> {
    db: B,
}

impl<B> Debug for StoreApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StoreApi")
    }
}

impl<B> StoreApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> StoreApi<B>
where B: StoreManagement + AuthManagement
{
    /// Creates a store owned by the actor and grants them the StoreOwner role.
    pub async fn create_store(&self, actor: &Actor, name: &str) -> Result<Store, StoreApiError> {
        let store = self.db.create_store(NewStore { owner_id: actor.user_id, name: name.to_string() }).await?;
        let roles = actor.roles.clone().with(Role::StoreOwner);
        self.db.assign_roles(actor.user_id, &roles).await.map_err(|e| StoreApiError::DatabaseError(e.to_string()))?;
        info!("🏪️ Store [{}] created for user {}", store.name, actor.user_id);
        Ok(store)
    }

    pub async fn fetch_store(&self, id: i64) -> Result<Option<Store>, StoreApiError> {
        self.db.fetch_store(id).await
    }

    pub async fn stores_for_owner(&self, owner_id: i64) -> Result<Vec<Store>, StoreApiError> {
        self.db.fetch_stores_for_owner(owner_id).await
    }

    pub async fn add_product(&self, actor: &Actor, product: NewProduct) -> Result<Product, StoreApiError> {
        self.check_ownership(actor, product.store_id).await?;
        self.db.create_product(product).await
    }

    pub async fn add_discount_code(&self, actor: &Actor, code: NewDiscountCode) -> Result<DiscountCode, StoreApiError> {
        self.check_ownership(actor, code.store_id).await?;
        self.db.create_discount_code(code).await
    }

    /// Propagates the actor's freshly linked network account to their user row and to every store
    /// they own. Run whenever the owner links or relinks their wallet, so payout destinations
    /// never go stale.
    pub async fn relink_pi_account(
        &self,
        actor: &Actor,
        wallet_address: &str,
        pi_user_id: &str,
    ) -> Result<u64, StoreApiError> {
        let updated = self.db.relink_payout_destination(actor.user_id, wallet_address, pi_user_id).await?;
        info!("🏪️ User {} relinked their Pi account; {updated} stores updated", actor.user_id);
        Ok(updated)
    }

    pub async fn notifications_for(&self, actor: &Actor) -> Result<Vec<Notification>, StoreApiError> {
        self.db.fetch_notifications_for_user(actor.user_id).await
    }

    async fn check_ownership(&self, actor: &Actor, store_id: i64) -> Result<(), StoreApiError> {
        let store = self.db.fetch_store(store_id).await?.ok_or(StoreApiError::StoreNotFound(store_id))?;
        if store.owner_id != actor.user_id {
            return Err(StoreApiError::Unauthorized("only the store owner may modify the store".to_string()));
        }
        Ok(())
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
