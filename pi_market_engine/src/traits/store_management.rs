use thiserror::Error;

use crate::db_types::{
    DiscountCode,
    NewDiscountCode,
    NewProduct,
    NewStore,
    Notification,
    Product,
    ProductChoice,
    Store,
};

/// Stores, their inventory, discount codes and owner notifications.
#[allow(async_fn_in_trait)]
pub trait StoreManagement: Clone {
    async fn create_store(&self, store: NewStore) -> Result<Store, StoreApiError>;

    async fn fetch_store(&self, id: i64) -> Result<Option<Store>, StoreApiError>;

    async fn fetch_stores_for_owner(&self, owner_id: i64) -> Result<Vec<Store>, StoreApiError>;

    async fn create_product(&self, product: NewProduct) -> Result<Product, StoreApiError>;

    async fn fetch_product(&self, id: i64) -> Result<Option<Product>, StoreApiError>;

    async fn fetch_product_choices(&self, product_id: i64) -> Result<Vec<ProductChoice>, StoreApiError>;

    async fn create_discount_code(&self, code: NewDiscountCode) -> Result<DiscountCode, StoreApiError>;

    async fn fetch_discount_code(&self, store_id: i64, code: &str) -> Result<Option<DiscountCode>, StoreApiError>;

    /// Propagates a freshly linked network account to the owner's user row and to the payout
    /// destination fields of every store they own, in one transaction. Returns the number of
    /// stores updated.
    async fn relink_payout_destination(
        &self,
        owner_id: i64,
        wallet_address: &str,
        pi_user_id: &str,
    ) -> Result<u64, StoreApiError>;

    async fn create_notification(&self, user_id: i64, body: &str) -> Result<Notification, StoreApiError>;

    async fn fetch_notifications_for_user(&self, user_id: i64) -> Result<Vec<Notification>, StoreApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum StoreApiError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Store {0} does not exist")]
    StoreNotFound(i64),
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("A discount code named {0} already exists for this store")]
    DuplicateDiscountCode(String),
    #[error("Not authorized: {0}")]
    Unauthorized(String),
}

impl From<sqlx::Error> for StoreApiError {
    fn from(e: sqlx::Error) -> Self {
        StoreApiError::DatabaseError(e.to_string())
    }
}
