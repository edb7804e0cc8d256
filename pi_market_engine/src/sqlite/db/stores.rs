use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewStore, Store},
    traits::StoreApiError,
};

pub async fn insert_store(store: NewStore, conn: &mut SqliteConnection) -> Result<Store, StoreApiError> {
    let inserted: Store = sqlx::query_as("INSERT INTO stores (owner_id, name) VALUES ($1, $2) RETURNING *")
        .bind(store.owner_id)
        .bind(store.name)
        .fetch_one(conn)
        .await?;
    debug!("🗃️ Store [{}] created for owner {}", inserted.name, inserted.owner_id);
    Ok(inserted)
}

pub async fn fetch_store(id: i64, conn: &mut SqliteConnection) -> Result<Option<Store>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM stores WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_stores_for_owner(owner_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Store>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM stores WHERE owner_id = $1 ORDER BY id ASC").bind(owner_id).fetch_all(conn).await
}

/// Copies a freshly linked network account onto every store the owner owns. Stores without a
/// destination pick one up; stores with a stale destination are brought in line.
pub async fn propagate_payout_destination(
    owner_id: i64,
    wallet_address: &str,
    pi_user_id: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, StoreApiError> {
    let updated = sqlx::query(
        r#"
            UPDATE stores SET wallet_address = $2, pi_user_id = $3, updated_at = CURRENT_TIMESTAMP
            WHERE owner_id = $1;
        "#,
    )
    .bind(owner_id)
    .bind(wallet_address)
    .bind(pi_user_id)
    .execute(conn)
    .await?
    .rows_affected();
    debug!("🗃️ Payout destination propagated to {updated} stores for owner {owner_id}");
    Ok(updated)
}
