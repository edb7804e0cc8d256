use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Role, Roles, User},
    traits::AuthApiError,
};

/// Creates or refreshes the row for a network identity. The upsert keeps the gateway's view of
/// the username and wallet address in line with the network's.
pub async fn upsert_network_user(
    pi_uid: &str,
    username: &str,
    wallet_address: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<User, AuthApiError> {
    let user: User = sqlx::query_as(
        r#"
            INSERT INTO users (pi_uid, username, wallet_address)
            VALUES ($1, $2, $3)
            ON CONFLICT (pi_uid) DO UPDATE SET username = $2, wallet_address = COALESCE($3, wallet_address)
            RETURNING *;
        "#,
    )
    .bind(pi_uid)
    .bind(username)
    .bind(wallet_address)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ User [{}] upserted with id {}", user.username, user.id);
    Ok(user)
}

pub async fn fetch_user(id: i64, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_user_by_pi_uid(pi_uid: &str, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE pi_uid = $1").bind(pi_uid).fetch_optional(conn).await
}

/// Stores the login nonce, conditionally on it being strictly greater than the stored one. A
/// stale nonce means a replayed login token and is rejected.
pub async fn update_nonce(user_id: i64, nonce: i64, conn: &mut SqliteConnection) -> Result<(), AuthApiError> {
    let affected = sqlx::query("UPDATE users SET nonce = $2 WHERE id = $1 AND nonce < $2")
        .bind(user_id)
        .bind(nonce)
        .execute(conn)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AuthApiError::InvalidNonce);
    }
    Ok(())
}

pub async fn set_wallet_address(
    user_id: i64,
    wallet_address: &str,
    conn: &mut SqliteConnection,
) -> Result<(), AuthApiError> {
    let affected = sqlx::query("UPDATE users SET wallet_address = $2 WHERE id = $1")
        .bind(user_id)
        .bind(wallet_address)
        .execute(conn)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AuthApiError::UserNotFound(user_id));
    }
    Ok(())
}

pub async fn assign_roles(user_id: i64, roles: &Roles, conn: &mut SqliteConnection) -> Result<(), AuthApiError> {
    let affected = sqlx::query("UPDATE users SET roles = $2 WHERE id = $1")
        .bind(user_id)
        .bind(roles.to_string())
        .execute(conn)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AuthApiError::UserNotFound(user_id));
    }
    Ok(())
}

pub async fn check_user_has_role(user_id: i64, role: Role, conn: &mut SqliteConnection) -> Result<(), AuthApiError> {
    let user = fetch_user(user_id, conn).await?.ok_or(AuthApiError::UserNotFound(user_id))?;
    if user.roles.contains(role) || user.roles.contains(Role::Admin) {
        Ok(())
    } else {
        Err(AuthApiError::RoleNotAllowed(role))
    }
}
