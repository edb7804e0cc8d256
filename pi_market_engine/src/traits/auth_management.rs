use thiserror::Error;

use crate::db_types::{Role, Roles, User};

/// Gateway user accounts, role sets and login replay protection.
#[allow(async_fn_in_trait)]
pub trait AuthManagement: Clone {
    /// Creates or refreshes the user row for a network identity. The username and wallet address
    /// are taken from the network's own user record, not from client input.
    async fn upsert_network_user(
        &self,
        pi_uid: &str,
        username: &str,
        wallet_address: Option<&str>,
    ) -> Result<User, AuthApiError>;

    async fn fetch_user(&self, id: i64) -> Result<Option<User>, AuthApiError>;

    async fn fetch_user_by_pi_uid(&self, pi_uid: &str) -> Result<Option<User>, AuthApiError>;

    /// Stores the login nonce. The nonce must be strictly greater than the previous one; a stale
    /// nonce is rejected to stop token replays.
    async fn upsert_nonce_for_user(&self, user_id: i64, nonce: i64) -> Result<(), AuthApiError>;

    async fn assign_roles(&self, user_id: i64, roles: &Roles) -> Result<(), AuthApiError>;

    async fn check_user_has_role(&self, user_id: i64, role: Role) -> Result<(), AuthApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum AuthApiError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The nonce is not strictly increasing")]
    InvalidNonce,
    #[error("User {0} does not exist")]
    UserNotFound(i64),
    #[error("User does not hold the {0} role")]
    RoleNotAllowed(Role),
}

impl From<sqlx::Error> for AuthApiError {
    fn from(e: sqlx::Error) -> Self {
        AuthApiError::DatabaseError(e.to_string())
    }
}
