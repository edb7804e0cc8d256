use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Role, User},
    traits::{AuthApiError, AuthManagement},
};

/// `AuthApi` resolves network identities to gateway users and guards against replayed logins.
pub struct AuthApi<B> {
    db: B,
}

impl<B> Debug for AuthApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthApi")
    }
}

impl<B> AuthApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> AuthApi<B>
where B: AuthManagement
{
    /// Upserts the user for a verified network identity and consumes the login nonce. The nonce
    /// must be strictly greater than any previously seen for this user.
    pub async fn login(
        &self,
        pi_uid: &str,
        username: &str,
        wallet_address: Option<&str>,
        nonce: i64,
    ) -> Result<User, AuthApiError> {
        let user = self.db.upsert_network_user(pi_uid, username, wallet_address).await?;
        self.db.upsert_nonce_for_user(user.id, nonce).await.map_err(|e| {
            debug!("🔐️ Login nonce rejected for user {}: {e}", user.id);
            e
        })?;
        debug!("🔐️ User [{}] logged in", user.username);
        Ok(user)
    }

    pub async fn fetch_user(&self, id: i64) -> Result<Option<User>, AuthApiError> {
        self.db.fetch_user(id).await
    }

    pub async fn check_role(&self, user_id: i64, role: Role) -> Result<(), AuthApiError> {
        self.db.check_user_has_role(user_id, role).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
