use std::future::{ready, Ready};

use actix_web::{web, FromRequest, HttpRequest};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use pi_market_engine::{
    db_types::{Role, Roles, User},
    Actor,
};
use serde::{Deserialize, Serialize};

use crate::{config::AuthConfig, errors::AuthError};

/// The claims carried by a gateway access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The gateway user id.
    pub sub: i64,
    pub roles: Roles,
    pub exp: i64,
}

impl JwtClaims {
    pub fn actor(&self) -> Actor {
        Actor::new(self.sub, self.roles.clone())
    }

    pub fn require_role(&self, role: Role) -> Result<(), AuthError> {
        if self.roles.contains(role) || self.roles.contains(Role::Admin) {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions(format!("the {role} role is required")))
        }
    }
}

/// Issues access tokens after a successful login.
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    ttl_seconds: i64,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let key = EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        Self { key, ttl_seconds: config.token_ttl.num_seconds() }
    }

    pub fn issue_token(&self, user: &User) -> Result<String, AuthError> {
        let claims =
            JwtClaims { sub: user.id, roles: user.roles.clone(), exp: Utc::now().timestamp() + self.ttl_seconds };
        encode(&Header::default(), &claims, &self.key).map_err(|e| AuthError::ValidationError(e.to_string()))
    }
}

/// Verifies bearer tokens on incoming requests.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        Self { key }
    }

    pub fn verify(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.key, &Validation::default())
            .map_err(|e| AuthError::ValidationError(e.to_string()))?;
        Ok(data.claims)
    }
}

fn claims_from_request(req: &HttpRequest) -> Result<JwtClaims, AuthError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AuthError::PoorlyFormattedToken("missing Authorization header".to_string()))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::PoorlyFormattedToken("expected a Bearer token".to_string()))?;
    let verifier = req
        .app_data::<web::Data<TokenVerifier>>()
        .ok_or_else(|| AuthError::ValidationError("token verifier is not configured".to_string()))?;
    let claims = verifier.verify(token)?;
    debug!("🔐️ Request authenticated for user {}", claims.sub);
    Ok(claims)
}

impl FromRequest for JwtClaims {
    type Error = crate::errors::ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        ready(claims_from_request(req).map_err(crate::errors::ServerError::AuthenticationError))
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;
    use pmg_common::Secret;

    use super::*;

    fn test_config() -> AuthConfig {
        AuthConfig { jwt_secret: Secret::new("a-test-secret".to_string()), token_ttl: Duration::hours(1) }
    }

    fn test_user() -> User {
        User {
            id: 42,
            pi_uid: "uid-42".to_string(),
            username: "tester".to_string(),
            wallet_address: None,
            roles: Roles::default().with(Role::Customer).with(Role::Driver),
            nonce: 7,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issued_tokens_verify() {
        let config = test_config();
        let issuer = TokenIssuer::new(&config);
        let verifier = TokenVerifier::new(&config);
        let token = issuer.issue_token(&test_user()).unwrap();
        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert!(claims.require_role(Role::Driver).is_ok());
        assert!(claims.require_role(Role::StoreOwner).is_err());
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let config = test_config();
        let issuer = TokenIssuer::new(&config);
        let other = AuthConfig { jwt_secret: Secret::new("a-different-secret".to_string()), ..test_config() };
        let verifier = TokenVerifier::new(&other);
        let token = issuer.issue_token(&test_user()).unwrap();
        assert!(verifier.verify(&token).is_err());
    }
}
