use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::entities::dispatcher::{self, Entity as Dispatchers};
use crate::errors::ServiceError;

/// Session token claims for an authenticated dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherClaims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub role: String,
}

/// Credential verification and session tokens for the dispatch surface.
/// The stub "always pass" middleware of earlier iterations is gone: every
/// `/dispatch` request must carry a bearer token issued here.
#[derive(Clone)]
pub struct DispatcherAuthService {
    db: Arc<DatabaseConnection>,
    jwt_secret: String,
    token_ttl_secs: u64,
}

impl DispatcherAuthService {
    pub fn new(db: Arc<DatabaseConnection>, jwt_secret: String, token_ttl_secs: u64) -> Self {
        Self {
            db,
            jwt_secret,
            token_ttl_secs,
        }
    }

    /// Verifies a username/password pair against the stored argon2 hash and
    /// issues a session token. Unknown users and bad passwords are
    /// indistinguishable to the caller.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginResponse, ServiceError> {
        let invalid = || ServiceError::Unauthorized("invalid credentials".to_string());

        let dispatcher = Dispatchers::find_by_id(username.to_string())
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                warn!(username, "login attempt for unknown dispatcher");
                invalid()
            })?;

        let parsed_hash = PasswordHash::new(&dispatcher.password_hash)
            .map_err(|e| ServiceError::InternalError(format!("stored hash unreadable: {}", e)))?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| {
                warn!(username, "login attempt with wrong password");
                invalid()
            })?;

        let token = self.issue_token(&dispatcher.username, &dispatcher.role)?;
        info!(username, role = %dispatcher.role, "dispatcher logged in");

        Ok(LoginResponse {
            token,
            username: dispatcher.username,
            role: dispatcher.role,
        })
    }

    fn issue_token(&self, username: &str, role: &str) -> Result<String, ServiceError> {
        let now = Utc::now().timestamp() as usize;
        let claims = DispatcherClaims {
            sub: username.to_string(),
            role: role.to_string(),
            exp: now + self.token_ttl_secs as usize,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("token encoding failed: {}", e)))
    }

    /// Validates a bearer token and returns its claims. Expiry is enforced.
    pub fn verify_token(&self, token: &str) -> Result<DispatcherClaims, ServiceError> {
        decode::<DispatcherClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| ServiceError::Unauthorized("invalid or expired session token".to_string()))
    }

    /// Hashes a password for storage. Exposed for provisioning and tests;
    /// dispatcher records themselves are created out of band.
    pub fn hash_password(password: &str) -> Result<String, ServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ServiceError::InternalError(format!("password hashing failed: {}", e)))
    }

    /// Provisioning helper: inserts a dispatcher with a freshly hashed
    /// password.
    pub async fn create_dispatcher(
        &self,
        username: &str,
        password: &str,
        role: &str,
    ) -> Result<(), ServiceError> {
        let model = dispatcher::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(Self::hash_password(password)?),
            role: Set(role.to_string()),
        };
        model.insert(&*self.db).await?;
        info!(username, role, "dispatcher provisioned");
        Ok(())
    }
}
