//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs whose subject is an identity id. The role inside a
//! token is informational only: every request re-reads the identity's stored
//! role, so a promotion or demotion takes effect on the next call.
//!
//! ```text
//! Authorization: Bearer <jwt>
//!        │
//!        ▼
//!  secret configured? ── no ──► 503
//!        │
//!  header present & well-formed? ── no ──► 401
//!        │
//!  signature + expiry valid? ── no ──► 401
//!        │
//!  identity still exists? ── no ──► 401
//!        │
//!        ▼
//!  AuthActor(Actor { id, name, role, full_access })
//! ```

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use petal_core::{Actor, Role};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (identity id)
    pub sub: String,

    /// Role at issue time
    pub role: Role,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID
    pub jti: String,
}

/// JWT token manager.
#[derive(Debug, Clone)]
pub struct JwtManager {
    secret: String,
    lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: impl Into<String>, lifetime_secs: i64) -> Self {
        JwtManager {
            secret: secret.into(),
            lifetime_secs,
        }
    }

    /// Issues a token for an identity with the configured lifetime.
    pub fn issue(&self, identity_id: &str, role: Role) -> ApiResult<String> {
        self.issue_with_lifetime(identity_id, role, self.lifetime_secs)
    }

    pub fn issue_with_lifetime(
        &self,
        identity_id: &str,
        role: Role,
        lifetime_secs: i64,
    ) -> ApiResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(lifetime_secs)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::internal(format!("Failed to generate token: {}", e)))
    }

    /// Validates signature and expiry.
    pub fn validate(&self, token: &str) -> ApiResult<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => ApiError::unauthenticated("Token expired"),
            _ => ApiError::unauthenticated("Invalid token"),
        })
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The authenticated caller. Rejects with 503, 401 as described above.
#[derive(Debug, Clone)]
pub struct AuthActor(pub Actor);

impl FromRequestParts<AppState> for AuthActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(actor) = parts.extensions.get::<AuthActor>() {
            return Ok(actor.clone());
        }

        let jwt = state.jwt()?;

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                debug!(uri = %parts.uri, "Missing bearer credential");
                ApiError::unauthenticated("Missing bearer credential")
            })?;
        let token = extract_bearer_token(header)
            .ok_or_else(|| ApiError::unauthenticated("Invalid authorization header"))?;

        let claims = jwt.validate(token).inspect_err(|e| {
            warn!(uri = %parts.uri, error = %e.message, "Bearer credential rejected");
        })?;

        let actor = state
            .db
            .identities()
            .actor(&claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthenticated("Identity no longer exists"))?;

        let actor = AuthActor(actor);
        parts.extensions.insert(actor.clone());
        Ok(actor)
    }
}

/// A caller who may or may not be signed in. A credential that is present
/// but invalid is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeActor(pub Option<Actor>);

impl FromRequestParts<AppState> for MaybeActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(MaybeActor(None));
        }
        let AuthActor(actor) = AuthActor::from_request_parts(parts, state).await?;
        Ok(MaybeActor(Some(actor)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let jwt = JwtManager::new("test-secret", 3600);
        let token = jwt.issue("identity-1", Role::Admin).unwrap();
        let claims = jwt.validate(&token).unwrap();
        assert_eq!(claims.sub, "identity-1");
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_expired_and_foreign_tokens() {
        let jwt = JwtManager::new("test-secret", 3600);
        let expired = jwt.issue_with_lifetime("identity-1", Role::Admin, -3600).unwrap();
        assert_eq!(jwt.validate(&expired).unwrap_err().message, "Token expired");

        let other = JwtManager::new("other-secret", 3600);
        let foreign = other.issue("identity-1", Role::Admin).unwrap();
        assert_eq!(jwt.validate(&foreign).unwrap_err().message, "Invalid token");
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Basic abc"), None);
    }
}
