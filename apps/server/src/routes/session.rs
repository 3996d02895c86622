//! Password sign-in and self-registration.
//!
//! Registration creates a `pending` identity; it gains a real role only when
//! an admin approves the access request filed with it.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use petal_core::validation::{validate_email, validate_name, validate_password};
use petal_core::{Identity, Role};
use petal_db::{hash_password, verify_password, DbError};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub identity: Identity,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let jwt = state.jwt()?;
    let email = body.email.trim().to_lowercase();

    let identity = state.db.identities().find_by_email(&email).await?;
    let identity = match identity {
        Some(identity) if verify_password(&body.password, &identity.password_hash) => identity,
        _ => {
            warn!(email = %email, "Login failed");
            return Err(ApiError::unauthenticated("Invalid email or password"));
        }
    };

    let token = jwt.issue(&identity.id, identity.role)?;
    info!(id = %identity.id, role = identity.role.as_str(), "Signed in");
    Ok(Json(SessionResponse { token, identity }))
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let jwt = state.jwt()?;

    let email = validate_email(&body.email)?;
    validate_name("display name", &body.display_name)?;
    validate_password(&body.password)?;

    let identities = state.db.identities();
    if identities.exists_by_email(&email).await? {
        return Err(DbError::duplicate("email", email).into());
    }

    let hash = hash_password(&body.password)?;
    let identity = identities
        .create(&email, &hash, Role::Pending, &body.display_name)
        .await?;
    let token = jwt.issue(&identity.id, identity.role)?;

    Ok((StatusCode::CREATED, Json(SessionResponse { token, identity })))
}
