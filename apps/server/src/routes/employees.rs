//! Staff records and the admin-only account creation endpoint.
//!
//! `POST /api/employees` answers, in order of precedence:
//!
//! | Status | When                                              |
//! |--------|---------------------------------------------------|
//! | 503    | no token signing secret configured                |
//! | 401    | bearer credential missing, malformed or expired   |
//! | 403    | caller's stored role is not admin                 |
//! | 400    | a required field is missing or malformed          |
//! | 409    | the email already has a login                     |
//! | 201    | `{ "uid": "<new identity id>" }`                  |
//! | 500    | anything else                                     |

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use petal_core::policy::{authorize, Action};
use petal_core::validation::validate_password;
use petal_core::{Employee, EmployeeInput};
use petal_db::hash_password;

use crate::auth::AuthActor;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Body of the account creation call. Every field is optional here so a
/// missing one is reported as 400 after authentication, not as a parse
/// failure before it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmployeeRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub position: Option<String>,
    pub phone: Option<String>,
    pub zalo_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedAccount {
    pub uid: String,
}

fn required(field: &'static str, value: Option<String>) -> ApiResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::validation(format!("Missing required field: {}", field)))
}

impl CreateEmployeeRequest {
    /// Splits the body into the employee record and the password.
    fn into_parts(self) -> ApiResult<(EmployeeInput, String)> {
        let email = required("email", self.email)?;
        let password = required("password", self.password)?;
        let name = required("name", self.name)?;
        let position = required("position", self.position)?;
        let phone = required("phone", self.phone)?;

        let input = EmployeeInput {
            name,
            email,
            phone,
            position,
            zalo_name: self.zalo_name.filter(|z| !z.trim().is_empty()),
            full_access: false,
        };
        Ok((input, password))
    }
}

pub async fn create(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    body: Result<Json<CreateEmployeeRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreatedAccount>)> {
    authorize(&actor, Action::CreateEmployee)?;

    let Json(body) = body.map_err(|e| {
        warn!(error = %e, "Unreadable employee account body");
        ApiError::validation(e.body_text())
    })?;
    let (input, password) = body.into_parts()?;
    validate_password(&password)?;

    let hash = hash_password(&password)?;
    let (identity, employee) = state
        .db
        .identities()
        .create_employee_account(&input, &hash)
        .await?;

    info!(
        uid = %identity.id,
        employee = %employee.id,
        by = %actor.id,
        "Employee account created"
    );
    Ok((StatusCode::CREATED, Json(CreatedAccount { uid: identity.id })))
}

pub async fn list(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
) -> ApiResult<Json<Vec<Employee>>> {
    authorize(&actor, Action::ViewRecords)?;
    Ok(Json(state.db.employees().list().await?))
}

pub async fn get(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Employee>> {
    authorize(&actor, Action::ViewRecords)?;
    state
        .db
        .employees()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Employee", &id))
}

/// Edits a staff record. Granting full access is reserved to admins.
pub async fn update(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(body): Json<EmployeeInput>,
) -> ApiResult<Json<Employee>> {
    authorize(&actor, Action::ManageEmployees)?;
    if body.full_access {
        authorize(&actor, Action::CreateEmployee)?;
    }
    Ok(Json(state.db.employees().update(&id, &body).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    authorize(&actor, Action::ManageEmployees)?;
    state.db.employees().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
