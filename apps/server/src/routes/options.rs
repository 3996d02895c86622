//! Attribute vocabularies (names, colors, qualities, sizes, units).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use petal_core::policy::{authorize, Action};
use petal_core::{AttributeKind, AttributeOption};

use crate::auth::AuthActor;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddOptionRequest {
    pub value: String,
}

pub async fn list(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(kind): Path<String>,
) -> ApiResult<Json<Vec<AttributeOption>>> {
    authorize(&actor, Action::ViewRecords)?;
    let kind: AttributeKind = kind.parse()?;
    Ok(Json(state.db.options().list(kind).await?))
}

pub async fn add(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(kind): Path<String>,
    Json(body): Json<AddOptionRequest>,
) -> ApiResult<(StatusCode, Json<AttributeOption>)> {
    authorize(&actor, Action::ManageOptions)?;
    let kind: AttributeKind = kind.parse()?;
    let option = state.db.options().add(kind, &body.value).await?;
    Ok((StatusCode::CREATED, Json(option)))
}

pub async fn remove(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path((kind, value)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    authorize(&actor, Action::ManageOptions)?;
    let kind: AttributeKind = kind.parse()?;
    state
        .db
        .options()
        .delete(kind, &value, state.option_policy)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
