//! Stock movements outside of sales: supplier imports and disposals.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use petal_core::policy::{authorize, Action};
use petal_core::{DisposalLogEntry, DisposalRequest, ImportReceipt, ImportRequest};

use crate::auth::AuthActor;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn record_import(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(body): Json<ImportRequest>,
) -> ApiResult<(StatusCode, Json<ImportReceipt>)> {
    authorize(&actor, Action::RecordImport)?;
    let receipt = state.db.imports().record(&body, &actor).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_imports(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
) -> ApiResult<Json<Vec<ImportReceipt>>> {
    authorize(&actor, Action::ViewRecords)?;
    Ok(Json(state.db.imports().list().await?))
}

pub async fn get_import(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> ApiResult<Json<ImportReceipt>> {
    authorize(&actor, Action::ViewRecords)?;
    Ok(Json(state.db.imports().get_by_id(&id).await?))
}

pub async fn record_disposal(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(body): Json<DisposalRequest>,
) -> ApiResult<(StatusCode, Json<DisposalLogEntry>)> {
    authorize(&actor, Action::RecordDisposal)?;
    let entry = state.db.disposals().record(&body, &actor).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_disposals(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
) -> ApiResult<Json<Vec<DisposalLogEntry>>> {
    authorize(&actor, Action::ViewRecords)?;
    Ok(Json(state.db.disposals().list().await?))
}

pub async fn list_for_product(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<DisposalLogEntry>>> {
    authorize(&actor, Action::ViewRecords)?;
    Ok(Json(state.db.disposals().list_for_product(&id).await?))
}
