use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use petal_core::policy::{authorize, Action};
use petal_core::{Debt, DebtStatus, NewDebt};

use crate::auth::AuthActor;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    status: Option<DebtStatus>,
}

pub async fn list(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Debt>>> {
    authorize(&actor, Action::ViewRecords)?;
    Ok(Json(state.db.debts().list(query.status).await?))
}

/// Manual ledger entry.
pub async fn create(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(body): Json<NewDebt>,
) -> ApiResult<(StatusCode, Json<Debt>)> {
    authorize(&actor, Action::ManageDebts)?;
    let debt = state.db.debts().create(&body).await?;
    Ok((StatusCode::CREATED, Json(debt)))
}

pub async fn toggle(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Debt>> {
    authorize(&actor, Action::ManageDebts)?;
    Ok(Json(state.db.debts().toggle_status(&id).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use petal_core::Role;

    use crate::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_manual_debt_and_toggle() {
        let app = TestApp::new().await;
        let admin = app.admin_token().await;
        let clerk = app.token_for("clerk@petal.vn", Role::Employee).await;
        let entry = json!({
            "counterpartyKind": "supplier",
            "counterpartyName": "Vườn hoa Đà Lạt",
            "amount": 500000,
            "note": "lan hồ điệp"
        });

        let (status, _) = app.post("/api/debts", Some(&clerk), entry.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, debt) = app.post("/api/debts", Some(&admin), entry).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(debt["status"], "unpaid");
        let id = debt["id"].as_str().unwrap().to_string();

        let (status, toggled) = app
            .post(&format!("/api/debts/{}/toggle", id), Some(&admin), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(toggled["status"], "paid");

        let (status, unpaid) = app.get("/api/debts?status=unpaid", Some(&clerk)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(unpaid.as_array().unwrap().is_empty());

        let (status, _) = app.post("/api/debts/missing/toggle", Some(&admin), json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
