//! Access requests: anyone may ask, only an admin decides.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::debug;

use petal_core::policy::{authorize, Action};
use petal_core::{AccessRequest, AccessRequestInput, ApprovedRecord};

use crate::auth::{AuthActor, MaybeActor};
use crate::error::ApiResult;
use crate::state::AppState;

/// Files a request. A signed-in caller's identity is attached so approval
/// can promote it.
pub async fn submit(
    State(state): State<AppState>,
    MaybeActor(actor): MaybeActor,
    Json(body): Json<AccessRequestInput>,
) -> ApiResult<(StatusCode, Json<AccessRequest>)> {
    let identity_id = actor.map(|a| a.id);
    let request = state.db.access_requests().submit(&body, identity_id).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
) -> ApiResult<Json<Vec<AccessRequest>>> {
    authorize(&actor, Action::ReviewAccessRequests)?;
    Ok(Json(state.db.access_requests().list().await?))
}

pub async fn approve(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> ApiResult<Json<ApprovedRecord>> {
    authorize(&actor, Action::ReviewAccessRequests)?;
    let record = state.db.access_requests().approve(&id).await?;
    debug!(request = %id, by = %actor.id, "Approval processed");
    Ok(Json(record))
}

pub async fn reject(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    authorize(&actor, Action::ReviewAccessRequests)?;
    state.db.access_requests().reject(&id).await?;
    debug!(request = %id, by = %actor.id, "Rejection processed");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use petal_core::Role;

    use crate::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_employee_request_approval_and_rejection() {
        let app = TestApp::new().await;
        let admin = app.admin_token().await;
        let clerk = app.token_for("clerk@petal.vn", Role::Employee).await;

        let (status, first) = app
            .post(
                "/api/access-requests",
                None,
                json!({
                    "requestedRole": "employee",
                    "name": "Tuấn",
                    "email": "tuan@petal.vn",
                    "phone": "0987654321",
                    "position": "florist"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(first["identityId"].is_null());

        let (status, second) = app
            .post(
                "/api/access-requests",
                None,
                json!({
                    "requestedRole": "customer",
                    "name": "Bình",
                    "email": "binh@petal.vn",
                    "phone": "0977000111"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = app.get("/api/access-requests", Some(&clerk)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let approve = format!("/api/access-requests/{}/approve", first["id"].as_str().unwrap());
        let (status, approved) = app.post(&approve, Some(&admin), json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(approved["kind"], "employee");
        assert_eq!(approved["record"]["position"], "florist");
        assert_eq!(approved["record"]["fullAccess"], false);

        // already consumed
        let (status, _) = app.post(&approve, Some(&admin), json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let reject = format!("/api/access-requests/{}/reject", second["id"].as_str().unwrap());
        let (status, _) = app.post(&reject, Some(&admin), json!({})).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        assert!(app.db.access_requests().list().await.unwrap().is_empty());
        assert!(app.db.customers().list().await.unwrap().is_empty());
        assert_eq!(app.db.employees().list().await.unwrap().len(), 1);
    }
}
