use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use petal_core::policy::{authorize, Action};
use petal_core::{Customer, CustomerInput};

use crate::auth::AuthActor;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
) -> ApiResult<Json<Vec<Customer>>> {
    authorize(&actor, Action::ViewRecords)?;
    Ok(Json(state.db.customers().list().await?))
}

pub async fn get(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Customer>> {
    authorize(&actor, Action::ViewRecords)?;
    state
        .db
        .customers()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Customer", &id))
}

pub async fn create(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(body): Json<CustomerInput>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    authorize(&actor, Action::ManageCustomers)?;
    let customer = state.db.customers().create(&body, None).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn update(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(body): Json<CustomerInput>,
) -> ApiResult<Json<Customer>> {
    authorize(&actor, Action::ManageCustomers)?;
    Ok(Json(state.db.customers().update(&id, &body).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    authorize(&actor, Action::ManageCustomers)?;
    state.db.customers().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_customer_crud() {
        let app = TestApp::new().await;
        let admin = app.admin_token().await;

        let (status, created) = app
            .post(
                "/api/customers",
                Some(&admin),
                json!({ "name": "Cô Ba", "phone": "0903 111 222", "zaloName": "coba" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let uri = format!("/api/customers/{}", created["id"].as_str().unwrap());

        let (status, updated) = app
            .send(
                Method::PUT,
                &uri,
                Some(&admin),
                Some(json!({ "name": "Cô Ba", "phone": "0903 111 222", "address": "Chợ Bến Thành" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["address"], "Chợ Bến Thành");

        let (status, _) = app.send(Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app.get(&uri, Some(&admin)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
