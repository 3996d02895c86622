//! Catalogue. Reads are public so the storefront can browse signed out.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use petal_core::policy::{authorize, Action};
use petal_core::validation::validate_product_input;
use petal_core::{Product, ProductInput};

use crate::auth::AuthActor;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 200;
const MAX_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    /// Version the client last read; a stale value yields 409.
    pub expected_version: i64,
    #[serde(flatten)]
    pub product: ProductInput,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Product>>> {
    let products = match query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => {
            let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
            state.db.products().search(q, limit).await?
        }
        None => state.db.products().list().await?,
    };
    Ok(Json(products))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Product>> {
    state
        .db
        .products()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Product", &id))
}

pub async fn create(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(body): Json<ProductInput>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    authorize(&actor, Action::ManageProducts)?;
    let input = validate_product_input(&body)?;
    let product = state.db.products().insert(&input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(body): Json<UpdateProductRequest>,
) -> ApiResult<Json<Product>> {
    authorize(&actor, Action::ManageProducts)?;
    let input = validate_product_input(&body.product)?;
    let product = state
        .db
        .products()
        .update(&id, body.expected_version, &input)
        .await?;
    Ok(Json(product))
}

pub async fn remove(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    authorize(&actor, Action::ManageProducts)?;
    state.db.products().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use petal_core::Role;

    use crate::routes::test_support::TestApp;

    fn rose() -> serde_json::Value {
        json!({
            "name": "Rose",
            "color": "red",
            "quality": "A",
            "size": "60cm",
            "unit": "stem",
            "quantity": 50,
            "sellPrice": 12000,
            "costPrice": 7000,
            "maxDiscountPerUnit": 2000
        })
    }

    #[tokio::test]
    async fn test_catalogue_management() {
        let app = TestApp::new().await;
        let admin = app.admin_token().await;
        let clerk = app.token_for("clerk@petal.vn", Role::Employee).await;

        let (status, _) = app.post("/api/products", Some(&clerk), rose()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, created) = app.post("/api/products", Some(&admin), rose()).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["version"], 1);

        let (status, found) = app.get("/api/products?q=red", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found.as_array().unwrap().len(), 1);

        let mut update = rose();
        update["expectedVersion"] = json!(1);
        update["sellPrice"] = json!(15000);
        let (status, updated) = app
            .send(Method::PUT, &format!("/api/products/{}", id), Some(&admin), Some(update.clone()))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["sellPrice"], 15000);
        assert_eq!(updated["version"], 2);

        // replaying the same stale version conflicts
        let (status, body) = app
            .send(Method::PUT, &format!("/api/products/{}", id), Some(&admin), Some(update))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");

        let (status, _) = app
            .send(Method::DELETE, &format!("/api/products/{}", id), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = app.get(&format!("/api/products/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rejects_invalid_product() {
        let app = TestApp::new().await;
        let admin = app.admin_token().await;

        let mut bad = rose();
        bad["name"] = json!("  ");
        let (status, body) = app.post("/api/products", Some(&admin), bad).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}
