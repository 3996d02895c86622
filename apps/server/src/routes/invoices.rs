//! Counter checkout.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::debug;

use petal_core::policy::{authorize, Action};
use petal_core::{CheckoutRequest, Invoice};

use crate::auth::AuthActor;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    limit: Option<u32>,
}

pub async fn checkout(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(body): Json<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<Invoice>)> {
    authorize(&actor, Action::Checkout)?;
    debug!(lines = body.lines.len(), actor = %actor.id, "Checkout requested");
    let invoice = state.db.invoices().checkout(&body, &actor).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn list(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Invoice>>> {
    authorize(&actor, Action::ViewRecords)?;
    let limit = query.limit.unwrap_or(100).min(1000);
    Ok(Json(state.db.invoices().list(limit).await?))
}

pub async fn get(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Invoice>> {
    authorize(&actor, Action::ViewRecords)?;
    Ok(Json(state.db.invoices().get_by_id(&id).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use petal_core::Role;

    use crate::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_checkout_with_debt() {
        let app = TestApp::new().await;
        let clerk = app.token_for("clerk@petal.vn", Role::Employee).await;
        let rose = app.product("Rose", 10, 10_000).await;

        let (status, invoice) = app
            .post(
                "/api/invoices",
                Some(&clerk),
                json!({
                    "customerName": "Chị Hoa",
                    "lines": [{ "productId": rose.id, "quantity": 4 }],
                    "paymentMethod": "cash",
                    "amountPaid": 15000
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(invoice["total"], 40_000);
        assert_eq!(invoice["debtAmount"], 25_000);
        let id = invoice["id"].as_str().unwrap().to_string();

        let (status, fetched) = app.get(&format!("/api/invoices/{}", id), Some(&clerk)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["items"].as_array().unwrap().len(), 1);

        let stock = app.db.products().get_by_id(&rose.id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 6);
        assert_eq!(app.db.debts().list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_checkout_rejections() {
        let app = TestApp::new().await;
        let clerk = app.token_for("clerk@petal.vn", Role::Employee).await;
        let customer = app.token_for("lan@petal.vn", Role::Customer).await;
        let rose = app.product("Rose", 2, 10_000).await;
        let cart = json!({
            "customerName": "Khách lẻ",
            "lines": [{ "productId": rose.id, "quantity": 3 }],
            "paymentMethod": "cash",
            "amountPaid": 30000
        });

        let (status, _) = app.post("/api/invoices", None, cart.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app.post("/api/invoices", Some(&customer), cart.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.post("/api/invoices", Some(&clerk), cart).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "INSUFFICIENT_STOCK");
        assert!(app.db.invoices().list(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_price_override_is_400() {
        let app = TestApp::new().await;
        let clerk = app.token_for("clerk@petal.vn", Role::Employee).await;
        let rose = app.product("Rose", 10, 10_000).await;

        let (status, body) = app
            .post(
                "/api/invoices",
                Some(&clerk),
                json!({
                    "customerName": "Khách lẻ",
                    "lines": [
                        { "productId": rose.id, "quantity": 3, "unitPrice": i64::MAX / 2 }
                    ],
                    "paymentMethod": "cash",
                    "amountPaid": 0
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let stock = app.db.products().get_by_id(&rose.id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 10);
        assert!(app.db.invoices().list(10).await.unwrap().is_empty());
    }
}
