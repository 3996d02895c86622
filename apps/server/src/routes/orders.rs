//! Storefront orders and their status lifecycle.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use petal_core::policy::{authorize, Action};
use petal_core::{Order, OrderStatus, PaymentStatus, PlaceOrderRequest};

use crate::auth::AuthActor;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusRequest {
    pub payment_status: PaymentStatus,
}

pub async fn place(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(body): Json<PlaceOrderRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    authorize(&actor, Action::PlaceOrder)?;
    let order = state.db.orders().place(&body, &actor, &state.pricing).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Staff see every order, customers only their own.
pub async fn list(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
) -> ApiResult<Json<Vec<Order>>> {
    let orders = if actor.is_staff() {
        state.db.orders().list(None).await?
    } else {
        authorize(&actor, Action::PlaceOrder)?;
        state.db.orders().list(Some(&actor.id)).await?
    };
    Ok(Json(orders))
}

pub async fn get(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    let order = state.db.orders().get_by_id(&id).await?;
    if !actor.is_staff() && !order.is_owned_by(&actor) {
        return Err(ApiError::forbidden("Not your order"));
    }
    Ok(Json(order))
}

pub async fn set_status(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> ApiResult<Json<Order>> {
    authorize(&actor, Action::TransitionOrder)?;
    let reason = body.reason.filter(|r| !r.trim().is_empty());
    let order = state
        .db
        .orders()
        .apply_transition(&id, body.status, &actor, reason)
        .await?;
    Ok(Json(order))
}

pub async fn set_payment_status(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(body): Json<PaymentStatusRequest>,
) -> ApiResult<Json<Order>> {
    authorize(&actor, Action::SetPaymentStatus)?;
    let order = state
        .db
        .orders()
        .set_payment_status(&id, body.payment_status, &actor)
        .await?;
    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use petal_core::Role;

    use crate::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_customer_cancellation_restocks_after_staff_approval() {
        let app = TestApp::new().await;
        let admin = app.admin_token().await;
        let customer = app.token_for("mai@petal.vn", Role::Customer).await;
        let tulip = app.product("Tulip", 6, 18_000).await;

        let (_, order) = app
            .post(
                "/api/orders",
                Some(&customer),
                json!({
                    "customerName": "Mai",
                    "customerPhone": "0912345678",
                    "shippingAddress": "5 Lý Thái Tổ",
                    "lines": [{ "productId": tulip.id, "quantity": 4 }]
                }),
            )
            .await;
        let status_uri = format!("/api/orders/{}/status", order["id"].as_str().unwrap());

        let (status, requested) = app
            .post(
                &status_uri,
                Some(&customer),
                json!({ "status": "cancellation_requested", "reason": "wrong date" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(requested["history"][0]["reason"], "wrong date");

        // a customer cannot grant their own cancellation
        let (status, _) = app
            .post(&status_uri, Some(&customer), json!({ "status": "cancelled" }))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, cancelled) = app
            .post(&status_uri, Some(&admin), json!({ "status": "cancelled" }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["history"].as_array().unwrap().len(), 2);

        let stock = app.db.products().get_by_id(&tulip.id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 6);

        // terminal
        let (status, body) = app
            .post(&status_uri, Some(&admin), json!({ "status": "confirmed" }))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "BUSINESS_RULE");
    }

    #[tokio::test]
    async fn test_unknown_order_is_404() {
        let app = TestApp::new().await;
        let admin = app.admin_token().await;
        let (status, _) = app.get("/api/orders/missing", Some(&admin)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
