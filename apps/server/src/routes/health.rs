//! Liveness and readiness.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    database: bool,
    /// Whether a token signing secret is configured.
    auth: bool,
    server_time: String,
}

pub async fn check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = state.db.health_check().await;
    let auth = state.jwt().is_ok();

    let (code, status) = match (database, auth) {
        (true, true) => (StatusCode::OK, "serving"),
        (true, false) => (StatusCode::OK, "degraded"),
        (false, _) => (StatusCode::SERVICE_UNAVAILABLE, "not_serving"),
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            auth,
            server_time: Utc::now().to_rfc3339(),
        }),
    )
}
