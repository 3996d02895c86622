//! HTTP routes.
//!
//! Every route lives under `/api`. Handlers follow one shape: extract the
//! caller, run the policy check, call exactly one repository method.

mod access;
mod customers;
mod debts;
mod employees;
mod events;
mod health;
mod invoices;
mod options;
mod orders;
mod products;
mod session;
mod stock;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health::check))
        .route("/auth/login", post(session::login))
        .route("/auth/register", post(session::register))
        .route("/products", get(products::list).post(products::create))
        .route(
            "/products/{id}",
            get(products::get).put(products::update).delete(products::remove),
        )
        .route("/products/{id}/disposals", get(stock::list_for_product))
        .route("/options/{kind}", get(options::list).post(options::add))
        .route("/options/{kind}/{value}", delete(options::remove))
        .route("/invoices", get(invoices::list).post(invoices::checkout))
        .route("/invoices/{id}", get(invoices::get))
        .route("/orders", get(orders::list).post(orders::place))
        .route("/orders/{id}", get(orders::get))
        .route("/orders/{id}/status", post(orders::set_status))
        .route("/orders/{id}/payment-status", post(orders::set_payment_status))
        .route("/debts", get(debts::list).post(debts::create))
        .route("/debts/{id}/toggle", post(debts::toggle))
        .route("/imports", get(stock::list_imports).post(stock::record_import))
        .route("/imports/{id}", get(stock::get_import))
        .route("/disposals", get(stock::list_disposals).post(stock::record_disposal))
        .route("/access-requests", get(access::list).post(access::submit))
        .route("/access-requests/{id}/approve", post(access::approve))
        .route("/access-requests/{id}/reject", post(access::reject))
        .route("/customers", get(customers::list).post(customers::create))
        .route(
            "/customers/{id}",
            get(customers::get).put(customers::update).delete(customers::remove),
        )
        .route("/employees", get(employees::list).post(employees::create))
        .route(
            "/employees/{id}",
            get(employees::get).put(employees::update).delete(employees::remove),
        )
        .route("/events", get(events::stream));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use petal_core::{OptionDeletionPolicy, Product, Role};
    use petal_db::{hash_password, Database, OrderPricing};

    use crate::auth::JwtManager;
    use crate::state::AppState;

    pub const SECRET: &str = "test-secret";

    pub struct TestApp {
        pub db: Database,
        pub router: Router,
        pub jwt: JwtManager,
    }

    impl TestApp {
        pub async fn new() -> Self {
            Self::build(Some(SECRET)).await
        }

        /// An app without a signing secret.
        pub async fn unconfigured() -> Self {
            Self::build(None).await
        }

        async fn build(secret: Option<&str>) -> Self {
            let db = Database::in_memory().await.unwrap();
            let pricing = OrderPricing {
                shipping_fee: 30_000,
                discount_codes: [("TET".to_string(), 20_000)].into_iter().collect(),
            };
            let state = AppState::new(
                db.clone(),
                secret.map(|s| JwtManager::new(s, 3600)),
                pricing,
                OptionDeletionPolicy::Block,
            );
            TestApp {
                db,
                router: crate::routes::router(state),
                jwt: JwtManager::new(SECRET, 3600),
            }
        }

        /// Creates an identity with `role` and returns a bearer token for it.
        pub async fn token_for(&self, email: &str, role: Role) -> String {
            let hash = hash_password("secret-pass").unwrap();
            let identity = self
                .db
                .identities()
                .create(email, &hash, role, "Test User")
                .await
                .unwrap();
            self.jwt.issue(&identity.id, role).unwrap()
        }

        pub async fn admin_token(&self) -> String {
            self.token_for("admin@petal.vn", Role::Admin).await
        }

        pub async fn product(&self, name: &str, quantity: i64, sell_price: i64) -> Product {
            self.db
                .products()
                .insert(&petal_core::ProductInput {
                    name: name.into(),
                    color: "red".into(),
                    quality: "A".into(),
                    size: "60cm".into(),
                    unit: "stem".into(),
                    quantity,
                    sell_price,
                    cost_price: sell_price / 2,
                    max_discount_per_unit: Some(1_000),
                    image_url: None,
                })
                .await
                .unwrap()
        }

        pub async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            let request = match body {
                Some(json) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, json)
        }

        pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
            self.send(Method::GET, uri, token, None).await
        }

        pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
            self.send(Method::POST, uri, token, Some(body)).await
        }
    }
}
