//! Shared handler state.

use std::sync::Arc;

use petal_core::OptionDeletionPolicy;
use petal_db::{Database, OrderPricing};

use crate::auth::JwtManager;
use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};

/// Everything a handler may need. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    jwt: Option<Arc<JwtManager>>,
    pub pricing: Arc<OrderPricing>,
    pub option_policy: OptionDeletionPolicy,
}

impl AppState {
    pub fn new(
        db: Database,
        jwt: Option<JwtManager>,
        pricing: OrderPricing,
        option_policy: OptionDeletionPolicy,
    ) -> Self {
        AppState {
            db,
            jwt: jwt.map(Arc::new),
            pricing: Arc::new(pricing),
            option_policy,
        }
    }

    pub fn from_config(db: Database, config: &ServerConfig) -> Self {
        let jwt = config
            .jwt_secret
            .as_ref()
            .map(|secret| JwtManager::new(secret.clone(), config.token_lifetime_secs));
        let pricing = OrderPricing {
            shipping_fee: config.shipping_fee,
            discount_codes: config.discount_codes.clone(),
        };
        AppState::new(db, jwt, pricing, config.option_deletion_policy)
    }

    /// The token manager, or 503 when no signing secret is configured.
    pub fn jwt(&self) -> ApiResult<&JwtManager> {
        self.jwt
            .as_deref()
            .ok_or_else(|| ApiError::unavailable("Authentication is not configured on this server"))
    }
}
