//! Server configuration.
//!
//! Values are layered: built-in defaults, then an optional `petal.toml` in
//! the working directory, then `PETAL_*` environment variables.
//!
//! | Key                      | Env                            | Default          |
//! |--------------------------|--------------------------------|------------------|
//! | `bind_addr`              | `PETAL_BIND_ADDR`              | `0.0.0.0:8080`   |
//! | `database_path`          | `PETAL_DATABASE_PATH`          | `petal.db`       |
//! | `jwt_secret`             | `PETAL_JWT_SECRET`             | unset            |
//! | `token_lifetime_secs`    | `PETAL_TOKEN_LIFETIME_SECS`    | `28800` (8h)     |
//! | `write_timeout_ms`       | `PETAL_WRITE_TIMEOUT_MS`       | `5000`           |
//! | `option_deletion_policy` | `PETAL_OPTION_DELETION_POLICY` | `orphan`         |
//! | `shipping_fee`           | `PETAL_SHIPPING_FEE`           | `30000`          |
//! | `discount_codes`         | file only                      | none             |
//!
//! Without a JWT secret the server still starts; every route that needs a
//! bearer credential answers 503.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use petal_core::OptionDeletionPolicy;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP listener binds to
    pub bind_addr: String,

    /// SQLite database file
    pub database_path: String,

    /// HMAC secret for bearer tokens
    pub jwt_secret: Option<String>,

    /// Issued token lifetime in seconds
    pub token_lifetime_secs: i64,

    /// Deadline for a single write transaction
    pub write_timeout_ms: u64,

    /// Whether options still used by products may be deleted
    pub option_deletion_policy: OptionDeletionPolicy,

    /// Flat shipping fee added to storefront orders, in dong
    pub shipping_fee: i64,

    /// Storefront discount codes and their amounts in dong
    #[serde(default)]
    pub discount_codes: HashMap<String, i64>,
}

impl ServerConfig {
    /// Loads from `petal.toml` (if present) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("petal")
    }

    /// Loads from the named config file (extension optional, may be absent)
    /// and the environment.
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .set_default("bind_addr", "0.0.0.0:8080")?
            .set_default("database_path", "petal.db")?
            .set_default("token_lifetime_secs", 8 * 3600_i64)?
            .set_default("write_timeout_ms", 5000_i64)?
            .set_default("option_deletion_policy", "orphan")?
            .set_default("shipping_fee", 30_000_i64)?
            .add_source(config::File::with_name(file).required(false))
            .add_source(config::Environment::with_prefix("PETAL").try_parsing(true))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.normalized()
    }

    /// Checks values and canonicalises discount codes to upper case.
    fn normalized(mut self) -> Result<Self, ConfigError> {
        if self.write_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("write_timeout_ms".to_string()));
        }
        if self.token_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("token_lifetime_secs".to_string()));
        }
        if self.shipping_fee < 0 {
            return Err(ConfigError::InvalidValue("shipping_fee".to_string()));
        }
        if let Some((code, _)) = self.discount_codes.iter().find(|(_, amount)| **amount <= 0) {
            return Err(ConfigError::InvalidValue(format!("discount_codes.{}", code)));
        }

        self.jwt_secret = self.jwt_secret.filter(|s| !s.trim().is_empty());
        self.discount_codes = self
            .discount_codes
            .into_iter()
            .map(|(code, amount)| (code.trim().to_uppercase(), amount))
            .collect();

        Ok(self)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".into(),
            database_path: ":memory:".into(),
            jwt_secret: Some("  ".into()),
            token_lifetime_secs: 60,
            write_timeout_ms: 100,
            option_deletion_policy: OptionDeletionPolicy::Orphan,
            shipping_fee: 30_000,
            discount_codes: HashMap::from([(" tet ".to_string(), 20_000)]),
        }
    }

    #[test]
    fn test_normalizes_codes_and_blank_secret() {
        let config = base().normalized().unwrap();
        assert!(config.jwt_secret.is_none());
        assert_eq!(config.discount_codes.get("TET"), Some(&20_000));
        assert_eq!(config.write_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut zero_timeout = base();
        zero_timeout.write_timeout_ms = 0;
        assert!(zero_timeout.normalized().is_err());

        let mut free_code = base();
        free_code.discount_codes.insert("FREE".into(), 0);
        assert!(free_code.normalized().is_err());
    }

    #[test]
    fn test_defaults_without_file() {
        let config = ServerConfig::load_from("does-not-exist").unwrap();
        assert!(config.token_lifetime_secs > 0);
        assert!(config.write_timeout_ms > 0);
    }
}
