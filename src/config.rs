use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::{error, info};

const CONFIG_DIR: &str = "config";
const DEFAULT_ENV: &str = "development";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Application configuration, loaded from `config/*.toml` plus `APP__*`
/// environment overrides. Constructed once at startup and passed down
/// explicitly; there are no ambient singletons.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_true_bool")]
    pub auto_migrate: bool,

    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,

    /// Secret for dispatcher session tokens. No default on purpose.
    pub jwt_secret: String,
    #[serde(default = "default_jwt_expiration_secs")]
    pub jwt_expiration_secs: u64,

    /// Base URL of the payment processor's API.
    pub gateway_base_url: String,
    /// Access token sent as a bearer credential on every gateway call.
    pub gateway_access_token: String,
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,

    /// Public base URL of the storefront, used for the buyer-facing
    /// success/failure/pending redirect pages.
    pub storefront_base_url: String,
    /// Public base URL of this API, used for the gateway's notification
    /// callback.
    pub api_base_url: String,

    #[serde(default = "default_currency")]
    pub currency: String,

    /// Comma-separated list of allowed CORS origins; permissive when unset.
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_true_bool() -> bool {
    true
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_jwt_expiration_secs() -> u64 {
    3600
}
fn default_gateway_timeout_secs() -> u64 {
    10
}
fn default_currency() -> String {
    "USD".to_string()
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // jwt_secret has no default so a deployment can never fall back to an
    // insecure well-known value.
    if config.get_string("jwt_secret").is_err() {
        error!("jwt_secret is not configured. Set APP__JWT_SECRET with a secure random string.");
        return Err(ConfigError::NotFound(
            "jwt_secret is required but not configured".into(),
        ));
    }

    config.try_deserialize()
}

pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("shopfront_api={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

impl AppConfig {
    /// Buyer redirect page for a given checkout outcome.
    pub fn redirect_url(&self, outcome: &str, order_id: uuid::Uuid) -> String {
        format!(
            "{}/checkout/{}?order_id={}",
            self.storefront_base_url.trim_end_matches('/'),
            outcome,
            order_id
        )
    }

    /// Gateway notification callback. The order id here is only a fallback
    /// correlation hint; the external reference echoed by the gateway is the
    /// authoritative key.
    pub fn notification_url(&self, order_id: uuid::Uuid) -> String {
        format!(
            "{}/payment-notifications?order_id={}",
            self.api_base_url.trim_end_matches('/'),
            order_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 5,
            auto_migrate: true,
            host: "127.0.0.1".to_string(),
            port: 8080,
            log_level: "debug".to_string(),
            log_json: false,
            jwt_secret: "test-secret".to_string(),
            jwt_expiration_secs: 3600,
            gateway_base_url: "https://gateway.example".to_string(),
            gateway_access_token: "token".to_string(),
            gateway_timeout_secs: 10,
            storefront_base_url: "https://shop.example/".to_string(),
            api_base_url: "https://api.shop.example".to_string(),
            currency: "USD".to_string(),
            cors_allowed_origins: None,
        }
    }

    #[test]
    fn redirect_urls_embed_the_order_id() {
        let cfg = sample_config();
        let id = uuid::Uuid::new_v4();
        let url = cfg.redirect_url("success", id);
        assert_eq!(
            url,
            format!("https://shop.example/checkout/success?order_id={}", id)
        );
    }

    #[test]
    fn notification_url_targets_the_api() {
        let cfg = sample_config();
        let id = uuid::Uuid::new_v4();
        assert_eq!(
            cfg.notification_url(id),
            format!("https://api.shop.example/payment-notifications?order_id={}", id)
        );
    }
}
