//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub retell: RetellConfig,
    #[serde(default)]
    pub twilio: TwilioConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Comma-separated list of allowed CORS origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9001
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_cors_origins() -> String {
    "http://localhost:3000,http://127.0.0.1:3000".to_string()
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

/// Authentication configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Secret used to sign and verify access tokens (the identity provider's JWT secret)
    pub jwt_secret: String,

    /// Expiration for tokens minted by this service, in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: i64,

    /// Reject admin sessions that have not completed a second factor (aal2)
    #[serde(default = "default_require_mfa")]
    pub require_mfa: bool,
}

fn default_jwt_expiration() -> i64 {
    3600
}

fn default_require_mfa() -> bool {
    true
}

/// Shortest accepted signing secret, in bytes
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Well-known sample values that must never sign production tokens
const PLACEHOLDER_SECRETS: &[&str] = &["change-me", "changeme", "secret", "your-jwt-secret"];

impl AuthConfig {
    /// Reject missing, placeholder and short signing secrets
    pub fn validate(&self) -> Result<(), ConfigError> {
        let secret = self.jwt_secret.trim();

        if secret.is_empty() {
            return Err(ConfigError::Message("auth.jwt_secret must be set".to_string()));
        }
        if PLACEHOLDER_SECRETS
            .iter()
            .any(|placeholder| secret.eq_ignore_ascii_case(placeholder))
        {
            return Err(ConfigError::Message(
                "auth.jwt_secret is a placeholder value".to_string(),
            ));
        }
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Message(format!(
                "auth.jwt_secret must be at least {} characters",
                MIN_JWT_SECRET_LEN
            )));
        }
        Ok(())
    }
}

/// Billing rates and policies
#[derive(Debug, Deserialize, Clone)]
pub struct BillingConfig {
    /// Price per SMS segment in USD, used when the carrier did not report a price
    #[serde(default = "default_sms_rate")]
    pub sms_rate_per_segment_usd: Decimal,

    /// Price per billed voice minute in USD
    #[serde(default = "default_voice_rate")]
    pub voice_rate_per_minute_usd: Decimal,

    /// Segments billed per SMS conversation for the opening prompt that is
    /// not part of the stored message history
    #[serde(default)]
    pub initial_prompt_segments: u32,
}

fn default_sms_rate() -> Decimal {
    Decimal::new(83, 4) // 0.0083
}

fn default_voice_rate() -> Decimal {
    Decimal::new(22, 3) // 0.022
}

/// Exchange-rate source configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeConfig {
    /// Endpoint returning `{"rates": {"CAD": ...}}` for USD
    #[serde(default = "default_exchange_url")]
    pub url: String,

    /// How long a fetched rate stays fresh, in seconds
    #[serde(default = "default_exchange_ttl")]
    pub cache_ttl_secs: u64,

    /// Rate used until the first successful fetch
    #[serde(default = "default_fallback_rate")]
    pub fallback_rate: Decimal,

    /// Request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_exchange_url() -> String {
    "https://api.exchangerate-api.com/v4/latest/USD".to_string()
}

fn default_exchange_ttl() -> u64 {
    86_400 // 24 hours
}

fn default_fallback_rate() -> Decimal {
    Decimal::new(135, 2) // 1.35
}

fn default_http_timeout() -> u64 {
    10
}

/// Retell AI API configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RetellConfig {
    #[serde(default = "default_retell_url")]
    pub base_url: String,

    /// API key; conversational costs are reported as unavailable when unset
    pub api_key: Option<String>,

    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_retell_url() -> String {
    "https://api.retellai.com".to_string()
}

/// Twilio API configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TwilioConfig {
    #[serde(default = "default_twilio_url")]
    pub base_url: String,

    pub account_sid: Option<String>,

    pub auth_token: Option<String>,

    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_twilio_url() -> String {
    "https://api.twilio.com".to_string()
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 9001)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("database.max_connections", 10)?
            .set_default("auth.jwt_expiration_secs", 3600)?
            .set_default("auth.require_mfa", true)?
            .set_default("billing.sms_rate_per_segment_usd", "0.0083")?
            .set_default("billing.voice_rate_per_minute_usd", "0.022")?
            .set_default("billing.initial_prompt_segments", 0)?
            .set_default("exchange.url", default_exchange_url())?
            .set_default("exchange.cache_ttl_secs", 86_400)?
            .set_default("exchange.fallback_rate", "1.35")?
            .set_default("exchange.timeout_secs", 10)?
            .set_default("retell.base_url", default_retell_url())?
            .set_default("twilio.base_url", default_twilio_url())?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with RELAYBILL_ prefix
            .add_source(
                Environment::with_prefix("RELAYBILL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::validated(config)
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("RELAYBILL").separator("__"))
            .build()?;

        Self::validated(config)
    }

    fn validated(config: Config) -> Result<Self, ConfigError> {
        let app_config: Self = config.try_deserialize()?;
        app_config.auth.validate()?;
        Ok(app_config)
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            sms_rate_per_segment_usd: default_sms_rate(),
            voice_rate_per_minute_usd: default_voice_rate(),
            initial_prompt_segments: 0,
        }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            url: default_exchange_url(),
            cache_ttl_secs: default_exchange_ttl(),
            fallback_rate: default_fallback_rate(),
            timeout_secs: default_http_timeout(),
        }
    }
}

impl Default for RetellConfig {
    fn default() -> Self {
        Self {
            base_url: default_retell_url(),
            api_key: None,
            timeout_secs: default_http_timeout(),
        }
    }
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            base_url: default_twilio_url(),
            account_sid: None,
            auth_token: None,
            timeout_secs: default_http_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use rust_decimal_macros::dec;

    const STRONG_SECRET: &str = "super-secret-jwt-token-with-at-least-32-characters";

    fn parse(raw: &str) -> Result<AppConfig, ConfigError> {
        AppConfig::validated(
            Config::builder()
                .add_source(File::from_str(raw, FileFormat::Toml))
                .build()?,
        )
    }

    fn auth_section(secret: &str) -> String {
        format!(
            r#"
            [server]
            port = 9001

            [database]
            url = "postgresql://localhost/relaybill"

            [auth]
            jwt_secret = "{}"
            "#,
            secret
        )
    }

    #[test]
    fn test_default_billing_config() {
        let config = BillingConfig::default();
        assert_eq!(config.voice_rate_per_minute_usd, dec!(0.022));
        assert_eq!(config.sms_rate_per_segment_usd, dec!(0.0083));
        assert_eq!(config.initial_prompt_segments, 0);
    }

    #[test]
    fn test_default_exchange_config() {
        let config = ExchangeConfig::default();
        assert_eq!(config.fallback_rate, dec!(1.35));
        assert_eq!(config.cache_ttl_secs, 86_400);
    }

    #[test]
    fn test_deserialize_from_toml() {
        let raw = r#"
            [server]
            port = 8088

            [database]
            url = "postgresql://localhost/relaybill"

            [auth]
            jwt_secret = "super-secret-jwt-token-with-at-least-32-characters"
            require_mfa = false

            [billing]
            voice_rate_per_minute_usd = "0.03"
            initial_prompt_segments = 4
        "#;

        let config = parse(raw).unwrap();

        assert_eq!(config.server_addr(), "0.0.0.0:8088");
        assert!(!config.auth.require_mfa);
        assert_eq!(config.billing.voice_rate_per_minute_usd, dec!(0.03));
        assert_eq!(config.billing.initial_prompt_segments, 4);
        assert_eq!(config.exchange.fallback_rate, dec!(1.35));
        assert!(config.retell.api_key.is_none());
    }

    #[test]
    fn test_missing_jwt_secret_is_rejected() {
        let raw = r#"
            [server]
            port = 9001

            [database]
            url = "postgresql://localhost/relaybill"

            [auth]
            require_mfa = true
        "#;
        assert!(parse(raw).is_err());
        assert!(parse(&auth_section("")).is_err());
    }

    #[test]
    fn test_placeholder_jwt_secret_is_rejected() {
        for placeholder in ["change-me", "CHANGE-ME", "secret"] {
            let err = parse(&auth_section(placeholder)).unwrap_err();
            assert!(err.to_string().contains("placeholder"), "{}", err);
        }
    }

    #[test]
    fn test_short_jwt_secret_is_rejected() {
        let err = parse(&auth_section("only-twenty-chars-ok")).unwrap_err();
        assert!(err.to_string().contains("at least 32"));
    }

    #[test]
    fn test_strong_jwt_secret_is_accepted() {
        let config = parse(&auth_section(STRONG_SECRET)).unwrap();
        assert_eq!(config.auth.jwt_secret, STRONG_SECRET);
        assert!(config.auth.require_mfa);
    }
}
