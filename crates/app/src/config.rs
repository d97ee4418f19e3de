//! App configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CANOPY_DATABASE_URL` - `PostgreSQL` connection string for session storage
//!   (falls back to `DATABASE_URL`)
//! - `SHOPIFY_API_KEY` - App client ID from the Partner Dashboard
//! - `SHOPIFY_API_SECRET` - App client secret (signs OAuth, webhooks and app proxy)
//! - `SHOPIFY_APP_URL` - Public URL the app is served from
//!
//! ## Optional
//! - `SCOPES` - Comma-separated access scopes (default: `write_products,read_orders`)
//! - `SHOPIFY_API_VERSION` - Admin API version (default: 2025-10)
//! - `SHOP_CUSTOM_DOMAIN` - Extra shop domain accepted besides `*.myshopify.com`
//! - `CANOPY_HOST` - Bind address (default: 127.0.0.1)
//! - `CANOPY_PORT` - Listen port (default: 3000)
//! - `CANOPY_METAFIELD_NAMESPACE` - App metafield namespace (default: `tree_planting`)
//! - `CANOPY_TREE_COST` - Donation amount that plants one tree (default: 30.00)
//! - `CANOPY_FREE_PLAN_MONTHLY_LIMIT` - Tracked donations per month on the free plan (default: 50)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (TLS)
//! - `CANOPY_TLS_CERT` - PEM-encoded certificate chain
//! - `CANOPY_TLS_KEY` - PEM-encoded private key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Namespace for every metafield the app owns.
pub const DEFAULT_METAFIELD_NAMESPACE: &str = "tree_planting";
/// Admin API version the GraphQL documents are written against.
pub const DEFAULT_API_VERSION: &str = "2025-10";
const DEFAULT_SCOPES: &str = "write_products,read_orders";
const DEFAULT_TREE_COST: &str = "30.00";
const DEFAULT_FREE_PLAN_MONTHLY_LIMIT: i64 = 50;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Application configuration.
///
/// Loaded once in `main` and handed to [`crate::state::AppState`]; nothing
/// else reads the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Shopify app credentials and API settings
    pub shopify: ShopifyAppConfig,
    /// Donation bookkeeping settings
    pub donation: DonationConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// Shopify app configuration.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct ShopifyAppConfig {
    /// App client ID (`SHOPIFY_API_KEY`)
    pub api_key: String,
    /// App client secret; signs OAuth redirects, webhooks and proxy requests
    pub api_secret: SecretString,
    /// Public base URL of this app (no trailing slash)
    pub app_url: String,
    /// Requested access scopes
    pub scopes: Vec<String>,
    /// Admin API version (e.g., 2025-10)
    pub api_version: String,
    /// Shop domains accepted besides `*.myshopify.com`
    pub custom_shop_domains: Vec<String>,
}

impl std::fmt::Debug for ShopifyAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyAppConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("app_url", &self.app_url)
            .field("scopes", &self.scopes)
            .field("api_version", &self.api_version)
            .field("custom_shop_domains", &self.custom_shop_domains)
            .finish()
    }
}

/// Donation bookkeeping configuration.
#[derive(Debug, Clone)]
pub struct DonationConfig {
    /// Namespace of every app metafield
    pub metafield_namespace: String,
    /// Donation amount that plants one tree
    pub tree_cost: Decimal,
    /// Tracked donations per calendar month on the free plan
    pub free_plan_monthly_limit: i64,
}

impl Default for DonationConfig {
    fn default() -> Self {
        Self {
            metafield_namespace: DEFAULT_METAFIELD_NAMESPACE.to_string(),
            tree_cost: Decimal::new(3000, 2),
            free_plan_monthly_limit: DEFAULT_FREE_PLAN_MONTHLY_LIMIT,
        }
    }
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl TlsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let cert_pem = get_optional_env("CANOPY_TLS_CERT");
        let key_pem = get_optional_env("CANOPY_TLS_KEY");

        match (cert_pem, key_pem) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "CANOPY_TLS_*".to_string(),
                "Both CANOPY_TLS_CERT and CANOPY_TLS_KEY must be set together".to_string(),
            )),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("CANOPY_DATABASE_URL")?;
        let host = get_env_or_default("CANOPY_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("CANOPY_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("CANOPY_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("CANOPY_PORT".to_string(), e.to_string()))?;

        let shopify = ShopifyAppConfig::from_env()?;
        let donation = DonationConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);
        let tls = TlsConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            shopify,
            donation,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            tls,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the app is served over HTTPS (controls secure cookies).
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.shopify.app_url.starts_with("https://")
    }
}

impl ShopifyAppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let app_url = get_required_env("SHOPIFY_APP_URL")?;
        url::Url::parse(&app_url)
            .map_err(|e| ConfigError::InvalidEnvVar("SHOPIFY_APP_URL".to_string(), e.to_string()))?;

        Ok(Self {
            api_key: get_required_env("SHOPIFY_API_KEY")?,
            api_secret: get_validated_secret("SHOPIFY_API_SECRET")?,
            app_url: app_url.trim_end_matches('/').to_string(),
            scopes: parse_list(&get_env_or_default("SCOPES", DEFAULT_SCOPES)),
            api_version: get_env_or_default("SHOPIFY_API_VERSION", DEFAULT_API_VERSION),
            custom_shop_domains: get_optional_env("SHOP_CUSTOM_DOMAIN")
                .map(|d| parse_list(&d))
                .unwrap_or_default(),
        })
    }
}

impl DonationConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let namespace =
            get_env_or_default("CANOPY_METAFIELD_NAMESPACE", DEFAULT_METAFIELD_NAMESPACE);
        if namespace.len() < 3 || namespace.len() > 255 {
            return Err(ConfigError::InvalidEnvVar(
                "CANOPY_METAFIELD_NAMESPACE".to_string(),
                "must be between 3 and 255 characters".to_string(),
            ));
        }

        let tree_cost = Decimal::from_str(&get_env_or_default("CANOPY_TREE_COST", DEFAULT_TREE_COST))
            .map_err(|e| ConfigError::InvalidEnvVar("CANOPY_TREE_COST".to_string(), e.to_string()))?;
        if tree_cost <= Decimal::ZERO {
            return Err(ConfigError::InvalidEnvVar(
                "CANOPY_TREE_COST".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let free_plan_monthly_limit = get_env_or_default(
            "CANOPY_FREE_PLAN_MONTHLY_LIMIT",
            &DEFAULT_FREE_PLAN_MONTHLY_LIMIT.to_string(),
        )
        .parse::<i64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("CANOPY_FREE_PLAN_MONTHLY_LIMIT".to_string(), e.to_string())
        })?;

        Ok(Self {
            metafield_namespace: namespace,
            tree_cost,
            free_plan_monthly_limit,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the secret from the Partner Dashboard."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-secret-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("shpss_9f3Kq7LmZ2xR8vB1nT4wY6cJ0hD5gA", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list(" write_products, read_orders ,,"),
            vec!["write_products".to_string(), "read_orders".to_string()]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_donation_config_default() {
        let config = DonationConfig::default();
        assert_eq!(config.metafield_namespace, "tree_planting");
        assert_eq!(config.tree_cost.to_string(), "30.00");
        assert_eq!(config.free_plan_monthly_limit, 50);
    }

    #[test]
    fn test_shopify_config_debug_redacts_secret() {
        let config = ShopifyAppConfig {
            api_key: "client-id-123".to_string(),
            api_secret: SecretString::from("shpss_super_secret_value"),
            app_url: "https://canopy.example.app".to_string(),
            scopes: vec!["write_products".to_string()],
            api_version: DEFAULT_API_VERSION.to_string(),
            custom_shop_domains: vec![],
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("client-id-123"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("shpss_super_secret_value"));
    }
}
