//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_TOKEN_SECRET` - Bearer token signing secret (min 32 chars, high entropy)
//! - `RAZORPAY_KEY_SECRET` - Gateway secret used to authenticate payment callbacks
//! - `RAZORPAY_KEY_ID` - Gateway publishable key id (only with `PAYMENT_GATEWAY=razorpay`)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 4000)
//! - `STOREFRONT_TOKEN_ISSUER` - Expected `iss` claim (default: forkful)
//! - `STOREFRONT_CURRENCY` - ISO 4217 code (default: INR)
//! - `STOREFRONT_DELIVERY_FEE` - Flat delivery fee in minor units (default: 3000)
//! - `PAYMENT_GATEWAY` - `razorpay` or `sandbox` (default: razorpay)
//! - `RAZORPAY_API_BASE` - Gateway API base URL (default: <https://api.razorpay.com>)
//! - `PAYMENT_TIMEOUT_SECS` - Outbound gateway timeout (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance trace sample rate (default: 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use forkful_core::{CurrencyCode, Money};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    pub token: TokenConfig,
    pub commerce: CommerceConfig,
    pub payment: PaymentConfig,
    pub sentry: SentryConfig,
}

/// Bearer token verification settings.
#[derive(Clone)]
pub struct TokenConfig {
    /// HMAC secret the tokens are signed with
    pub secret: SecretString,
    /// Expected `iss` claim
    pub issuer: String,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .finish()
    }
}

/// Pricing settings shared by the cart view and checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommerceConfig {
    pub currency: CurrencyCode,
    /// Flat fee added to every non-empty cart
    pub delivery_fee: Money,
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::INR,
            delivery_fee: Money::from_minor(3000),
        }
    }
}

/// Which payment gateway adapter to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatewayKind {
    #[default]
    Razorpay,
    /// Local gateway that mints intents itself; for development and tests.
    Sandbox,
}

impl FromStr for GatewayKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "razorpay" => Ok(Self::Razorpay),
            "sandbox" => Ok(Self::Sandbox),
            other => Err(format!("unknown payment gateway: {other}")),
        }
    }
}

/// Payment gateway settings.
///
/// Implements `Debug` manually to redact the key secret.
#[derive(Clone)]
pub struct PaymentConfig {
    pub gateway: GatewayKind,
    /// Publishable key id handed to clients
    pub key_id: String,
    /// Secret used for API basic auth and callback signatures
    pub key_secret: SecretString,
    pub api_base: Url,
    /// Upper bound for every outbound gateway call
    pub timeout: Duration,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("gateway", &self.gateway)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

const DEFAULT_SENTRY_SAMPLE_RATE: f32 = 1.0;
const DEFAULT_SENTRY_TRACES_SAMPLE_RATE: f32 = 0.1;

/// Sentry settings; reporting is off without a DSN.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: DEFAULT_SENTRY_SAMPLE_RATE,
            traces_sample_rate: DEFAULT_SENTRY_TRACES_SAMPLE_RATE,
        }
    }
}

impl StorefrontConfig {
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

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_parsed_or_default::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = get_parsed_or_default::<u16>("STOREFRONT_PORT", "4000")?;

        Ok(Self {
            database_url,
            host,
            port,
            token: TokenConfig::from_env()?,
            commerce: CommerceConfig::from_env()?,
            payment: PaymentConfig::from_env()?,
            sentry: SentryConfig::from_env()?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl TokenConfig {
    /// Load just the token settings (also used by `fk-cli token issue`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the secret is missing, short or weak.
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = get_validated_secret("STOREFRONT_TOKEN_SECRET")?;
        validate_token_secret(&secret, "STOREFRONT_TOKEN_SECRET")?;
        Ok(Self {
            secret,
            issuer: get_env_or_default("STOREFRONT_TOKEN_ISSUER", "forkful"),
        })
    }
}

impl CommerceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let currency = get_parsed_or_default::<CurrencyCode>("STOREFRONT_CURRENCY", "INR")?;
        let fee = get_parsed_or_default::<i64>("STOREFRONT_DELIVERY_FEE", "3000")?;
        if fee < 0 {
            return Err(ConfigError::InvalidEnvVar(
                "STOREFRONT_DELIVERY_FEE".to_string(),
                "must not be negative".to_string(),
            ));
        }
        Ok(Self {
            currency,
            delivery_fee: Money::from_minor(fee),
        })
    }
}

impl PaymentConfig {
    /// Load just the gateway settings (also used by `fk-cli payment sign`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on a missing key, a weak secret or an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let gateway = get_parsed_or_default::<GatewayKind>("PAYMENT_GATEWAY", "razorpay")?;
        let key_id = match gateway {
            GatewayKind::Razorpay => get_required_env("RAZORPAY_KEY_ID")?,
            GatewayKind::Sandbox => get_env_or_default("RAZORPAY_KEY_ID", "sandbox"),
        };
        let api_base = get_parsed_or_default::<Url>("RAZORPAY_API_BASE", "https://api.razorpay.com")?;
        let timeout_secs = get_parsed_or_default::<u64>("PAYMENT_TIMEOUT_SECS", "10")?;

        Ok(Self {
            gateway,
            key_id,
            key_secret: get_validated_secret("RAZORPAY_KEY_SECRET")?,
            api_base,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: get_optional_parsed("SENTRY_SAMPLE_RATE")?
                .unwrap_or(DEFAULT_SENTRY_SAMPLE_RATE),
            traces_sample_rate: get_optional_parsed("SENTRY_TRACES_SAMPLE_RATE")?
                .unwrap_or(DEFAULT_SENTRY_TRACES_SAMPLE_RATE),
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

/// Get database URL with fallback to generic `DATABASE_URL`.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither variable is set.
pub fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
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
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse an optional environment variable.
fn get_optional_parsed<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key)
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
        .transpose()
}

/// Validate that a token secret meets minimum length requirements.
fn validate_token_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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
            #[allow(clippy::cast_precision_loss)]
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
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
        let err = validate_secret_strength("your-razorpay-key", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let err = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_token_secret_too_short() {
        let secret = SecretString::from("Zq8!vR2#");
        assert!(validate_token_secret(&secret, "TEST_TOKEN").is_err());
    }

    #[test]
    fn test_gateway_kind_parse() {
        assert_eq!("Sandbox".parse::<GatewayKind>(), Ok(GatewayKind::Sandbox));
        assert_eq!("razorpay".parse::<GatewayKind>(), Ok(GatewayKind::Razorpay));
        assert!("stripe".parse::<GatewayKind>().is_err());
    }

    #[test]
    fn test_commerce_defaults() {
        let commerce = CommerceConfig::default();
        assert_eq!(commerce.currency, CurrencyCode::INR);
        assert_eq!(commerce.delivery_fee, Money::from_minor(3000));
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_sentry_rate_defaults() {
        let sentry = SentryConfig::default();
        assert!(sentry.dsn.is_none());
        assert_eq!(sentry.sample_rate, 1.0);
        assert_eq!(sentry.traces_sample_rate, 0.1);
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 4000,
            token: TokenConfig {
                secret: SecretString::from("x".repeat(32)),
                issuer: "forkful".to_string(),
            },
            commerce: CommerceConfig::default(),
            payment: PaymentConfig {
                gateway: GatewayKind::Sandbox,
                key_id: "sandbox".to_string(),
                key_secret: SecretString::from("k"),
                api_base: Url::parse("https://api.razorpay.com").unwrap(),
                timeout: Duration::from_secs(10),
            },
            sentry: SentryConfig::default(),
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 4000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let payment = PaymentConfig {
            gateway: GatewayKind::Razorpay,
            key_id: "rzp_test_visible".to_string(),
            key_secret: SecretString::from("hidden_gateway_value"),
            api_base: Url::parse("https://api.razorpay.com").unwrap(),
            timeout: Duration::from_secs(10),
        };
        let token = TokenConfig {
            secret: SecretString::from("hidden_token_value"),
            issuer: "forkful".to_string(),
        };

        let debug_output = format!("{payment:?} {token:?}");

        assert!(debug_output.contains("rzp_test_visible"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hidden_gateway_value"));
        assert!(!debug_output.contains("hidden_token_value"));
    }
}
