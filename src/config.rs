//! Application configuration loaded from environment variables.
//!
//! Configuration is loaded once at startup and validated before backends are
//! dialed; a bad security posture aborts the process instead of degrading.
//!
//! ## Required Variables
//!
//! - `PRODUCT_CATALOG_SERVICE_ADDR`, `CURRENCY_SERVICE_ADDR`,
//!   `CART_SERVICE_ADDR` - backend `host:port` addresses
//!
//! ## Optional Variables
//!
//! - `LISTEN` - Bind address (default: `0.0.0.0:8080`)
//! - `RUST_LOG` - Log level (default: `info`)
//! - `LOG_FORMAT` - Log format: `text` or `json` (default: `text`)
//! - `ENV` - `production` forces the `Secure` cookie attribute
//! - `BEHIND_PROXY` - trust `X-Forwarded-For` / `X-Real-IP` for client IPs
//! - `COOKIE_MAX_AGE_SECS` - session/CSRF cookie lifetime (default: 172800)
//! - `ENABLE_SINGLE_SHARED_SESSION` - shared-session demo mode
//! - `DISABLE_RATE_LIMITING` - bypass every admission check
//! - `RATE_LIMIT_RPS` / `RATE_LIMIT_BURST` - default limiter group
//!   (defaults: 1.67 tokens/s, burst 20)
//! - `RATE_LIMIT_EXPENSIVE_RPS` / `RATE_LIMIT_EXPENSIVE_BURST` - stricter
//!   group for expensive endpoints (defaults: 0.17 tokens/s, burst 10)
//! - `RATE_LIMIT_EXPENSIVE_PATHS` - comma-separated paths routed to the
//!   expensive group (default: `/cart/checkout`)
//! - `RATE_LIMIT_KEY_SOURCE` - `ip`, `session`, or `session-and-ip` (default)
//! - `RATE_LIMIT_SWEEP_SECS` / `RATE_LIMIT_IDLE_SECS` - bucket eviction
//!   cadence and idle threshold (defaults: 60 / 180)
//! - `BACKEND_TLS_MODE` - `insecure` | `system` | `skip-verify` | `custom`
//! - `BACKEND_TLS_CA_CERT` - PEM path, required for `custom`
//! - `CONNECT_TIMEOUT_SECS` - startup dial timeout (default: 3)
//! - `READINESS_TIMEOUT_SECS` - readiness aggregate deadline (default: 2)
//! - `ALLOWED_ORIGINS` - comma-separated CORS allow-list (`*` allows all)
//! - `ENABLE_ACCESS_LOG`, `ENABLE_SESSION`, `ENABLE_CSRF`,
//!   `ENABLE_SECURITY_HEADERS`, `ENABLE_CORS` - per-stage toggles (default on)
//! - `VERBOSE_ERRORS` - expose internal error detail (development only)

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::ratelimit::{GroupPolicy, KeySource};
use crate::infrastructure::backend::{BackendAddrs, TlsMode};

/// Name of the limiter group handling generic traffic.
pub const DEFAULT_LIMITER_GROUP: &str = "default";
/// Name of the stricter limiter group for expensive endpoints.
pub const EXPENSIVE_LIMITER_GROUP: &str = "expensive";

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: String,
    /// Forces the `Secure` cookie attribute regardless of how the request
    /// arrived. Set via `ENV=production`.
    pub production: bool,
    /// When true, client IPs are read from `X-Forwarded-For` / `X-Real-IP`.
    /// Enable only behind a trusted reverse proxy.
    pub behind_proxy: bool,

    pub cookie_max_age_secs: i64,
    /// Demo mode: every browser shares one fixed session identifier.
    pub shared_session: bool,

    pub rate_limit_disabled: bool,
    pub limiter_groups: Vec<GroupPolicy>,
    /// Paths routed to the expensive limiter group.
    pub expensive_paths: Vec<String>,
    pub sweep_interval: Duration,
    pub idle_timeout: Duration,

    pub backend_tls_mode: TlsMode,
    pub backend_tls_ca_cert: Option<PathBuf>,
    pub backend_addrs: BackendAddrs,
    pub connect_timeout: Duration,
    pub readiness_timeout: Duration,

    pub allowed_origins: Vec<String>,

    pub enable_access_log: bool,
    pub enable_session: bool,
    pub enable_csrf: bool,
    pub enable_security_headers: bool,
    pub enable_cors: bool,
    pub verbose_errors: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required backend address is missing.
    pub fn from_env() -> Result<Self> {
        let listen_addr = env::var("LISTEN").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
        let production = env::var("ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let key_source = KeySource::parse(
            &env::var("RATE_LIMIT_KEY_SOURCE").unwrap_or_default(),
        );

        let limiter_groups = vec![
            GroupPolicy {
                name: DEFAULT_LIMITER_GROUP.to_string(),
                burst: env_parse("RATE_LIMIT_BURST", 20),
                rate_per_sec: env_parse("RATE_LIMIT_RPS", 1.67),
                key_source,
            },
            GroupPolicy {
                name: EXPENSIVE_LIMITER_GROUP.to_string(),
                burst: env_parse("RATE_LIMIT_EXPENSIVE_BURST", 10),
                rate_per_sec: env_parse("RATE_LIMIT_EXPENSIVE_RPS", 0.17),
                key_source,
            },
        ];

        let expensive_paths = split_csv(
            &env::var("RATE_LIMIT_EXPENSIVE_PATHS")
                .unwrap_or_else(|_| "/cart/checkout".to_string()),
        );

        let backend_addrs = BackendAddrs {
            product_catalog: require_env("PRODUCT_CATALOG_SERVICE_ADDR")?,
            currency: require_env("CURRENCY_SERVICE_ADDR")?,
            cart: require_env("CART_SERVICE_ADDR")?,
        };

        let backend_tls_mode =
            TlsMode::parse(&env::var("BACKEND_TLS_MODE").unwrap_or_default());
        let backend_tls_ca_cert = env::var("BACKEND_TLS_CA_CERT").ok().map(PathBuf::from);

        Ok(Self {
            listen_addr,
            log_level,
            log_format,
            production,
            behind_proxy: env_bool("BEHIND_PROXY", false),
            cookie_max_age_secs: env_parse("COOKIE_MAX_AGE_SECS", 172_800),
            shared_session: env_bool("ENABLE_SINGLE_SHARED_SESSION", false),
            rate_limit_disabled: env_bool("DISABLE_RATE_LIMITING", false),
            limiter_groups,
            expensive_paths,
            sweep_interval: Duration::from_secs(env_parse("RATE_LIMIT_SWEEP_SECS", 60)),
            idle_timeout: Duration::from_secs(env_parse("RATE_LIMIT_IDLE_SECS", 180)),
            backend_tls_mode,
            backend_tls_ca_cert,
            backend_addrs,
            connect_timeout: Duration::from_secs(env_parse("CONNECT_TIMEOUT_SECS", 3)),
            readiness_timeout: Duration::from_secs(env_parse("READINESS_TIMEOUT_SECS", 2)),
            allowed_origins: split_csv(&env::var("ALLOWED_ORIGINS").unwrap_or_default()),
            enable_access_log: env_bool("ENABLE_ACCESS_LOG", true),
            enable_session: env_bool("ENABLE_SESSION", true),
            enable_csrf: env_bool("ENABLE_CSRF", true),
            enable_security_headers: env_bool("ENABLE_SECURITY_HEADERS", true),
            enable_cors: env_bool("ENABLE_CORS", true),
            verbose_errors: env_bool("VERBOSE_ERRORS", false),
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `log_format` is not `text` or `json`
    /// - `listen_addr` is not `host:port`
    /// - a limiter group has a zero burst or non-positive rate
    /// - timeouts or cookie lifetime are zero
    /// - TLS mode is `custom` without a CA path
    pub fn validate(&self) -> Result<()> {
        if self.log_format != "text" && self.log_format != "json" {
            anyhow::bail!(
                "LOG_FORMAT must be 'text' or 'json', got '{}'",
                self.log_format
            );
        }

        if !self.listen_addr.contains(':') {
            anyhow::bail!(
                "LISTEN must be in format 'host:port', got '{}'",
                self.listen_addr
            );
        }

        for group in &self.limiter_groups {
            if group.burst == 0 {
                anyhow::bail!("limiter group '{}' must have a burst of at least 1", group.name);
            }
            if group.rate_per_sec <= 0.0 {
                anyhow::bail!(
                    "limiter group '{}' must have a positive refill rate, got {}",
                    group.name,
                    group.rate_per_sec
                );
            }
        }

        if self.cookie_max_age_secs <= 0 {
            anyhow::bail!("COOKIE_MAX_AGE_SECS must be greater than 0");
        }

        if self.sweep_interval.is_zero() || self.idle_timeout.is_zero() {
            anyhow::bail!("RATE_LIMIT_SWEEP_SECS and RATE_LIMIT_IDLE_SECS must be greater than 0");
        }

        if self.connect_timeout.is_zero() {
            anyhow::bail!("CONNECT_TIMEOUT_SECS must be greater than 0");
        }

        if self.readiness_timeout.is_zero() {
            anyhow::bail!("READINESS_TIMEOUT_SECS must be greater than 0");
        }

        if self.backend_tls_mode == TlsMode::Custom && self.backend_tls_ca_cert.is_none() {
            anyhow::bail!("BACKEND_TLS_CA_CERT must be set when BACKEND_TLS_MODE=custom");
        }

        Ok(())
    }

    /// Prints configuration summary (no secrets are held in configuration).
    pub fn print_summary(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  Listen address: {}", self.listen_addr);
        tracing::info!("  Backend TLS mode: {:?}", self.backend_tls_mode);
        tracing::info!(
            "  Backends: catalog={} currency={} cart={}",
            self.backend_addrs.product_catalog,
            self.backend_addrs.currency,
            self.backend_addrs.cart
        );
        for group in &self.limiter_groups {
            tracing::info!(
                "  Limiter group '{}': burst={} rate={}/s key={:?}",
                group.name,
                group.burst,
                group.rate_per_sec,
                group.key_source
            );
        }
        if self.rate_limit_disabled {
            tracing::warn!("  Rate limiting: DISABLED");
        }
        if self.shared_session {
            tracing::warn!("  Shared-session demo mode: ON (no identity isolation)");
        }
        tracing::info!("  Log level: {}", self.log_level);
        tracing::info!("  Log format: {}", self.log_format);
    }
}

fn require_env(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("environment variable {key} must be set"))
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Loads and validates configuration from environment variables.
///
/// # Errors
///
/// Returns an error if required variables are missing or validation fails.
///
/// # Note
///
/// This function expects environment variables to be already loaded
/// (e.g., via `dotenvy::dotenv()` in `main.rs`).
pub fn load_from_env() -> Result<Config> {
    let config = Config::from_env()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn base_config() -> Config {
        Config {
            listen_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            production: false,
            behind_proxy: false,
            cookie_max_age_secs: 172_800,
            shared_session: false,
            rate_limit_disabled: false,
            limiter_groups: vec![GroupPolicy {
                name: DEFAULT_LIMITER_GROUP.to_string(),
                burst: 20,
                rate_per_sec: 1.67,
                key_source: KeySource::SessionAndIp,
            }],
            expensive_paths: vec!["/cart/checkout".to_string()],
            sweep_interval: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(180),
            backend_tls_mode: TlsMode::Insecure,
            backend_tls_ca_cert: None,
            backend_addrs: BackendAddrs {
                product_catalog: "catalog:3550".to_string(),
                currency: "currency:7000".to_string(),
                cart: "cart:7070".to_string(),
            },
            connect_timeout: Duration::from_secs(3),
            readiness_timeout: Duration::from_secs(2),
            allowed_origins: vec![],
            enable_access_log: true,
            enable_session: true,
            enable_csrf: true,
            enable_security_headers: true,
            enable_cors: true,
            verbose_errors: false,
        }
    }

    #[test]
    fn test_config_validation() {
        let mut config = base_config();
        assert!(config.validate().is_ok());

        config.log_format = "invalid".to_string();
        assert!(config.validate().is_err());
        config.log_format = "json".to_string();
        assert!(config.validate().is_ok());

        config.listen_addr = "8080".to_string();
        assert!(config.validate().is_err());
        config.listen_addr = "0.0.0.0:8080".to_string();

        config.limiter_groups[0].burst = 0;
        assert!(config.validate().is_err());
        config.limiter_groups[0].burst = 20;

        config.limiter_groups[0].rate_per_sec = 0.0;
        assert!(config.validate().is_err());
        config.limiter_groups[0].rate_per_sec = 1.67;

        config.backend_tls_mode = TlsMode::Custom;
        assert!(config.validate().is_err());
        config.backend_tls_ca_cert = Some(PathBuf::from("/etc/ca.pem"));
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_from_env_requires_backend_addrs() {
        // SAFETY: Tests are run serially due to #[serial], so no concurrent access
        unsafe {
            env::remove_var("PRODUCT_CATALOG_SERVICE_ADDR");
            env::remove_var("CURRENCY_SERVICE_ADDR");
            env::remove_var("CART_SERVICE_ADDR");
        }

        assert!(Config::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        // SAFETY: Tests are run serially due to #[serial], so no concurrent access
        unsafe {
            env::set_var("PRODUCT_CATALOG_SERVICE_ADDR", "catalog:3550");
            env::set_var("CURRENCY_SERVICE_ADDR", "currency:7000");
            env::set_var("CART_SERVICE_ADDR", "cart:7070");
            env::remove_var("RATE_LIMIT_BURST");
            env::remove_var("RATE_LIMIT_RPS");
            env::remove_var("DISABLE_RATE_LIMITING");
            env::remove_var("BACKEND_TLS_MODE");
            env::remove_var("LISTEN");
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.backend_tls_mode, TlsMode::Insecure);
        assert!(!config.rate_limit_disabled);
        assert_eq!(config.limiter_groups.len(), 2);
        assert_eq!(config.limiter_groups[0].name, DEFAULT_LIMITER_GROUP);
        assert_eq!(config.limiter_groups[0].burst, 20);
        assert_eq!(config.limiter_groups[1].name, EXPENSIVE_LIMITER_GROUP);
        assert_eq!(config.limiter_groups[1].burst, 10);
        assert_eq!(config.expensive_paths, vec!["/cart/checkout"]);

        // Cleanup
        unsafe {
            env::remove_var("PRODUCT_CATALOG_SERVICE_ADDR");
            env::remove_var("CURRENCY_SERVICE_ADDR");
            env::remove_var("CART_SERVICE_ADDR");
        }
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        // SAFETY: Tests are run serially due to #[serial], so no concurrent access
        unsafe {
            env::set_var("PRODUCT_CATALOG_SERVICE_ADDR", "catalog:3550");
            env::set_var("CURRENCY_SERVICE_ADDR", "currency:7000");
            env::set_var("CART_SERVICE_ADDR", "cart:7070");
            env::set_var("RATE_LIMIT_BURST", "5");
            env::set_var("RATE_LIMIT_RPS", "0.5");
            env::set_var("DISABLE_RATE_LIMITING", "true");
            env::set_var("BACKEND_TLS_MODE", "skip-verify");
            env::set_var("RATE_LIMIT_KEY_SOURCE", "ip");
            env::set_var("ALLOWED_ORIGINS", "https://a.example, https://b.example");
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.limiter_groups[0].burst, 5);
        assert_eq!(config.limiter_groups[0].rate_per_sec, 0.5);
        assert_eq!(config.limiter_groups[0].key_source, KeySource::ClientIp);
        assert!(config.rate_limit_disabled);
        assert_eq!(config.backend_tls_mode, TlsMode::SkipVerify);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );

        // Cleanup
        unsafe {
            env::remove_var("PRODUCT_CATALOG_SERVICE_ADDR");
            env::remove_var("CURRENCY_SERVICE_ADDR");
            env::remove_var("CART_SERVICE_ADDR");
            env::remove_var("RATE_LIMIT_BURST");
            env::remove_var("RATE_LIMIT_RPS");
            env::remove_var("DISABLE_RATE_LIMITING");
            env::remove_var("BACKEND_TLS_MODE");
            env::remove_var("RATE_LIMIT_KEY_SOURCE");
            env::remove_var("ALLOWED_ORIGINS");
        }
    }
}
