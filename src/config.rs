use std::collections::HashSet;
use std::env;
use std::str::FromStr;

use crate::models::Environment;

/// Default path on the customer's deployment that answers the ownership handshake.
pub const DEFAULT_HANDSHAKE_PATH: &str = "/wp-json/license/v1/handshake";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub dev_mode: bool,
    pub authority: AuthorityConfig,
    pub policy: LicensePolicy,
    pub handshake: HandshakeConfig,
    /// Honor X-Forwarded-For / X-Real-IP (only behind a trusted reverse proxy)
    pub trust_proxy_headers: bool,
    /// Refuse activations while keeping status queries available
    pub maintenance_mode: bool,
    pub rate_limit: RateLimitConfig,
}

/// Purchase authority connection settings.
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    pub base_url: String,
    pub token: String,
    pub timeout_secs: u64,
    /// How long a cached purchase record is trusted (None = forever)
    pub cache_ttl_days: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    pub enabled: bool,
    pub path: String,
    pub timeout_secs: u64,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: DEFAULT_HANDSHAKE_PATH.to_string(),
            timeout_secs: 12,
        }
    }
}

/// Requests per minute per client IP. 0 disables the limiter for that tier.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Activation endpoints (purchase authority + handshake calls)
    pub standard_rpm: u32,
    /// Status and health endpoints
    pub relaxed_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            standard_rpm: 30,
            relaxed_rpm: 120,
        }
    }
}

/// Acceptance policy layered on top of purchase authentication.
#[derive(Debug, Clone, Default)]
pub struct LicensePolicy {
    /// Product ids this server issues licenses for. Empty accepts nothing.
    pub allowed_product_ids: HashSet<String>,
    /// Codes that are registered but never limited by slots
    pub trusted_codes: HashSet<String>,
    /// Codes that are always refused
    pub blocked_codes: HashSet<String>,
    /// Active domains per purchase code in production (None = unlimited)
    pub production_slots: Option<u32>,
    /// Active domains per purchase code in development (None = unlimited)
    pub development_slots: Option<u32>,
}

impl LicensePolicy {
    pub fn is_product_allowed(&self, product_id: &str) -> bool {
        self.allowed_product_ids.contains(product_id)
    }

    pub fn is_trusted(&self, purchase_code: &str) -> bool {
        self.trusted_codes.contains(purchase_code)
    }

    pub fn is_blocked(&self, purchase_code: &str) -> bool {
        self.blocked_codes.contains(purchase_code)
    }

    /// Slot limit for a code in a tier. Trusted codes are unlimited.
    pub fn slot_limit(&self, purchase_code: &str, environment: Environment) -> Option<u32> {
        if self.is_trusted(purchase_code) {
            return None;
        }
        match environment {
            Environment::Production => self.production_slots,
            Environment::Development => self.development_slots,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("SLOTGUARD_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env_parse("PORT", 3000);

        let cache_ttl_days: i64 = env_parse("PURCHASE_CACHE_TTL_DAYS", 0);

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "slotguard.db".to_string()),
            dev_mode,
            authority: AuthorityConfig {
                base_url: env::var("AUTHORITY_BASE_URL")
                    .unwrap_or_else(|_| "https://api.envato.com".to_string()),
                token: env::var("AUTHORITY_TOKEN").unwrap_or_default(),
                timeout_secs: env_parse("AUTHORITY_TIMEOUT_SECS", 10),
                cache_ttl_days: (cache_ttl_days > 0).then_some(cache_ttl_days),
            },
            policy: LicensePolicy {
                allowed_product_ids: env_list("ALLOWED_PRODUCT_IDS"),
                trusted_codes: env_list("TRUSTED_PURCHASE_CODES"),
                blocked_codes: env_list("BLOCKED_PURCHASE_CODES"),
                production_slots: slot_limit(env_parse("SLOTS_PRODUCTION", 1)),
                development_slots: slot_limit(env_parse("SLOTS_DEVELOPMENT", 1)),
            },
            handshake: HandshakeConfig {
                enabled: env_flag("HANDSHAKE_ENABLED", true),
                path: env::var("HANDSHAKE_PATH")
                    .unwrap_or_else(|_| DEFAULT_HANDSHAKE_PATH.to_string()),
                timeout_secs: env_parse("HANDSHAKE_TIMEOUT_SECS", 12),
            },
            trust_proxy_headers: env_flag("TRUST_PROXY_HEADERS", false),
            maintenance_mode: env_flag("MAINTENANCE_MODE", false),
            rate_limit: RateLimitConfig {
                standard_rpm: env_parse("RATE_LIMIT_STANDARD_RPM", 30),
                relaxed_rpm: env_parse("RATE_LIMIT_RELAXED_RPM", 120),
            },
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 0 means unlimited.
fn slot_limit(value: u32) -> Option<u32> {
    (value > 0).then_some(value)
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| parse_flag(&v).unwrap_or(default))
        .unwrap_or(default)
}

/// Parse the boolean spellings accepted in env vars and request parameters.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn env_list(name: &str) -> HashSet<String> {
    env::var(name)
        .map(|v| parse_list(&v))
        .unwrap_or_default()
}

fn parse_list(value: &str) -> HashSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
