use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub rate_limit: RateLimitConfig,
    pub billing: BillingConfig,
    pub security: SecurityConfig,
}

/// Database connection pool configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests admitted per window for keys that were never configured
    pub request_limit: i32,
    /// Window length in milliseconds for keys that were never configured
    pub reset_interval_ms: i64,
    /// How often the alarm worker looks for due wake-ups
    pub alarm_poll_interval: Duration,
}

/// Per-request billing policy applied by the public sponsor endpoint
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Cents charged per request, 0 disables charging
    pub charge_per_request_cents: i64,
    /// When false, a request is not charged if it would overdraw the balance
    pub allow_negative_balance: bool,
}

/// Security configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Bearer key for the internal ledger and rate limiter routes.
    /// When unset those routes reject every call.
    pub admin_api_key: Option<String>,
}

pub const DEFAULT_REQUEST_LIMIT: i32 = 25;
pub const DEFAULT_RESET_INTERVAL_MS: i64 = 3_600_000;

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            database: DatabaseConfig::from_env()?,
            rate_limit: RateLimitConfig::from_env(),
            billing: BillingConfig::from_env(),
            security: SecurityConfig::from_env(),
        })
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            request_limit: DEFAULT_REQUEST_LIMIT,
            reset_interval_ms: DEFAULT_RESET_INTERVAL_MS,
            alarm_poll_interval: Duration::from_millis(1000),
        }
    }
}

impl RateLimitConfig {
    /// Load rate limit configuration from environment variables
    pub fn from_env() -> Self {
        let request_limit = env::var("RATE_LIMIT_REQUESTS")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_REQUEST_LIMIT);

        let reset_interval_ms = env::var("RATE_LIMIT_RESET_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_RESET_INTERVAL_MS);

        Self {
            request_limit,
            reset_interval_ms,
            alarm_poll_interval: Duration::from_millis(
                env::var("RATE_LIMIT_ALARM_POLL_MS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .filter(|v| *v > 0)
                    .unwrap_or(1000),
            ),
        }
    }
}

impl BillingConfig {
    /// Load billing configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            charge_per_request_cents: env::var("CHARGE_PER_REQUEST_CENTS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v >= 0)
                .unwrap_or(0),
            allow_negative_balance: env::var("ALLOW_NEGATIVE_BALANCE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

impl SecurityConfig {
    /// Load security configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            admin_api_key: env::var("ADMIN_API_KEY").ok().filter(|k| !k.is_empty()),
        }
    }
}

impl DatabaseConfig {
    /// Load database configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        Ok(Self {
            url,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .unwrap_or(1),
            acquire_timeout: Duration::from_secs(
                env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            ),
            idle_timeout: Duration::from_secs(
                env::var("DATABASE_IDLE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()
                    .unwrap_or(600),
            ),
            max_lifetime: Duration::from_secs(
                env::var("DATABASE_MAX_LIFETIME_SECS")
                    .unwrap_or_else(|_| "1800".to_string())
                    .parse()
                    .unwrap_or(1800),
            ),
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    MissingDatabaseUrl,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "PORT must be a valid number"),
            ConfigError::MissingDatabaseUrl => {
                write!(f, "DATABASE_URL environment variable is required")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
