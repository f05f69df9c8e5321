//! Application configuration
//!
//! Centralized configuration management using the `config` crate.
//! Values are layered: built-in defaults, `config/default`, `config/{RUN_MODE}`,
//! then `PRESSONE__SECTION__KEY` environment variables.

use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::fmt;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub ami: AmiConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub dialer: DialerConfig,
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

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Comma separated list of allowed CORS origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_timeout() -> u64 {
    30
}

fn default_cors_origins() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Apply pending migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

/// Authentication configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT signing secret
    pub jwt_secret: String,

    /// JWT token lifetime in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: i64,
}

fn default_jwt_expiration() -> i64 {
    3600
}

/// Asterisk Manager Interface configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AmiConfig {
    #[serde(default = "default_ami_host")]
    pub host: String,

    #[serde(default = "default_ami_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub secret: String,

    /// TCP connect + login timeout in seconds
    #[serde(default = "default_ami_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// How long to wait for an action response
    #[serde(default = "default_ami_action_timeout")]
    pub action_timeout_secs: u64,
}

fn default_ami_host() -> String {
    "127.0.0.1".to_string()
}

fn default_ami_port() -> u16 {
    5038
}

fn default_ami_connect_timeout() -> u64 {
    5
}

fn default_ami_action_timeout() -> u64 {
    10
}

impl Default for AmiConfig {
    fn default() -> Self {
        Self {
            host: default_ami_host(),
            port: default_ami_port(),
            username: String::new(),
            secret: String::new(),
            connect_timeout_secs: default_ami_connect_timeout(),
            action_timeout_secs: default_ami_action_timeout(),
        }
    }
}

/// Balance check applied before a call is originated.
///
/// Post-call debits are always applied, so the balance may still go
/// negative when a call costs more than what was left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrecallCheck {
    /// No check; costs are reconciled after the call
    #[default]
    Off,
    /// Balance must be strictly positive
    Positive,
    /// Balance must be at least `billing.min_call_balance`
    Minimum,
}

impl fmt::Display for PrecallCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrecallCheck::Off => write!(f, "off"),
            PrecallCheck::Positive => write!(f, "positive"),
            PrecallCheck::Minimum => write!(f, "minimum"),
        }
    }
}

/// Billing-specific configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BillingConfig {
    /// Price of one minute of talk time, in credits
    #[serde(default = "default_rate_per_minute")]
    pub rate_per_minute: Decimal,

    /// Shortest duration ever billed, in seconds
    #[serde(default = "default_six")]
    pub min_billable_seconds: i32,

    /// Billing bucket size, in seconds
    #[serde(default = "default_six")]
    pub billing_increment_seconds: i32,

    /// Pre-call balance policy
    #[serde(default)]
    pub precall_check: PrecallCheck,

    /// Threshold used by `PrecallCheck::Minimum`
    #[serde(default = "default_min_call_balance")]
    pub min_call_balance: Decimal,
}

fn default_rate_per_minute() -> Decimal {
    Decimal::ONE
}

fn default_six() -> i32 {
    6
}

fn default_min_call_balance() -> Decimal {
    Decimal::new(1, 1)
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            rate_per_minute: default_rate_per_minute(),
            min_billable_seconds: 6,
            billing_increment_seconds: 6,
            precall_check: PrecallCheck::Off,
            min_call_balance: default_min_call_balance(),
        }
    }
}

/// Campaign dialer configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DialerConfig {
    /// Start the campaign dispatcher and stale-call sweeper
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Dialplan context the answered call is sent to
    #[serde(default = "default_ivr_context")]
    pub ivr_context: String,

    /// Ring timeout handed to the switch, in milliseconds
    #[serde(default = "default_originate_timeout")]
    pub originate_timeout_ms: u64,

    /// Caller id used when neither the request nor the account has one
    #[serde(default)]
    pub default_caller_id: Option<String>,

    /// Hard ceiling on simultaneous calls per campaign
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: u32,

    /// Calls per second when a campaign does not set one
    #[serde(default = "default_cps")]
    pub default_cps: u32,

    /// Longest a call may live on the switch, sent as `TIMEOUT(absolute)`
    #[serde(default = "default_max_call_secs")]
    pub max_call_secs: u64,

    /// Grace for the hangup webhook after the longest possible call
    #[serde(default = "default_stale_call_secs")]
    pub stale_call_secs: i64,

    /// How often the stale-call sweeper runs
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Number of per-key lock shards used by the reconciler
    #[serde(default = "default_lock_shards")]
    pub lock_shards: usize,
}

fn default_ivr_context() -> String {
    "press-one-ivr".to_string()
}

fn default_originate_timeout() -> u64 {
    30_000
}

fn default_max_concurrent_calls() -> u32 {
    10
}

fn default_cps() -> u32 {
    5
}

fn default_max_call_secs() -> u64 {
    3600
}

fn default_stale_call_secs() -> i64 {
    300
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_lock_shards() -> usize {
    64
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ivr_context: default_ivr_context(),
            originate_timeout_ms: default_originate_timeout(),
            default_caller_id: None,
            max_concurrent_calls: default_max_concurrent_calls(),
            default_cps: default_cps(),
            max_call_secs: default_max_call_secs(),
            stale_call_secs: default_stale_call_secs(),
            sweep_interval_secs: default_sweep_interval(),
            lock_shards: default_lock_shards(),
        }
    }
}

impl DialerConfig {
    /// Age after which a call with no settlement can no longer be live
    ///
    /// The switch gives up ringing after `originate_timeout_ms` and hangs up
    /// an answered call after `max_call_secs`; only then does the grace for
    /// the hangup webhook start.
    pub fn stale_after_secs(&self) -> i64 {
        let ring = self.originate_timeout_ms.div_ceil(1000);
        let live = ring.saturating_add(self.max_call_secs);
        i64::try_from(live)
            .unwrap_or(i64::MAX)
            .saturating_add(self.stale_call_secs.max(1))
    }
}

impl AppConfig {
    /// Load configuration from environment and optional config files
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("server.timeout_secs", 30)?
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 2)?
            .set_default("auth.jwt_expiration_secs", 3600)?
            .set_default("ami.port", 5038)?
            .set_default("billing.rate_per_minute", "1.0")?
            .set_default("billing.min_billable_seconds", 6)?
            .set_default("billing.billing_increment_seconds", 6)?
            .set_default("billing.precall_check", "off")?
            .set_default("dialer.ivr_context", "press-one-ivr")?
            .set_default("dialer.originate_timeout_ms", 30_000)?
            .set_default("dialer.max_concurrent_calls", 10)?
            .set_default("dialer.default_cps", 5)?
            .set_default("dialer.max_call_secs", 3600)?
            // Load config files if they exist
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // PRESSONE__BILLING__RATE_PER_MINUTE=0.8
            .add_source(
                Environment::with_prefix("PRESSONE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("PRESSONE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_billing_config() {
        let config = BillingConfig::default();
        assert_eq!(config.rate_per_minute, Decimal::ONE);
        assert_eq!(config.min_billable_seconds, 6);
        assert_eq!(config.billing_increment_seconds, 6);
        assert_eq!(config.precall_check, PrecallCheck::Off);
    }

    #[test]
    fn test_default_dialer_config() {
        let config = DialerConfig::default();
        assert_eq!(config.ivr_context, "press-one-ivr");
        assert_eq!(config.originate_timeout_ms, 30_000);
        assert_eq!(config.default_cps, 5);
    }

    #[test]
    fn test_stale_threshold_outlives_any_call() {
        let config = DialerConfig::default();
        assert_eq!(config.stale_after_secs(), 30 + 3600 + 300);

        let config = DialerConfig {
            originate_timeout_ms: 45_500,
            max_call_secs: 600,
            stale_call_secs: 0,
            ..DialerConfig::default()
        };
        assert_eq!(config.stale_after_secs(), 46 + 600 + 1);
    }

    #[test]
    fn test_precall_check_parsing() {
        let check: PrecallCheck = serde_json::from_str("\"minimum\"").unwrap();
        assert_eq!(check, PrecallCheck::Minimum);
        assert_eq!(check.to_string(), "minimum");
    }
}
