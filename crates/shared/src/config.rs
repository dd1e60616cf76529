//! Application configuration management.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration. When absent the engine runs on in-memory storage.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    /// Approval policy configuration.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Role hierarchy and the static actor directory.
    #[serde(default)]
    pub roles: RolesConfig,
    /// Batch job registration and timers.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// External ledger gateway used to apply approved monetary requests.
    #[serde(default)]
    pub ledger: Option<LedgerConfig>,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Approval policy configuration.
///
/// Role names and currency codes are case-insensitive; they are normalized
/// when the policy resolver is built.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Role that must approve activation (and live edits) per entity type
    /// (`product`, `fee`, `rule`, `gl_mapping`).
    #[serde(default = "default_activation_roles")]
    pub activation_roles: HashMap<String, String>,
    /// Role required when no configured limit covers an amount.
    #[serde(default = "default_escalation_role")]
    pub escalation_role: String,
    /// Withdrawal amounts above these thresholds (per currency) need approval.
    #[serde(default)]
    pub withdrawal_thresholds: HashMap<String, Decimal>,
    /// Transfer amounts above these thresholds (per currency) need approval.
    #[serde(default)]
    pub transfer_thresholds: HashMap<String, Decimal>,
    /// Currency the role limits are expressed in.
    #[serde(default = "default_limits_currency")]
    pub limits_currency: String,
    /// Approval limit per role.
    #[serde(default)]
    pub role_limits: HashMap<String, Decimal>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            activation_roles: default_activation_roles(),
            escalation_role: default_escalation_role(),
            withdrawal_thresholds: HashMap::new(),
            transfer_thresholds: HashMap::new(),
            limits_currency: default_limits_currency(),
            role_limits: HashMap::new(),
        }
    }
}

fn default_activation_roles() -> HashMap<String, String> {
    [
        ("product", "PRODUCT_MANAGER"),
        ("fee", "FINANCE_MANAGER"),
        ("rule", "RISK_MANAGER"),
        ("gl_mapping", "CHIEF_ACCOUNTANT"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_escalation_role() -> String {
    "ADMIN".to_string()
}

fn default_limits_currency() -> String {
    "USD".to_string()
}

/// Role hierarchy and actor directory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RolesConfig {
    /// Roles each role subsumes (transitively).
    #[serde(default)]
    pub hierarchy: HashMap<String, Vec<String>>,
    /// Static actor id to role assignments.
    #[serde(default)]
    pub actors: HashMap<String, String>,
}

/// Batch scheduler configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulerConfig {
    /// Jobs to register at startup.
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

/// A single batch job registration.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Job name as shown in the batch monitor (e.g. "Daily Accrual").
    pub name: String,
    /// Timer interval in seconds; manual-only when absent.
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

/// Ledger gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Base URL of the posting service.
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_ledger_timeout")]
    pub timeout_secs: u64,
}

fn default_ledger_timeout() -> u64 {
    10
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("VAULTLINE").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(src: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(src, config::FileFormat::Toml))
            .build()
            .and_then(config::Config::try_deserialize)
            .expect("valid config")
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = from_toml("[server]\n");
        assert_eq!(cfg.server.port, 8080);
        assert!(cfg.database.is_none());
        assert!(cfg.ledger.is_none());
        assert_eq!(cfg.policy.escalation_role, "ADMIN");
        assert_eq!(
            cfg.policy.activation_roles.get("fee").map(String::as_str),
            Some("FINANCE_MANAGER")
        );
        assert!(cfg.scheduler.jobs.is_empty());
    }

    #[test]
    fn test_policy_and_jobs_parse() {
        let cfg = from_toml(
            r#"
[server]
port = 9090

[policy]
escalation_role = "BOARD"
limits_currency = "USD"

[policy.withdrawal_thresholds]
usd = "10000"

[policy.role_limits]
supervisor = "50000"
cfo = "1000000"

[[scheduler.jobs]]
name = "Daily Accrual"
interval_secs = 86400

[[scheduler.jobs]]
name = "Fee Sweeper"
"#,
        );

        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.policy.escalation_role, "BOARD");
        assert_eq!(cfg.policy.role_limits.len(), 2);
        assert_eq!(
            cfg.policy.withdrawal_thresholds.values().next().copied(),
            Some(Decimal::from(10_000))
        );
        assert_eq!(cfg.scheduler.jobs.len(), 2);
        assert_eq!(cfg.scheduler.jobs[0].interval_secs, Some(86_400));
        assert_eq!(cfg.scheduler.jobs[1].interval_secs, None);
    }
}
