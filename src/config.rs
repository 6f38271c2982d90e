use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_CONTRACT_VALIDITY_DAYS: i64 = 365;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_MIN_CONNECTIONS: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "Database URL must not be empty"))]
    pub database_url: String,

    /// Deployment environment name (development, test, production)
    #[serde(default = "default_env")]
    pub environment: String,

    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable lines
    #[serde(default)]
    pub log_json: bool,

    /// Maximum number of database connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Minimum number of database connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Create the schema from the entity definitions on startup.
    /// Intended for SQLite deployments and tests; production schemas are
    /// managed externally.
    #[serde(default)]
    pub auto_create_schema: bool,

    /// Validity window applied to signed contracts, in days.
    /// Expiry is a read-time projection derived from this window; it is
    /// never written back to the contract row.
    #[validate(range(min = 1, message = "Contract validity window must be at least one day"))]
    #[serde(default = "default_contract_validity_days")]
    pub contract_validity_days: i64,
}

fn default_env() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    DEFAULT_DB_MAX_CONNECTIONS
}

fn default_db_min_connections() -> u32 {
    DEFAULT_DB_MIN_CONNECTIONS
}

fn default_contract_validity_days() -> i64 {
    DEFAULT_CONTRACT_VALIDITY_DAYS
}

impl AppConfig {
    /// Builds a configuration programmatically, applying the same defaults
    /// as the file loader. Primarily used by tests and embedded callers.
    pub fn new(database_url: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            environment: environment.into(),
            log_level: default_log_level(),
            log_json: false,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            db_min_connections: DEFAULT_DB_MIN_CONNECTIONS,
            auto_create_schema: false,
            contract_validity_days: DEFAULT_CONTRACT_VALIDITY_DAYS,
        }
    }

    /// Loads configuration from layered sources: `config/default.toml`,
    /// then `config/{environment}.toml`, then `MEDEQUIP_*` environment
    /// variables. Later sources override earlier ones.
    pub fn load() -> Result<Self, ConfigurationError> {
        let environment =
            std::env::var("MEDEQUIP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let settings = Config::builder()
            .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
            .add_source(
                File::with_name(&format!("{}/{}", CONFIG_DIR, environment)).required(false),
            )
            .add_source(Environment::with_prefix("MEDEQUIP"))
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;

        info!(
            environment = %config.environment,
            log_level = %config.log_level,
            "configuration loaded"
        );

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn programmatic_config_has_sane_defaults() {
        let cfg = AppConfig::new("sqlite::memory:", "test");
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.contract_validity_days, 365);
        assert_eq!(cfg.db_max_connections, 10);
        assert!(!cfg.auto_create_schema);
    }

    #[test]
    fn empty_database_url_is_rejected() {
        let cfg = AppConfig::new("", "test");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_validity_window_is_rejected() {
        let mut cfg = AppConfig::new("sqlite::memory:", "test");
        cfg.contract_validity_days = 0;
        assert!(cfg.validate().is_err());
    }
}
