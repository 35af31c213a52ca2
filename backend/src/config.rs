//! Configuration management for the nursery IPM server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with IPM__ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT verification configuration
    pub jwt: JwtConfig,

    /// IPM scheduling and completion rules
    #[serde(default)]
    pub ipm: IpmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret used to verify access tokens issued by the auth provider
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IpmConfig {
    /// Most task ids accepted by one completion request
    pub max_tasks_per_completion: usize,

    /// Days between spot-treatment applications when none is recorded
    pub default_application_interval_days: i32,

    /// Push completions to the weekly summary tasks
    pub summary_sync_enabled: bool,
}

impl Default for IpmConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_completion: shared::MAX_TASKS_PER_COMPLETION,
            default_application_interval_days:
                shared::planning::DEFAULT_APPLICATION_INTERVAL_DAYS,
            summary_sync_enabled: true,
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("IPM_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default(
                "ipm.max_tasks_per_completion",
                shared::MAX_TASKS_PER_COMPLETION as i64,
            )?
            .set_default(
                "ipm.default_application_interval_days",
                shared::planning::DEFAULT_APPLICATION_INTERVAL_DAYS as i64,
            )?
            .set_default("ipm.summary_sync_enabled", true)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (IPM__ prefix)
            .add_source(
                Environment::with_prefix("IPM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
