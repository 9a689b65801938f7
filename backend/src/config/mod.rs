use serde::{Deserialize, Deserializer};
use std::sync::{Mutex, OnceLock};
use thiserror::Error;

pub mod scan_config;
pub mod store;

pub use scan_config::{
    normalize_modules, ScanConfig, ScanConfigPatch, VulnerabilityDefinition, VulnerabilityLibrary,
    VulnerabilityRulePatch,
};
pub use store::{ConfigManager, SharedScanConfig};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<ConfigError> for crate::error::ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Config(e) => crate::error::ApiError::Config(e),
            ConfigError::Validation(msg) => crate::error::ApiError::Configuration(msg),
        }
    }
}

/// Custom deserializer for comma-separated strings
fn deserialize_comma_separated<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        Ok(Vec::new())
    } else {
        Ok(s.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }
}

/// Process settings with environment variable support.
///
/// These are bootstrap values only. The scan configuration edited from the
/// dashboard lives in [`ScanConfig`] and is persisted by the state store.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    // Storage
    pub database_url: String,

    // Server
    pub bind_address: String,
    #[serde(deserialize_with = "deserialize_comma_separated")]
    pub cors_allow_origins: Vec<String>,

    // Logging
    pub log_level: String,
    pub log_format: String,

    // Scan simulation
    pub scan_start_delay_ms: u64,
    pub progress_tick_ms: u64,
    pub max_progress_step: f64,
    pub seed_demo_data: bool,

    // Lifecycle
    pub shutdown_grace_ms: u64,
}

impl Settings {
    /// Create new settings instance from environment variables and .env file
    pub fn new() -> Result<Self, ConfigError> {
        Self::new_with_env_file(true)
    }

    /// Create new settings instance with optional .env file loading
    pub fn new_with_env_file(load_env_file: bool) -> Result<Self, ConfigError> {
        // Tests mutate the process env; serialize construction so reads are consistent
        static SETTINGS_BUILD_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        let build_mutex = SETTINGS_BUILD_MUTEX.get_or_init(|| Mutex::new(()));
        let _guard = build_mutex
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        #[cfg(not(test))]
        {
            if load_env_file {
                dotenvy::dotenv().ok();
            }
        }

        let mut builder = config::Config::builder()
            .set_default("database_url", "sqlite://data/scan_orchestrator.db?mode=rwc")?
            .set_default("bind_address", "0.0.0.0:8000")?
            .set_default("cors_allow_origins", "http://localhost:3000,http://127.0.0.1:3000")?
            .set_default("log_level", "INFO")?
            .set_default("log_format", "json")?
            .set_default("scan_start_delay_ms", 500u64)?
            .set_default("progress_tick_ms", 1000u64)?
            .set_default("max_progress_step", 15.0)?
            .set_default("seed_demo_data", true)?
            .set_default("shutdown_grace_ms", 1000u64)?;

        fn read_env(key: &str) -> Option<String> {
            std::env::var(key).ok()
        }

        fn parse_bool_env(key: &str) -> Option<bool> {
            read_env(key).and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            })
        }

        // String overrides
        if let Some(v) = read_env("DATABASE_URL") {
            builder = builder.set_override("database_url", v)?;
        }
        if let Some(v) = read_env("BIND_ADDRESS") {
            builder = builder.set_override("bind_address", v)?;
        }
        if let Some(v) = read_env("CORS_ALLOW_ORIGINS") {
            builder = builder.set_override("cors_allow_origins", v)?;
        }
        if let Some(v) = read_env("LOG_LEVEL") {
            builder = builder.set_override("log_level", v)?;
        }
        if let Some(v) = read_env("LOG_FORMAT") {
            builder = builder.set_override("log_format", v)?;
        }

        // Numeric overrides
        if let Some(v) = read_env("SCAN_START_DELAY_MS").and_then(|s| s.parse::<u64>().ok()) {
            builder = builder.set_override("scan_start_delay_ms", v)?;
        }
        if let Some(v) = read_env("PROGRESS_TICK_MS").and_then(|s| s.parse::<u64>().ok()) {
            builder = builder.set_override("progress_tick_ms", v)?;
        }
        if let Some(v) = read_env("MAX_PROGRESS_STEP").and_then(|s| s.parse::<f64>().ok()) {
            builder = builder.set_override("max_progress_step", v)?;
        }
        if let Some(v) = read_env("SHUTDOWN_GRACE_MS").and_then(|s| s.parse::<u64>().ok()) {
            builder = builder.set_override("shutdown_grace_ms", v)?;
        }

        // Boolean overrides
        if let Some(v) = parse_bool_env("SEED_DEMO_DATA") {
            builder = builder.set_override("seed_demo_data", v)?;
        }

        let settings = builder.build()?;
        let config: Settings = settings.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.log_format.as_str(), "json" | "plain") {
            return Err(ConfigError::Validation(
                "log_format must be 'json' or 'plain'".to_string(),
            ));
        }

        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "database_url must not be empty".to_string(),
            ));
        }

        if self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "bind_address '{}' is not a valid socket address",
                self.bind_address
            )));
        }

        if self.progress_tick_ms == 0 {
            return Err(ConfigError::Validation(
                "progress_tick_ms must be greater than 0".to_string(),
            ));
        }

        if !(self.max_progress_step > 0.0 && self.max_progress_step <= 100.0) {
            return Err(ConfigError::Validation(
                "max_progress_step must be in (0, 100]".to_string(),
            ));
        }

        Ok(())
    }

    /// Settings for tests: in-memory storage and no demo data.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            cors_allow_origins: vec!["*".to_string()],
            log_level: "ERROR".to_string(),
            log_format: "plain".to_string(),
            scan_start_delay_ms: 500,
            progress_tick_ms: 1000,
            max_progress_step: 15.0,
            seed_demo_data: false,
            shutdown_grace_ms: 0,
        }
    }
}
