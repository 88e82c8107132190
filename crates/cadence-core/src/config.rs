use anyhow::Result;
use config::{Config, ConfigBuilder, builder::DefaultState};
use serde::Deserialize;

use crate::error::{CoreError, CoreResult};

/// Name of the optional TOML configuration file, resolved from the working directory.
pub const CONFIG_FILE_NAME: &str = "cadence";

/// Prefix for environment variable overrides, e.g. `CADENCE_EXPANSION__MAX_INSTANCES`.
pub const ENV_PREFIX: &str = "CADENCE";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub expansion: ExpansionConfig,
    pub logging: LoggingConfig,
}

/// How an exception entry is paired with a generated occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionMatchMode {
    /// Same year/month/day as the occurrence's original start.
    CalendarDate,
    /// Same instant as the occurrence's original start.
    Instant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpansionConfig {
    /// Upper bound on instances materialized for a single event and window.
    pub max_instances: u16,
    pub exception_match: ExceptionMatchMode,
}

impl ExpansionConfig {
    /// ## Summary
    /// Checks the values that deserialization alone cannot reject.
    ///
    /// ## Errors
    /// Returns `CoreError::ConfigError` if `max_instances` is zero.
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_instances == 0 {
            return Err(CoreError::ConfigError(
                "expansion.max_instances must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    /// ## Summary
    /// Loads configuration from environment variables and `cadence.toml` into a `Settings`.
    /// Environment variables take precedence over file values.
    ///
    /// ## Errors
    /// Returns an error if building the configuration, deserializing or validating it fails.
    pub fn load() -> Result<Self> {
        let settings = Self::builder()?
            .add_source(config::File::with_name(CONFIG_FILE_NAME).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()?;

        settings.expansion.validate()?;
        Ok(settings)
    }

    /// ## Summary
    /// Returns a builder pre-populated with every default value.
    ///
    /// ## Errors
    /// Returns an error if a default cannot be registered.
    pub fn builder() -> Result<ConfigBuilder<DefaultState>> {
        Ok(Config::builder()
            .set_default("expansion.max_instances", 10_000)?
            .set_default("expansion.exception_match", "calendar_date")?
            .set_default("logging.level", "info")?)
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    if let Err(err) = dotenvy::dotenv() {
        tracing::trace!(error = %err, "No .env file loaded");
    }

    Settings::load()
}
