//! Application configuration. By default, the config is created with opinionated default values,
//! which can then be overwritten by environment variables prefixed with `SERVICE_LOCATOR_` or the
//! `service_locator.json` file.

use config::{Config, ConfigError, Environment, File};
use derive_more::Constructor;
use serde::Deserialize;
use service_locator::locator::LocatorMode;
use std::path::PathBuf;

const CONFIG_ENV_PREFIX: &str = "SERVICE_LOCATOR";

/// Name of the default config file.
pub const CONFIG_FILE: &str = "service_locator.json";

/// Configuration of an [Application](crate::application::Application).
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq, Constructor)]
pub struct LocatorConfig {
    /// Mode of the created [ServiceLocator](service_locator::locator::ServiceLocator).
    pub mode: LocatorMode,
    /// Path to an offline dependency cache, merged into the contract catalog at startup.
    pub dependency_cache: Option<PathBuf>,
    /// Should a default tracing logger be installed when building the application.
    pub install_tracing_logger: bool,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            mode: LocatorMode::Production,
            dependency_cache: None,
            install_tracing_logger: true,
        }
    }
}

impl From<OptionalLocatorConfig> for LocatorConfig {
    fn from(value: OptionalLocatorConfig) -> Self {
        let default = Self::default();
        Self {
            mode: value.mode.unwrap_or(default.mode),
            dependency_cache: value.dependency_cache.or(default.dependency_cache),
            install_tracing_logger: value
                .install_tracing_logger
                .unwrap_or(default.install_tracing_logger),
        }
    }
}

impl LocatorConfig {
    /// Loads the config from the default file and environment variables.
    pub fn init_from_environment() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(CONFIG_ENV_PREFIX))
            .build()
            .and_then(Self::from_config)
    }

    fn from_config(config: Config) -> Result<Self, ConfigError> {
        config
            .try_deserialize::<OptionalLocatorConfig>()
            .map(|config| config.into())
    }
}

#[derive(Deserialize)]
struct OptionalLocatorConfig {
    mode: Option<LocatorMode>,
    dependency_cache: Option<PathBuf>,
    install_tracing_logger: Option<bool>,
}
