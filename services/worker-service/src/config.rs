//! Configuration for the worker service.

use std::path::PathBuf;

use courier::CourierConfig;
use figment::providers::Env;
use figment::Figment;
use serde::Deserialize;

/// Process-level settings read before the shared configuration.
#[derive(Debug, Default, Deserialize)]
pub struct WorkerServiceConfig {
    /// Extra TOML file merged over `config/default.toml` and `config/local.toml`.
    #[serde(default)]
    pub config_file: Option<PathBuf>,
}

impl WorkerServiceConfig {
    /// Read `WORKER_SERVICE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if a variable cannot be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        let config: Self = Figment::new()
            .merge(Env::prefixed("WORKER_SERVICE_"))
            .extract()?;
        Ok(config)
    }

    /// Load the shared courier configuration, including the extra file if set.
    ///
    /// # Errors
    ///
    /// Returns error if configuration cannot be loaded or is invalid.
    pub fn load(&self) -> anyhow::Result<CourierConfig> {
        Ok(CourierConfig::load_with(self.config_file.as_deref())?)
    }
}
