use super::{
    evolution::EvolutionConfig,
    risk::RiskConfig,
    scheduler::SchedulerConfig,
    sources::{DataConfig, StorageConfig},
    traits::ConfigSection,
};
use crate::error::{EvolverError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix for environment overrides, e.g. `EVOLVER_EVOLUTION__POPULATION_SIZE=200`.
pub const ENV_PREFIX: &str = "EVOLVER";

/// Complete runtime configuration. Built once and handed by value to each
/// component; nothing reads configuration from global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub evolution: EvolutionConfig,
    pub risk: RiskConfig,
    pub scheduler: SchedulerConfig,
    pub data: DataConfig,
    pub storage: StorageConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            evolution: EvolutionConfig::default(),
            risk: RiskConfig::default(),
            scheduler: SchedulerConfig::default(),
            data: DataConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.evolution.validate()?;
        self.risk.validate()?;
        self.scheduler.validate()?;
        self.data.validate()?;
        self.storage.validate()?;
        Ok(())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            EvolverError::InvalidConfiguration(format!(
                "Failed to read config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Defaults, then the optional TOML file, then `EVOLVER_*` environment
    /// variables (`__` separates section and field).
    pub fn load_layered(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| EvolverError::InvalidConfiguration(format!("Failed to serialize: {}", e)))?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }
}
