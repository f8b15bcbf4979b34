use super::traits::ConfigSection;
use crate::error::{EvolverError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where candle windows come from. Resolved once, at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataConfig {
    /// One `<INSTRUMENT>_<timeframe>.csv` file per scope
    Csv { directory: PathBuf },
    /// Windows pushed in-process (replay, tests)
    Memory,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self::Csv {
            directory: PathBuf::from("data"),
        }
    }
}

impl ConfigSection for DataConfig {
    fn section_name() -> &'static str {
        "data"
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Csv { directory } if directory.as_os_str().is_empty() => Err(
                EvolverError::InvalidConfiguration("data.directory must not be empty".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

/// Where populations and champions are persisted, if anywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    Json { directory: PathBuf },
    Memory,
    None,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::None
    }
}

impl ConfigSection for StorageConfig {
    fn section_name() -> &'static str {
        "storage"
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Json { directory } if directory.as_os_str().is_empty() => Err(
                EvolverError::InvalidConfiguration("storage.directory must not be empty".to_string()),
            ),
            _ => Ok(()),
        }
    }
}
