use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvolverError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid genome: {0}")]
    InvalidGenome(String),

    #[error("Insufficient data: {required} candles required, {available} available")]
    InsufficientData { required: usize, available: usize },

    #[error("Risk violation: {0}")]
    RiskViolation(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Data error: {0}")]
    DataLoading(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, EvolverError>;
