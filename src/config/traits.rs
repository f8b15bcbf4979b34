use crate::error::Result;
use serde::{de::DeserializeOwned, Serialize};

/// Trait for configuration sections
pub trait ConfigSection: Serialize + DeserializeOwned + Default + Clone {
    fn section_name() -> &'static str;
    fn validate(&self) -> Result<()>;
}

/// Shared check for options expressed as fractions in `(0, 1]`.
pub(crate) fn unit_fraction(section: &str, field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(crate::error::EvolverError::InvalidConfiguration(format!(
            "{}.{} must be in (0, 1], got {}",
            section, field, value
        )))
    }
}

/// Shared check for probabilities in `[0, 1]`.
pub(crate) fn probability(section: &str, field: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(crate::error::EvolverError::InvalidConfiguration(format!(
            "{}.{} must be between 0 and 1, got {}",
            section, field, value
        )))
    }
}
