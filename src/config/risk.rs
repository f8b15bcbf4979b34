use super::traits::{unit_fraction, ConfigSection};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Risk envelope applied to simulated trades and to champion promotion.
/// Read-only for the duration of an evolution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Largest fraction of equity committed to one position
    pub max_position_size: f64,
    /// Largest tolerated peak-to-trough equity decline
    pub max_drawdown: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_size: 0.1,
            max_drawdown: 0.2,
            stop_loss_pct: 0.02,
            take_profit_pct: 0.04,
        }
    }
}

impl ConfigSection for RiskConfig {
    fn section_name() -> &'static str {
        "risk"
    }

    fn validate(&self) -> Result<()> {
        let section = Self::section_name();
        unit_fraction(section, "max_position_size", self.max_position_size)?;
        unit_fraction(section, "max_drawdown", self.max_drawdown)?;
        unit_fraction(section, "stop_loss_pct", self.stop_loss_pct)?;
        unit_fraction(section, "take_profit_pct", self.take_profit_pct)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fractions_must_be_in_unit_interval() {
        RiskConfig::default().validate().unwrap();
        assert!(RiskConfig { max_drawdown: 0.0, ..Default::default() }.validate().is_err());
        assert!(RiskConfig { stop_loss_pct: 1.5, ..Default::default() }.validate().is_err());
        assert!(RiskConfig { take_profit_pct: f64::NAN, ..Default::default() }.validate().is_err());
        assert!(RiskConfig { max_position_size: 1.0, ..Default::default() }.validate().is_ok());
    }
}
