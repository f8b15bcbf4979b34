use super::traits::ConfigSection;
use crate::error::{EvolverError, Result};
use crate::functions::indicators::MAX_LOOKBACK;
use crate::types::{ScopeKey, Timeframe};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between re-evolution ticks
    pub interval_secs: u64,
    /// Candles requested per evolution run
    pub window_length: usize,
    /// Relative improvement a candidate needs over the incumbent champion
    pub promotion_margin: f64,
    pub instruments: Vec<String>,
    pub timeframes: Vec<Timeframe>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            window_length: 500,
            promotion_margin: 0.05,
            instruments: vec![
                "BTC/USDT".to_string(),
                "ETH/USDT".to_string(),
                "SOL/USDT".to_string(),
                "ADA/USDT".to_string(),
            ],
            timeframes: vec![
                Timeframe::M5,
                Timeframe::M15,
                Timeframe::H1,
                Timeframe::H4,
                Timeframe::D1,
            ],
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Every (instrument, timeframe) pair, in configuration order.
    pub fn scopes(&self) -> Vec<ScopeKey> {
        self.instruments
            .iter()
            .flat_map(|instrument| {
                self.timeframes
                    .iter()
                    .map(move |tf| ScopeKey::new(instrument.clone(), *tf))
            })
            .collect()
    }
}

impl ConfigSection for SchedulerConfig {
    fn section_name() -> &'static str {
        "scheduler"
    }

    fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(EvolverError::InvalidConfiguration(
                "Scheduler interval must be positive".to_string(),
            ));
        }
        if self.window_length < MAX_LOOKBACK {
            return Err(EvolverError::InvalidConfiguration(format!(
                "Window length {} is shorter than the largest indicator lookback {}",
                self.window_length, MAX_LOOKBACK
            )));
        }
        if !self.promotion_margin.is_finite() || self.promotion_margin < 0.0 {
            return Err(EvolverError::InvalidConfiguration(
                "Promotion margin must be a non-negative number".to_string(),
            ));
        }
        if self.instruments.is_empty() || self.timeframes.is_empty() {
            return Err(EvolverError::InvalidConfiguration(
                "At least one instrument and one timeframe are required".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes_cover_the_cross_product() {
        let config = SchedulerConfig {
            instruments: vec!["BTC/USDT".into(), "ETH/USDT".into()],
            timeframes: vec![Timeframe::H1, Timeframe::D1],
            ..Default::default()
        };
        let scopes = config.scopes();
        assert_eq!(scopes.len(), 4);
        assert_eq!(scopes[1], ScopeKey::new("BTC/USDT", Timeframe::D1));
    }

    #[test]
    fn test_short_windows_are_rejected() {
        let config = SchedulerConfig { window_length: 10, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
