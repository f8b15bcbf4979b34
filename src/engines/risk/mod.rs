//! Risk envelope applied in two places: inside the simulator (position
//! clipping, stops, drawdown halt, score penalty) and at champion promotion.

use crate::config::{ConfigSection, RiskConfig};
use crate::engines::evaluation::FitnessRecord;
use crate::error::{EvolverError, Result};
use crate::types::{Candle, ExitReason};

/// Score assigned to a genome whose drawdown exceeds the limit, before the
/// excess is subtracted.
pub const PENALTY_SCORE: f64 = -1.0e6;

/// Read-only view of the configured risk constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskFilter {
    constraints: RiskConfig,
}

impl RiskFilter {
    pub fn new(constraints: RiskConfig) -> Result<Self> {
        constraints.validate()?;
        Ok(Self { constraints })
    }

    pub fn constraints(&self) -> &RiskConfig {
        &self.constraints
    }

    /// Clamp a requested equity fraction into `[0, max_position_size]`.
    pub fn clip_position(&self, requested: f64) -> f64 {
        if !requested.is_finite() {
            return 0.0;
        }
        requested.clamp(0.0, self.constraints.max_position_size)
    }

    /// Stop-loss and take-profit prices for a long entry.
    pub fn stop_levels(&self, entry_price: f64) -> (f64, f64) {
        (
            entry_price * (1.0 - self.constraints.stop_loss_pct),
            entry_price * (1.0 + self.constraints.take_profit_pct),
        )
    }

    /// Check a long position's stops against one candle.
    ///
    /// Stop-loss wins when both levels are inside the bar's range. A bar that
    /// opens beyond a level fills at the open.
    pub fn check_stops(&self, stop_loss: f64, take_profit: f64, candle: &Candle) -> Option<(ExitReason, f64)> {
        if candle.low <= stop_loss {
            return Some((ExitReason::StopLoss, candle.open.min(stop_loss)));
        }
        if candle.high >= take_profit {
            return Some((ExitReason::TakeProfit, candle.open.max(take_profit)));
        }
        None
    }

    /// Mark-to-market drawdown at which trading stops for the window.
    pub fn halts_trading(&self, drawdown: f64) -> bool {
        drawdown >= self.constraints.max_drawdown
    }

    pub fn exceeds_drawdown(&self, drawdown: f64) -> bool {
        drawdown > self.constraints.max_drawdown
    }

    /// Floor the score of a genome that breached the drawdown limit.
    pub fn penalize(&self, score: f64, drawdown: f64) -> f64 {
        if self.exceeds_drawdown(drawdown) {
            PENALTY_SCORE - (drawdown - self.constraints.max_drawdown)
        } else {
            score
        }
    }

    /// Promotion gate: reject a candidate whose simulated drawdown is over
    /// the limit.
    pub fn check_promotion(&self, record: &FitnessRecord) -> Result<()> {
        if self.exceeds_drawdown(record.max_drawdown) {
            return Err(EvolverError::RiskViolation(format!(
                "drawdown {:.4} exceeds max_drawdown {:.4}",
                record.max_drawdown, self.constraints.max_drawdown
            )));
        }
        Ok(())
    }
}

impl Default for RiskFilter {
    fn default() -> Self {
        Self {
            constraints: RiskConfig::default(),
        }
    }
}
