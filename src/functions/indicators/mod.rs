pub mod momentum;
pub mod trend;
pub mod volume;

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::error::{EvolverError, Result};
use crate::types::Candle;

/// Largest period any indicator may use.
pub const MAX_PERIOD: usize = 50;

/// Most candles any gene can require before producing a value.
pub const MAX_LOOKBACK: usize = MAX_PERIOD;

const SMA_PERIOD: RangeInclusive<usize> = 2..=MAX_PERIOD;
const EMA_PERIOD: RangeInclusive<usize> = 2..=MAX_PERIOD;
const SPREAD_FAST: RangeInclusive<usize> = 2..=20;
const SPREAD_SLOW: RangeInclusive<usize> = 10..=MAX_PERIOD;
const RSI_PERIOD: RangeInclusive<usize> = 2..=30;
const ROC_PERIOD: RangeInclusive<usize> = 1..=30;
const BOLLINGER_PERIOD: RangeInclusive<usize> = 5..=40;
const BOLLINGER_WIDTH: RangeInclusive<f64> = 1.0..=3.0;
const VOLUME_PERIOD: RangeInclusive<usize> = 2..=40;

/// Indicator kind plus its parameters.
///
/// Every variant maps a candle window to a series of values on a known scale,
/// so thresholds can be sampled from a fixed range per kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Indicator {
    PriceToSma { period: usize },
    PriceToEma { period: usize },
    MaSpread { fast: usize, slow: usize },
    Rsi { period: usize },
    RateOfChange { period: usize },
    BollingerPosition { period: usize, width: f64 },
    VolumeRatio { period: usize },
}

impl Indicator {
    pub const KIND_COUNT: usize = 7;

    pub fn name(&self) -> &'static str {
        match self {
            Self::PriceToSma { .. } => "price_to_sma",
            Self::PriceToEma { .. } => "price_to_ema",
            Self::MaSpread { .. } => "ma_spread",
            Self::Rsi { .. } => "rsi",
            Self::RateOfChange { .. } => "rate_of_change",
            Self::BollingerPosition { .. } => "bollinger_position",
            Self::VolumeRatio { .. } => "volume_ratio",
        }
    }

    /// Number of candles needed before the first value is defined.
    pub fn lookback(&self) -> usize {
        match *self {
            Self::PriceToSma { period }
            | Self::PriceToEma { period }
            | Self::BollingerPosition { period, .. }
            | Self::VolumeRatio { period } => period,
            Self::MaSpread { slow, .. } => slow,
            Self::Rsi { period } | Self::RateOfChange { period } => period.saturating_add(1),
        }
    }

    /// Valid comparison thresholds for this indicator's output scale.
    pub fn threshold_range(&self) -> RangeInclusive<f64> {
        match self {
            Self::PriceToSma { .. } | Self::PriceToEma { .. } | Self::RateOfChange { .. } => -0.1..=0.1,
            Self::MaSpread { .. } => -0.05..=0.05,
            Self::Rsi { .. } => 20.0..=80.0,
            Self::BollingerPosition { .. } => -1.5..=1.5,
            Self::VolumeRatio { .. } => 0.5..=2.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let check = |label: &str, value: usize, range: RangeInclusive<usize>| {
            if range.contains(&value) {
                Ok(())
            } else {
                Err(EvolverError::InvalidGenome(format!(
                    "{} {} = {} outside {:?}",
                    self.name(),
                    label,
                    value,
                    range
                )))
            }
        };

        match *self {
            Self::PriceToSma { period } => check("period", period, SMA_PERIOD),
            Self::PriceToEma { period } => check("period", period, EMA_PERIOD),
            Self::MaSpread { fast, slow } => {
                check("fast", fast, SPREAD_FAST)?;
                check("slow", slow, SPREAD_SLOW)?;
                if fast >= slow {
                    return Err(EvolverError::InvalidGenome(format!(
                        "ma_spread fast {} must be below slow {}",
                        fast, slow
                    )));
                }
                Ok(())
            }
            Self::Rsi { period } => check("period", period, RSI_PERIOD),
            Self::RateOfChange { period } => check("period", period, ROC_PERIOD),
            Self::BollingerPosition { period, width } => {
                check("period", period, BOLLINGER_PERIOD)?;
                if !BOLLINGER_WIDTH.contains(&width) {
                    return Err(EvolverError::InvalidGenome(format!(
                        "bollinger_position width {} outside {:?}",
                        width, BOLLINGER_WIDTH
                    )));
                }
                Ok(())
            }
            Self::VolumeRatio { period } => check("period", period, VOLUME_PERIOD),
        }
    }

    /// Sample a kind uniformly, then its parameters uniformly within range.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        match rng.gen_range(0..Self::KIND_COUNT) {
            0 => Self::PriceToSma { period: rng.gen_range(SMA_PERIOD) },
            1 => Self::PriceToEma { period: rng.gen_range(EMA_PERIOD) },
            2 => {
                let fast = rng.gen_range(SPREAD_FAST);
                let slow = rng.gen_range((fast + 1).max(*SPREAD_SLOW.start())..=*SPREAD_SLOW.end());
                Self::MaSpread { fast, slow }
            }
            3 => Self::Rsi { period: rng.gen_range(RSI_PERIOD) },
            4 => Self::RateOfChange { period: rng.gen_range(ROC_PERIOD) },
            5 => Self::BollingerPosition {
                period: rng.gen_range(BOLLINGER_PERIOD),
                width: rng.gen_range(BOLLINGER_WIDTH),
            },
            _ => Self::VolumeRatio { period: rng.gen_range(VOLUME_PERIOD) },
        }
    }

    /// Compute the indicator over the whole window. Positions before the
    /// lookback are `None`.
    pub fn compute(&self, candles: &[Candle]) -> Vec<Option<f64>> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        match *self {
            Self::PriceToSma { period } => trend::price_to_average(&closes, &trend::sma(&closes, period)),
            Self::PriceToEma { period } => trend::price_to_average(&closes, &trend::ema(&closes, period)),
            Self::MaSpread { fast, slow } => trend::ma_spread(&closes, fast, slow),
            Self::Rsi { period } => momentum::rsi(&closes, period),
            Self::RateOfChange { period } => momentum::rate_of_change(&closes, period),
            Self::BollingerPosition { period, width } => trend::bollinger_position(&closes, period, width),
            Self::VolumeRatio { period } => {
                let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
                volume::volume_ratio(&volumes, period)
            }
        }
    }
}
