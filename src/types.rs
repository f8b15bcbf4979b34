use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::engines::generation::GenomeId;
use crate::error::EvolverError;

/// One OHLCV interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub vwap: Option<f64>,
    #[serde(default)]
    pub quote_volume: Option<f64>,
    #[serde(default)]
    pub trade_count: Option<u64>,
}

impl Candle {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            vwap: None,
            quote_volume: None,
            trade_count: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H4 => "4h",
            Self::D1 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = EvolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Self::M1),
            "5m" => Ok(Self::M5),
            "15m" => Ok(Self::M15),
            "30m" => Ok(Self::M30),
            "1h" => Ok(Self::H1),
            "4h" => Ok(Self::H4),
            "1d" => Ok(Self::D1),
            other => Err(EvolverError::InvalidConfiguration(format!(
                "Unknown timeframe '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = EvolverError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.as_str().to_string()
    }
}

/// Identifies one independently evolved market: an instrument on a timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeKey {
    pub instrument: String,
    pub timeframe: Timeframe,
}

impl ScopeKey {
    pub fn new(instrument: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            instrument: instrument.into(),
            timeframe,
        }
    }

    /// Filesystem-safe rendering, e.g. `BTC-USDT_1h`.
    pub fn storage_key(&self) -> String {
        format!("{}_{}", self.instrument.replace('/', "-"), self.timeframe)
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.instrument, self.timeframe)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

/// Live decision handed to the execution collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub action: Action,
    pub confidence: f64,
    pub genome_id: Option<GenomeId>,
    pub generated_at: DateTime<Utc>,
}

/// Completed simulated trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_bar: usize,
    pub exit_bar: usize,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub profit: f64,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn return_pct(&self) -> f64 {
        (self.exit_price - self.entry_price) / self.entry_price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Signal,
    DrawdownLimit,
    EndOfData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_round_trips_through_strings() {
        for tf in [Timeframe::M5, Timeframe::H1, Timeframe::D1] {
            assert_eq!(tf.as_str().parse::<Timeframe>().unwrap(), tf);
        }
        assert!("2h".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_storage_key_is_path_safe() {
        let key = ScopeKey::new("BTC/USDT", Timeframe::H4);
        assert_eq!(key.storage_key(), "BTC-USDT_4h");
        assert_eq!(key.to_string(), "BTC/USDT@4h");
    }
}
