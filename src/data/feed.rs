use log::warn;
use std::collections::HashMap;
use std::sync::RwLock;

use super::connectors::CandleValidator;
use crate::error::{EvolverError, Result};
use crate::types::{Candle, ScopeKey, Timeframe};

/// Source of time-ordered candle windows.
pub trait DataFeed: Send + Sync {
    fn name(&self) -> &'static str;

    /// The most recent `length` candles, oldest first. Fails with
    /// `InsufficientData` when fewer exist.
    fn get_window(&self, instrument: &str, timeframe: Timeframe, length: usize) -> Result<Vec<Candle>>;
}

/// In-process feed for replay and tests. Writers append candles while
/// readers take windows.
#[derive(Debug, Default)]
pub struct MemoryFeed {
    candles: RwLock<HashMap<ScopeKey, Vec<Candle>>>,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one candle. Candles that fail validation or are not newer than
    /// the last stored one are ignored.
    pub fn push(&self, scope: &ScopeKey, candle: Candle) {
        if let Err(e) = CandleValidator::validate_candles(std::slice::from_ref(&candle)) {
            warn!("Ignoring candle for {}: {}", scope, e);
            return;
        }
        let mut guard = self.candles.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let series = guard.entry(scope.clone()).or_default();
        if series.last().is_some_and(|last| last.timestamp >= candle.timestamp) {
            warn!("Ignoring out-of-order candle for {}", scope);
            return;
        }
        series.push(candle);
    }

    pub fn extend<I>(&self, scope: &ScopeKey, candles: I)
    where
        I: IntoIterator<Item = Candle>,
    {
        for candle in candles {
            self.push(scope, candle);
        }
    }

    pub fn len(&self, scope: &ScopeKey) -> usize {
        let guard = self.candles.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(scope).map_or(0, Vec::len)
    }
}

impl DataFeed for MemoryFeed {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get_window(&self, instrument: &str, timeframe: Timeframe, length: usize) -> Result<Vec<Candle>> {
        let scope = ScopeKey::new(instrument, timeframe);
        let guard = self.candles.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let series = guard.get(&scope).map_or(&[][..], Vec::as_slice);
        if series.len() < length {
            return Err(EvolverError::InsufficientData {
                required: length,
                available: series.len(),
            });
        }
        Ok(series[series.len() - length..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candle(t: i64, close: f64) -> Candle {
        Candle::new(Utc.timestamp_opt(t, 0).unwrap(), close, close, close, close, 1.0)
    }

    #[test]
    fn test_window_returns_the_latest_candles() {
        let feed = MemoryFeed::new();
        let scope = ScopeKey::new("ETH/USDT", Timeframe::M5);
        feed.extend(&scope, (0..10).map(|i| candle(i * 300, i as f64)));
        feed.push(&scope, candle(0, 99.0));
        assert_eq!(feed.len(&scope), 10);

        let window = feed.get_window("ETH/USDT", Timeframe::M5, 3).unwrap();
        let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![7.0, 8.0, 9.0]);

        assert!(matches!(
            feed.get_window("ETH/USDT", Timeframe::M5, 11),
            Err(EvolverError::InsufficientData { required: 11, available: 10 })
        ));
        assert!(matches!(
            feed.get_window("SOL/USDT", Timeframe::M5, 1),
            Err(EvolverError::InsufficientData { available: 0, .. })
        ));
    }

    #[test]
    fn test_invalid_candles_are_not_stored() {
        let feed = MemoryFeed::new();
        let scope = ScopeKey::new("BTC/USDT", Timeframe::H1);
        feed.push(&scope, candle(0, 100.0));
        feed.push(&scope, candle(3600, f64::NAN));
        feed.push(
            &scope,
            Candle::new(Utc.timestamp_opt(7200, 0).unwrap(), 100.0, 90.0, 95.0, 99.0, 1.0),
        );
        feed.push(&scope, candle(10800, 101.0));

        assert_eq!(feed.len(&scope), 2);
        let window = feed.get_window("BTC/USDT", Timeframe::H1, 2).unwrap();
        assert_eq!(window[1].close, 101.0);
    }
}
