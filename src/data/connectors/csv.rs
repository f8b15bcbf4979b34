use crate::data::feed::DataFeed;
use crate::error::{EvolverError, Result};
use crate::types::{Candle, ScopeKey, Timeframe};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::{debug, warn};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use super::{
    types::{OptionalColumn, RequiredColumn},
    validator::CandleValidator,
};

/// Epoch values above this are taken as milliseconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Reads one `<INSTRUMENT>_<timeframe>.csv` per scope from a directory,
/// e.g. `data/BTC-USDT_1h.csv`.
#[derive(Debug, Clone)]
pub struct CsvFeed {
    directory: PathBuf,
}

impl CsvFeed {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn path_for(&self, instrument: &str, timeframe: Timeframe) -> PathBuf {
        self.directory
            .join(format!("{}.csv", ScopeKey::new(instrument, timeframe).storage_key()))
    }

    /// Load CSV file into DataFrame
    pub fn load<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.as_ref().to_path_buf()))?
            .finish()
            .map_err(|e| EvolverError::DataLoading(format!("Failed to read CSV: {}", e)))?;

        Ok(df)
    }

    /// Load, convert and validate every candle in a file.
    pub fn load_candles<P: AsRef<Path>>(path: P) -> Result<Vec<Candle>> {
        let df = Self::load(&path)?;
        let candles = Self::to_candles(&df)?;
        CandleValidator::validate_candles(&candles)?;
        Ok(candles)
    }

    /// Convert a DataFrame with OHLCV columns (any known alias) into candles.
    /// Rows with a null price or volume are dropped.
    pub fn to_candles(df: &DataFrame) -> Result<Vec<Candle>> {
        let columns = CandleValidator::resolve_columns(df)?;
        let column = |required: RequiredColumn| columns[&required].as_str();

        let timestamps = Self::timestamps(df, column(RequiredColumn::Timestamp))?;
        let open = Self::floats(df, column(RequiredColumn::Open))?;
        let high = Self::floats(df, column(RequiredColumn::High))?;
        let low = Self::floats(df, column(RequiredColumn::Low))?;
        let close = Self::floats(df, column(RequiredColumn::Close))?;
        let volume = Self::floats(df, column(RequiredColumn::Volume))?;

        let optional = |col: OptionalColumn| -> Result<Vec<Option<f64>>> {
            match CandleValidator::find_optional(df, col) {
                Some(name) => Self::floats(df, name),
                None => Ok(vec![None; df.height()]),
            }
        };
        let vwap = optional(OptionalColumn::Vwap)?;
        let quote_volume = optional(OptionalColumn::QuoteVolume)?;
        let trade_count = optional(OptionalColumn::TradeCount)?;

        let mut candles = Vec::with_capacity(df.height());
        let mut dropped = 0usize;
        for i in 0..df.height() {
            match (open[i], high[i], low[i], close[i], volume[i]) {
                (Some(o), Some(h), Some(l), Some(c), Some(v)) => candles.push(Candle {
                    timestamp: timestamps[i],
                    open: o,
                    high: h,
                    low: l,
                    close: c,
                    volume: v,
                    vwap: vwap[i],
                    quote_volume: quote_volume[i],
                    trade_count: trade_count[i].filter(|n| *n >= 0.0).map(|n| n as u64),
                }),
                _ => dropped += 1,
            }
        }
        if dropped > 0 {
            warn!("Dropped {} rows with null values", dropped);
        }

        Ok(candles)
    }

    fn floats(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
        let column = df.column(name)?.cast(&DataType::Float64)?;
        Ok(column.f64()?.into_iter().collect())
    }

    fn timestamps(df: &DataFrame, name: &str) -> Result<Vec<DateTime<Utc>>> {
        let column = df.column(name)?;
        let parsed: Vec<Option<DateTime<Utc>>> = match column.dtype() {
            DataType::String => column.str()?.into_iter().map(|v| v.and_then(parse_timestamp)).collect(),
            DataType::Datetime(unit, _) => {
                let unit = *unit;
                let raw = column.cast(&DataType::Int64)?;
                raw.i64()?
                    .into_iter()
                    .map(|v| {
                        v.and_then(|v| match unit {
                            TimeUnit::Milliseconds => Utc.timestamp_millis_opt(v).single(),
                            TimeUnit::Microseconds => DateTime::from_timestamp_micros(v),
                            TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(v)),
                        })
                    })
                    .collect()
            }
            DataType::Float64 | DataType::Float32 | DataType::Int64 | DataType::Int32 | DataType::UInt64 | DataType::UInt32 => {
                let raw = column.cast(&DataType::Int64)?;
                raw.i64()?.into_iter().map(|v| v.and_then(from_epoch)).collect()
            }
            other => {
                return Err(EvolverError::DataLoading(format!(
                    "Column '{}' has unsupported timestamp type {:?}",
                    name, other
                )))
            }
        };

        parsed
            .into_iter()
            .enumerate()
            .map(|(i, ts)| {
                ts.ok_or_else(|| EvolverError::DataLoading(format!("Unparseable timestamp at row {}", i)))
            })
            .collect()
    }
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.abs() > MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

/// RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC), or a bare date.
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl DataFeed for CsvFeed {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn get_window(&self, instrument: &str, timeframe: Timeframe, length: usize) -> Result<Vec<Candle>> {
        let path = self.path_for(instrument, timeframe);
        if !path.exists() {
            debug!("No data file at {}", path.display());
            return Err(EvolverError::InsufficientData {
                required: length,
                available: 0,
            });
        }

        // An unreadable file yields no usable window for this tick.
        let candles = Self::load_candles(&path).map_err(|e| {
            warn!("Unusable data file {}: {}", path.display(), e);
            EvolverError::InsufficientData {
                required: length,
                available: 0,
            }
        })?;
        CandleValidator::validate_minimum_rows(candles.len(), length)?;
        Ok(candles[candles.len() - length..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;
    use std::fs;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("evolver-csv-{}-{}", tag, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_csv(dir: &Path, rows: usize) {
        let mut body = String::from("timestamp,open,high,low,close,volume,vwap\n");
        for i in 0..rows {
            let close = 100.0 + i as f64;
            body.push_str(&format!(
                "2024-01-01T{:02}:00:00Z,{},{},{},{},{},{}\n",
                i,
                close - 0.5,
                close + 1.0,
                close - 1.0,
                close,
                1000 + i,
                close - 0.2
            ));
        }
        fs::write(dir.join("BTC-USDT_1h.csv"), body).unwrap();
    }

    #[test]
    fn test_window_is_the_most_recent_candles() {
        let dir = temp_dir("window");
        write_csv(&dir, 20);
        let feed = CsvFeed::new(&dir);

        let window = feed.get_window("BTC/USDT", Timeframe::H1, 5).unwrap();
        assert_eq!(window.len(), 5);
        assert_eq!(window[4].close, 119.0);
        assert_eq!(window[0].close, 115.0);
        assert_eq!(window[4].vwap, Some(118.8));
        assert!(window.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

        let err = feed.get_window("BTC/USDT", Timeframe::H1, 50).unwrap_err();
        assert!(matches!(err, EvolverError::InsufficientData { required: 50, available: 20 }));

        let err = feed.get_window("ETH/USDT", Timeframe::H1, 5).unwrap_err();
        assert!(matches!(err, EvolverError::InsufficientData { available: 0, .. }));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_epoch_timestamps() {
        let df = df! {
            "open_time" => &[1_700_000_000_000i64, 1_700_000_060_000],
            "open" => &[100.0, 101.0],
            "high" => &[101.0, 103.0],
            "low" => &[99.0, 100.0],
            "close" => &[100.5, 102.0],
            "volume" => &[1000.0, 1500.0],
        }
        .unwrap();

        let candles = CsvFeed::to_candles(&df).unwrap();
        assert_eq!(candles[0].timestamp.timestamp(), 1_700_000_000);
        assert_eq!(candles[1].timestamp.timestamp(), 1_700_000_060);
        assert_eq!(candles[0].vwap, None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-03-01T12:00:00+02:00").is_some());
        assert_eq!(
            parse_timestamp("2024-03-01 12:00:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
        assert!(parse_timestamp("2024-03-01").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_malformed_file_is_insufficient_data() {
        let dir = temp_dir("malformed");
        fs::write(
            dir.join("BTC-USDT_1h.csv"),
            "timestamp,open,high,low,close,volume\n2024-01-01T00:00:00Z,100,90,95,99,10\n",
        )
        .unwrap();
        let feed = CsvFeed::new(&dir);

        assert!(CsvFeed::load_candles(dir.join("BTC-USDT_1h.csv")).is_err());
        let err = feed.get_window("BTC/USDT", Timeframe::H1, 1).unwrap_err();
        assert!(matches!(err, EvolverError::InsufficientData { required: 1, available: 0 }));
        fs::remove_dir_all(&dir).ok();
    }
}
