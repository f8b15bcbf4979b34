use crate::error::{EvolverError, Result};
use crate::types::Candle;
use polars::prelude::*;
use super::types::{OptionalColumn, RequiredColumn};
use std::collections::HashMap;

pub struct CandleValidator;

impl CandleValidator {
    /// Map every required column to the name it has in `df`. Price and
    /// volume columns must be numeric.
    pub fn resolve_columns(df: &DataFrame) -> Result<HashMap<RequiredColumn, String>> {
        let mut column_map = HashMap::new();

        for required in RequiredColumn::all() {
            match Self::find_column(df, required.aliases()) {
                Some(col_name) => {
                    column_map.insert(required, col_name.to_string());
                }
                None => {
                    return Err(EvolverError::DataLoading(format!(
                        "Missing required column: {} (tried aliases: {:?})",
                        required.as_str(),
                        required.aliases()
                    )));
                }
            }
        }

        for (req_col, actual_name) in &column_map {
            if *req_col == RequiredColumn::Timestamp {
                continue;
            }
            let series = df.column(actual_name)?;
            if !matches!(
                series.dtype(),
                DataType::Float64 | DataType::Float32 | DataType::Int64 | DataType::Int32 | DataType::UInt64 | DataType::UInt32
            ) {
                return Err(EvolverError::DataLoading(format!(
                    "Column '{}' ({}) must be numeric, found {:?}",
                    actual_name,
                    req_col.as_str(),
                    series.dtype()
                )));
            }
        }

        Ok(column_map)
    }

    pub fn find_optional<'a>(df: &'a DataFrame, column: OptionalColumn) -> Option<&'a str> {
        Self::find_column(df, column.aliases())
    }

    fn find_column<'a>(df: &'a DataFrame, aliases: &[&str]) -> Option<&'a str> {
        df.get_column_names()
            .into_iter()
            .find(|col| aliases.contains(&col.as_str()))
            .map(|col| col.as_str())
    }

    /// OHLC relationships, non-negative volume, finite prices and strictly
    /// increasing timestamps.
    pub fn validate_candles(candles: &[Candle]) -> Result<()> {
        for (i, c) in candles.iter().enumerate() {
            if ![c.open, c.high, c.low, c.close, c.volume].iter().all(|v| v.is_finite()) {
                return Err(EvolverError::DataLoading(format!("Invalid data at row {}: non-finite value", i)));
            }
            if c.high < c.low {
                return Err(EvolverError::DataLoading(format!(
                    "Invalid data at row {}: high ({}) < low ({})",
                    i, c.high, c.low
                )));
            }
            if c.high < c.open || c.high < c.close {
                return Err(EvolverError::DataLoading(format!(
                    "Invalid data at row {}: high ({}) < open ({}) or close ({})",
                    i, c.high, c.open, c.close
                )));
            }
            if c.low > c.open || c.low > c.close {
                return Err(EvolverError::DataLoading(format!(
                    "Invalid data at row {}: low ({}) > open ({}) or close ({})",
                    i, c.low, c.open, c.close
                )));
            }
            if c.volume < 0.0 {
                return Err(EvolverError::DataLoading(format!(
                    "Invalid data at row {}: negative volume {}",
                    i, c.volume
                )));
            }
        }

        if let Some(i) = candles.windows(2).position(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(EvolverError::DataLoading(format!(
                "Timestamps not strictly increasing at row {}",
                i + 1
            )));
        }

        Ok(())
    }

    /// Check for minimum required rows
    pub fn validate_minimum_rows(rows: usize, min_rows: usize) -> Result<()> {
        if rows < min_rows {
            return Err(EvolverError::InsufficientData {
                required: min_rows,
                available: rows,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use polars::df;

    fn candle(t: i64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle::new(Utc.timestamp_opt(t, 0).unwrap(), o, h, l, c, 10.0)
    }

    #[test]
    fn test_resolve_columns_with_aliases() {
        let df = df! {
            "time" => &[1i64, 2],
            "Open" => &[100.0, 101.0],
            "HIGH" => &[101.0, 103.0],
            "low" => &[99.0, 100.0],
            "Close" => &[100.5, 102.0],
            "Vol" => &[1000.0, 1500.0],
        }
        .unwrap();

        let map = CandleValidator::resolve_columns(&df).unwrap();
        assert_eq!(map[&RequiredColumn::Timestamp], "time");
        assert_eq!(map[&RequiredColumn::Volume], "Vol");
    }

    #[test]
    fn test_missing_column() {
        let df = df! {
            "timestamp" => &[1i64, 2],
            "open" => &[100.0, 101.0],
            "high" => &[101.0, 103.0],
            "low" => &[99.0, 100.0],
            "volume" => &[1000.0, 1500.0],
        }
        .unwrap();

        assert!(CandleValidator::resolve_columns(&df).is_err());
    }

    #[test]
    fn test_invalid_ohlc() {
        let good = [candle(0, 100.0, 101.0, 99.0, 100.5), candle(60, 100.5, 102.0, 100.0, 101.0)];
        assert!(CandleValidator::validate_candles(&good).is_ok());

        let high_below_open = [candle(0, 100.0, 99.5, 99.0, 99.2)];
        assert!(CandleValidator::validate_candles(&high_below_open).is_err());

        let out_of_order = [good[1].clone(), good[0].clone()];
        assert!(CandleValidator::validate_candles(&out_of_order).is_err());

        let mut negative = good[0].clone();
        negative.volume = -1.0;
        assert!(CandleValidator::validate_candles(&[negative]).is_err());
    }
}
