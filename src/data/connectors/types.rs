/// Required OHLCV columns for market data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredColumn {
    Timestamp,
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl RequiredColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Close => "close",
            Self::Volume => "volume",
        }
    }

    pub fn all() -> [Self; 6] {
        [
            Self::Timestamp,
            Self::Open,
            Self::High,
            Self::Low,
            Self::Close,
            Self::Volume,
        ]
    }

    /// Common alternative column names
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Timestamp => &["timestamp", "Timestamp", "time", "Time", "date", "Date", "datetime", "open_time"],
            Self::Open => &["open", "Open", "OPEN", "o"],
            Self::High => &["high", "High", "HIGH", "h"],
            Self::Low => &["low", "Low", "LOW", "l"],
            Self::Close => &["close", "Close", "CLOSE", "c"],
            Self::Volume => &["volume", "Volume", "VOLUME", "vol", "Vol", "v"],
        }
    }
}

/// Columns read when present, carried into the optional candle fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionalColumn {
    Vwap,
    QuoteVolume,
    TradeCount,
}

impl OptionalColumn {
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Vwap => &["vwap", "VWAP"],
            Self::QuoteVolume => &["quote_volume", "quote_asset_volume", "quoteVolume"],
            Self::TradeCount => &["trade_count", "trades", "number_of_trades"],
        }
    }
}
