// src/engines/metrics/profitability.rs
use crate::types::Trade;

pub struct ProfitabilityMetrics;

impl ProfitabilityMetrics {
    /// Share of trades closed with a positive profit, in `[0, 1]`.
    pub fn win_rate(trades: &[Trade]) -> f64 {
        if trades.is_empty() {
            return 0.0;
        }
        let winners = trades.iter().filter(|t| t.profit > 0.0).count();
        winners as f64 / trades.len() as f64
    }

    pub fn total_return(equity: &[f64]) -> f64 {
        match (equity.first(), equity.last()) {
            (Some(&first), Some(&last)) if first > 0.0 => (last - first) / first,
            _ => 0.0,
        }
    }

    pub fn gross_profit(trades: &[Trade]) -> f64 {
        trades.iter().map(|t| t.profit).filter(|p| *p > 0.0).sum()
    }

    pub fn gross_loss(trades: &[Trade]) -> f64 {
        trades.iter().map(|t| t.profit).filter(|p| *p < 0.0).map(f64::abs).sum()
    }
}
