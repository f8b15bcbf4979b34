// src/engines/metrics/risk.rs

/// Volatility floor used when scoring; keeps near-flat equity curves from
/// producing unbounded ratios.
pub const MIN_VOLATILITY: f64 = 1e-4;

pub struct RiskMetrics;

impl RiskMetrics {
    /// Per-bar simple returns of an equity curve.
    pub fn returns(equity: &[f64]) -> Vec<f64> {
        equity
            .windows(2)
            .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
            .collect()
    }

    pub fn mean(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }

    pub fn std_dev(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }

        let mean = Self::mean(values);
        let variance = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

        variance.sqrt()
    }

    /// Largest peak-to-trough decline as a fraction of the peak.
    pub fn max_drawdown(equity: &[f64]) -> f64 {
        let mut max_dd: f64 = 0.0;
        let mut peak = match equity.first() {
            Some(&first) => first,
            None => return 0.0,
        };

        for &value in equity {
            if value > peak {
                peak = value;
            }
            if peak > 0.0 {
                max_dd = max_dd.max((peak - value) / peak);
            }
        }

        max_dd
    }

    /// Mean return over volatility, with volatility floored at [`MIN_VOLATILITY`].
    pub fn risk_adjusted_return(returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        Self::mean(returns) / Self::std_dev(returns).max(MIN_VOLATILITY)
    }
}
