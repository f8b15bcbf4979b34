/// Simple moving average. `None` until `period` values are available.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let mut sum: f64 = values[..period].iter().sum();
    out[period - 1] = Some(sum / period as f64);

    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out[i] = Some(sum / period as f64);
    }

    out
}

/// Exponential moving average seeded with the SMA of the first `period` values.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut current = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(current);

    for i in period..values.len() {
        current = alpha * values[i] + (1.0 - alpha) * current;
        out[i] = Some(current);
    }

    out
}

/// Rolling population standard deviation.
pub fn rolling_std(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let means = sma(values, period);
    values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            means[i].map(|mean| {
                let window = &values[i + 1 - period..=i];
                let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
                variance.sqrt()
            })
        })
        .collect()
}

/// Close relative to a moving average: `close / ma - 1`.
pub fn price_to_average(closes: &[f64], average: &[Option<f64>]) -> Vec<Option<f64>> {
    closes
        .iter()
        .zip(average)
        .map(|(close, ma)| match ma {
            Some(ma) if *ma != 0.0 => Some(close / ma - 1.0),
            _ => None,
        })
        .collect()
}

/// Spread between a fast and a slow SMA: `fast / slow - 1`.
pub fn ma_spread(closes: &[f64], fast: usize, slow: usize) -> Vec<Option<f64>> {
    let fast_ma = sma(closes, fast);
    let slow_ma = sma(closes, slow);
    fast_ma
        .iter()
        .zip(&slow_ma)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) if *s != 0.0 => Some(f / s - 1.0),
            _ => None,
        })
        .collect()
}

/// Position of the close inside a Bollinger envelope of `width` deviations.
/// 0 at the middle band, ±1 at the bands.
pub fn bollinger_position(closes: &[f64], period: usize, width: f64) -> Vec<Option<f64>> {
    let mid = sma(closes, period);
    let std = rolling_std(closes, period);
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| match (mid[i], std[i]) {
            (Some(m), Some(s)) if s > 0.0 => Some((close - m) / (width * s)),
            (Some(_), Some(_)) => Some(0.0),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_matches_hand_computation() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = sma(&values, 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(2.0));
        assert_eq!(out[4], Some(4.0));
    }

    #[test]
    fn test_ema_is_seeded_with_sma() {
        let values = [2.0, 4.0, 6.0, 8.0];
        let out = ema(&values, 3);
        assert_eq!(out[2], Some(4.0));
        // alpha = 0.5
        assert_eq!(out[3], Some(6.0));
    }

    #[test]
    fn test_bollinger_flat_series_sits_on_middle_band() {
        let values = [10.0; 8];
        let out = bollinger_position(&values, 5, 2.0);
        assert_eq!(out[7], Some(0.0));
        assert_eq!(out[3], None);
    }
}
