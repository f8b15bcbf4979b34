/// Wilder RSI. The first value appears at index `period`.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = closes[i] - closes[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    let p = period as f64;
    for i in (period + 1)..closes.len() {
        let change = closes[i] - closes[i - 1];
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
        out[i] = Some(rsi_value(avg_gain, avg_loss));
    }

    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

/// `close[t] / close[t - period] - 1`
pub fn rate_of_change(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            if period == 0 || i < period {
                return None;
            }
            let base = closes[i - period];
            if base == 0.0 {
                None
            } else {
                Some(close / base - 1.0)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_of_rising_series_is_100() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&closes, 14);
        assert_eq!(out[13], None);
        assert_eq!(out[14], Some(100.0));
        assert_eq!(out[19], Some(100.0));
    }

    #[test]
    fn test_rsi_stays_in_bounds() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + ((i as f64) * 0.9).sin() * 5.0).collect();
        for value in rsi(&closes, 7).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_rate_of_change_uses_lagged_close() {
        let closes = [100.0, 110.0, 121.0];
        let out = rate_of_change(&closes, 1);
        assert_eq!(out[0], None);
        assert!((out[1].unwrap() - 0.1).abs() < 1e-12);
        assert!((out[2].unwrap() - 0.1).abs() < 1e-12);
    }
}
