use super::trend::sma;

/// Volume relative to its own moving average.
pub fn volume_ratio(volumes: &[f64], period: usize) -> Vec<Option<f64>> {
    let average = sma(volumes, period);
    volumes
        .iter()
        .zip(&average)
        .map(|(volume, avg)| match avg {
            Some(avg) if *avg > 0.0 => Some(volume / avg),
            Some(_) => Some(1.0),
            None => None,
        })
        .collect()
}
