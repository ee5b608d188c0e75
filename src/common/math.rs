//! Slice statistics over price columns.

/// Arithmetic mean of the trailing `period` values
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }

    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Largest value, `None` when empty
pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Smallest value, `None` when empty
pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

/// Relative distance of `value` from `base`; `None` when `base` is zero.
pub fn relative_divergence(value: f64, base: f64) -> Option<f64> {
    if base == 0.0 {
        return None;
    }
    Some((value - base).abs() / base)
}
