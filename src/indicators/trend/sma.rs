//! SMA (Simple Moving Average) indicator

use crate::common::math;
use crate::models::Bar;

/// Calculate the SMA of closing prices over the last `period` bars
pub fn calculate_sma(bars: &[Bar], period: u32) -> Option<f64> {
    if bars.len() < period as usize {
        return None;
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    math::sma(&closes, period as usize)
}
