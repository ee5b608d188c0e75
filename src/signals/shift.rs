//! Market structure shift detection.
//!
//! Looks at the latest bar against the rest of the window for a new extreme
//! and compares a 5-bar against a 10-bar close average for divergence.

use thiserror::Error;
use tracing::debug;

use crate::common::math;
use crate::indicators::trend::calculate_sma;
use crate::models::{Bar, ShiftVerdict};

/// Bars required before a verdict is produced
pub const MIN_BARS: usize = 10;
pub const SHORT_MA_PERIOD: u32 = 5;
pub const LONG_MA_PERIOD: u32 = 10;
/// Relative MA divergence above which the trend counts as changed (0.5%)
pub const TREND_CHANGE_THRESHOLD: f64 = 0.005;

#[derive(Debug, Error, PartialEq)]
pub enum DetectionError {
    #[error("bar {index} has a non-finite high/low/close")]
    NonFinite { index: usize },
}

pub struct ShiftDetector;

impl ShiftDetector {
    /// Detect a structure shift on the latest bar of `bars`.
    ///
    /// `Ok(None)` means the window is still warming up (fewer than
    /// [`MIN_BARS`] bars).
    pub fn detect(bars: &[Bar]) -> Result<Option<ShiftVerdict>, DetectionError> {
        if bars.len() < MIN_BARS {
            return Ok(None);
        }

        if let Some(index) = bars.iter().position(|b| !b.is_finite()) {
            return Err(DetectionError::NonFinite { index });
        }

        let (last, history) = match bars.split_last() {
            Some(split) => split,
            None => return Ok(None),
        };

        let highs: Vec<f64> = history.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = history.iter().map(|b| b.low).collect();

        let higher_high = math::max(&highs).is_some_and(|prev| last.high > prev);
        let lower_low = math::min(&lows).is_some_and(|prev| last.low < prev);

        let (short_ma, long_ma) = match (
            calculate_sma(bars, SHORT_MA_PERIOD),
            calculate_sma(bars, LONG_MA_PERIOD),
        ) {
            (Some(short), Some(long)) => (short, long),
            _ => return Ok(None),
        };

        let trend_change = math::relative_divergence(short_ma, long_ma)
            .is_some_and(|divergence| divergence > TREND_CHANGE_THRESHOLD);

        debug!(
            higher_high,
            lower_low,
            trend_change,
            short_ma,
            long_ma,
            "Shift flags computed"
        );

        Ok(Some(ShiftVerdict {
            higher_high,
            lower_low,
            trend_change,
            current_price: last.close,
            short_ma,
            long_ma,
        }))
    }
}
