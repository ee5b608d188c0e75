//! Shift verdicts and the alert text rendered from them.

use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::instrument::Instrument;

/// Result of running structure detection over one series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShiftVerdict {
    pub higher_high: bool,
    pub lower_low: bool,
    pub trend_change: bool,
    pub current_price: f64,
    pub short_ma: f64,
    pub long_ma: f64,
}

impl ShiftVerdict {
    /// True when at least one structural flag fired
    pub fn is_shift(&self) -> bool {
        self.higher_high || self.lower_low || self.trend_change
    }

    pub fn direction(&self) -> TrendDirection {
        if self.short_ma > self.long_ma {
            TrendDirection::Bullish
        } else {
            TrendDirection::Bearish
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Bullish,
    Bearish,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Bullish => write!(f, "Bullish"),
            TrendDirection::Bearish => write!(f, "Bearish"),
        }
    }
}

/// Formatted alert ready for a notifier
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub instrument: Instrument,
    pub content: String,
}

impl AlertMessage {
    /// Render a verdict as alert text. Returns `None` when no flag fired.
    ///
    /// `at` fixes the timestamp shown in the message, so the output is fully
    /// determined by the arguments.
    pub fn from_verdict(
        instrument: &Instrument,
        verdict: &ShiftVerdict,
        at: DateTime<Tz>,
    ) -> Option<Self> {
        if !verdict.is_shift() {
            return None;
        }

        let content = format!(
            "🔔 Market Structure Shift Detected:\n\
             Time: {time}\n\
             Current Price: ${price:.2}\n\
             Higher High: {hh}\n\
             Lower Low: {ll}\n\
             Trend Change: {tc}\n\
             Trend: {direction}\n\
             Short MA: {short:.2}\n\
             Long MA: {long:.2}",
            time = at.format("%Y-%m-%d %H:%M:%S %Z"),
            price = verdict.current_price,
            hh = verdict.higher_high,
            ll = verdict.lower_low,
            tc = verdict.trend_change,
            direction = verdict.direction(),
            short = verdict.short_ma,
            long = verdict.long_ma,
        );

        Some(Self {
            instrument: instrument.clone(),
            content,
        })
    }

    /// Body posted to the sink, prefixed with the instrument
    pub fn payload_text(&self) -> String {
        format!("{} Update:\n{}", self.instrument, self.content)
    }
}
