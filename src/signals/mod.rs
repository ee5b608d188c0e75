//! Structure detection over price series.

pub mod shift;

pub use shift::{DetectionError, ShiftDetector, MIN_BARS};
