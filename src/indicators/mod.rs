//! Price indicators used by the detectors.

pub mod trend;
