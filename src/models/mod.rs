//! Shared data models spanning the monitor layers.

pub mod alert;
pub mod bar;
pub mod instrument;

pub use alert::{AlertMessage, ShiftVerdict, TrendDirection};
pub use bar::{Bar, Series};
pub use instrument::{instrument_set, Instrument};
