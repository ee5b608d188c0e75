//! Market structure shift monitor.
//!
//! Samples recent bars for a watch list on a fixed schedule, flags new
//! extremes and moving-average divergence, and posts alerts to a webhook.

pub mod common;
pub mod config;
pub mod core;
pub mod indicators;
pub mod logging;
pub mod models;
pub mod services;
pub mod signals;
