//! Market data provider interface.

use crate::models::{Instrument, Series};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("market data request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("market data provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("market data provider reported an error: {0}")]
    Provider(String),
    #[error("malformed market data payload: {0}")]
    Malformed(String),
    #[error("invalid market data url: {0}")]
    Url(#[from] url::ParseError),
}

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Get up to `max_bars` of the most recent bars, oldest first.
    ///
    /// An empty series means the provider has no data for the window and is
    /// not an error.
    async fn get_bars(
        &self,
        instrument: &Instrument,
        interval: &str,
        max_bars: usize,
    ) -> Result<Series, FetchError>;
}
