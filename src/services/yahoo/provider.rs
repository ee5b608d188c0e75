//! Yahoo Finance market data provider implementation

use chrono::DateTime;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::messages::{ChartResponse, ChartResult};
use crate::config::ProviderSettings;
use crate::models::{Bar, Instrument, Series};
use crate::services::market_data::{FetchError, MarketDataProvider};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; shiftwatch/0.1)";

pub struct YahooMarketDataProvider {
    client: reqwest::Client,
    base_url: String,
    range: String,
    timeout: Duration,
}

impl YahooMarketDataProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self::with_client(settings, client))
    }

    pub fn with_client(settings: &ProviderSettings, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: settings.base_url.clone(),
            range: settings.range.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    fn chart_url(&self, instrument: &Instrument, interval: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| {
                FetchError::Malformed(format!("base url {} cannot hold a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(&["v8", "finance", "chart", instrument.as_str()]);
        url.query_pairs_mut()
            .append_pair("interval", interval)
            .append_pair("range", &self.range);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for YahooMarketDataProvider {
    async fn get_bars(
        &self,
        instrument: &Instrument,
        interval: &str,
        max_bars: usize,
    ) -> Result<Series, FetchError> {
        let url = self.chart_url(instrument, interval)?;
        debug!(symbol = %instrument, url = %url, "Requesting chart data");

        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let payload: ChartResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        if let Some(err) = payload.chart.error {
            return Err(FetchError::Provider(format!("{}: {}", err.code, err.description)));
        }

        let Some(result) = payload.chart.result.and_then(|r| r.into_iter().next()) else {
            warn!(symbol = %instrument, "Chart response contained no result");
            return Ok(Vec::new());
        };

        let mut bars = bars_from_chart(result)?;
        if bars.len() > max_bars {
            let excess = bars.len() - max_bars;
            bars.drain(..excess);
        }

        debug!(
            symbol = %instrument,
            count = bars.len(),
            "Fetched {} bars for {}",
            bars.len(),
            instrument
        );
        Ok(bars)
    }
}

/// Turn Yahoo's column arrays into ascending bars, dropping rows with gaps.
pub fn bars_from_chart(result: ChartResult) -> Result<Series, FetchError> {
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let (Some(high), Some(low), Some(close)) =
            (at(&quote.high, i), at(&quote.low, i), at(&quote.close, i))
        else {
            continue;
        };

        let timestamp = DateTime::from_timestamp(ts, 0)
            .ok_or_else(|| FetchError::Malformed(format!("timestamp {ts} out of range")))?;

        bars.push(Bar::new(
            at(&quote.open, i).unwrap_or(close),
            high,
            low,
            close,
            at(&quote.volume, i).unwrap_or(0.0),
            timestamp,
        ));
    }

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

fn at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}
