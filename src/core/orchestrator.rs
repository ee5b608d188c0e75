//! One monitoring cycle: fetch, detect and notify for every instrument.
//!
//! Instruments run as independent tasks capped by a semaphore. Whatever goes
//! wrong for one instrument (provider error, bad data, failed delivery, even a
//! panic) is logged and does not affect the others.

use chrono_tz::Tz;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::clock::{Clock, SystemClock};
use crate::core::scheduler::CycleRunner;
use crate::models::{AlertMessage, Instrument};
use crate::services::market_data::{FetchError, MarketDataProvider};
use crate::services::notifications::{Delivery, Notifier, NotifyError};
use crate::signals::shift::{DetectionError, ShiftDetector};

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Detection(#[from] DetectionError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// How processing of a single instrument ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentOutcome {
    /// Provider returned an empty series
    NoData,
    /// Not enough bars to run detection yet
    WarmingUp { bars: usize },
    /// Verdict produced, no flag set
    NoShift,
    /// Shift detected and handed to the notifier
    Alerted(Delivery),
}

#[derive(Debug, Clone)]
pub struct CycleSettings {
    /// Bar interval passed to the provider
    pub interval: String,
    pub max_bars: usize,
    /// Zone used for alert timestamps
    pub timezone: Tz,
    pub max_workers: usize,
}

impl CycleSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.interval.label().to_string(),
            max_bars: config.provider.max_bars,
            timezone: config.timezone,
            max_workers: config.workers,
        }
    }
}

/// Per-instrument pipeline shared by all worker tasks
struct Pipeline {
    provider: Arc<dyn MarketDataProvider>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: CycleSettings,
}

impl Pipeline {
    async fn process(&self, instrument: &Instrument) -> Result<InstrumentOutcome, InstrumentError> {
        debug!(symbol = %instrument, "Processing symbol: {}", instrument);

        let bars = self
            .provider
            .get_bars(instrument, &self.settings.interval, self.settings.max_bars)
            .await?;

        if bars.is_empty() {
            return Ok(InstrumentOutcome::NoData);
        }

        let Some(verdict) = ShiftDetector::detect(&bars)? else {
            return Ok(InstrumentOutcome::WarmingUp { bars: bars.len() });
        };

        let at = self.clock.now().with_timezone(&self.settings.timezone);
        let Some(alert) = AlertMessage::from_verdict(instrument, &verdict, at) else {
            return Ok(InstrumentOutcome::NoShift);
        };

        info!(
            symbol = %instrument,
            higher_high = verdict.higher_high,
            lower_low = verdict.lower_low,
            trend_change = verdict.trend_change,
            price = verdict.current_price,
            "[{}] {}",
            instrument,
            alert.content
        );

        let delivery = self.notifier.notify(&alert).await?;
        Ok(InstrumentOutcome::Alerted(delivery))
    }
}

pub struct CycleOrchestrator {
    pipeline: Arc<Pipeline>,
    instruments: BTreeSet<Instrument>,
}

impl CycleOrchestrator {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        notifier: Arc<dyn Notifier>,
        instruments: BTreeSet<Instrument>,
        settings: CycleSettings,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                provider,
                notifier,
                clock: Arc::new(SystemClock),
                settings,
            }),
            instruments,
        }
    }

    /// Replace the clock used for alert timestamps
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        let pipeline = Pipeline {
            provider: self.pipeline.provider.clone(),
            notifier: self.pipeline.notifier.clone(),
            clock,
            settings: self.pipeline.settings.clone(),
        };
        Self {
            pipeline: Arc::new(pipeline),
            instruments: self.instruments,
        }
    }

    pub fn instruments(&self) -> &BTreeSet<Instrument> {
        &self.instruments
    }

    /// Number of instruments processed concurrently for a set of `count`
    pub fn worker_cap(&self, count: usize) -> usize {
        self.pipeline.settings.max_workers.min(count).max(1)
    }

    /// Run fetch → detect → notify for every instrument. Never fails; errors
    /// are logged per instrument.
    pub async fn run_cycle(&self, instruments: &BTreeSet<Instrument>) {
        if instruments.is_empty() {
            warn!("No instruments configured, nothing to analyse");
            return;
        }

        let workers = self.worker_cap(instruments.len());
        info!(
            symbols = instruments.len(),
            workers,
            "Starting market structure analysis..."
        );

        let permits = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();

        for instrument in instruments.iter().cloned() {
            let permits = permits.clone();
            let pipeline = self.pipeline.clone();
            tasks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => pipeline.process(&instrument).await,
                    Err(_) => Ok(InstrumentOutcome::NoData),
                };
                (instrument, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((instrument, Ok(outcome))) => log_outcome(&instrument, outcome),
                Ok((instrument, Err(e))) => {
                    error!(symbol = %instrument, error = %e, "Skipping {} this cycle", instrument);
                }
                Err(e) => {
                    error!(error = %e, "Instrument task aborted");
                }
            }
        }

        info!("Market structure analysis completed.");
    }
}

fn log_outcome(instrument: &Instrument, outcome: InstrumentOutcome) {
    match outcome {
        InstrumentOutcome::NoData => {
            warn!(symbol = %instrument, "No data fetched for {}", instrument);
        }
        InstrumentOutcome::WarmingUp { bars } => {
            warn!(symbol = %instrument, bars, "Insufficient data for analysis of {}", instrument);
        }
        InstrumentOutcome::NoShift => {
            debug!(symbol = %instrument, "No structure shift for {}", instrument);
        }
        InstrumentOutcome::Alerted(Delivery::Sent) => {
            debug!(symbol = %instrument, "Alert delivered for {}", instrument);
        }
        InstrumentOutcome::Alerted(Delivery::Skipped) => {
            debug!(
                symbol = %instrument,
                "Alert not delivered for {}: no target configured",
                instrument
            );
        }
    }
}

#[async_trait::async_trait]
impl CycleRunner for CycleOrchestrator {
    async fn tick(&self) {
        self.run_cycle(&self.instruments).await;
    }
}
