//! Cycle scheduler.
//!
//! Waits for a start gate, then fires cycles on a fixed period forever.
//! Cycles never overlap: a cycle that overruns its period swallows the
//! missed ticks and the next one starts a full period later at the earliest.

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{Config, StartGateKind};
use crate::core::clock::{Clock, SystemClock};

/// Work fired on every scheduler tick. Implementations must not fail; the
/// scheduler only observes panics.
#[async_trait::async_trait]
pub trait CycleRunner: Send + Sync + 'static {
    async fn tick(&self);
}

#[derive(Debug, Error)]
pub enum SchedulerFault {
    #[error("scheduler period must be greater than zero")]
    ZeroPeriod,
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidSchedule { expr: String, reason: String },
    #[error("schedule '{0}' has no upcoming boundary")]
    NoUpcomingBoundary(String),
    #[error("cycle task aborted: {0}")]
    CycleAborted(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    WaitingForStart,
    Running,
    Recovering,
}

/// Weekday session in local time, `[open, close)`. A close earlier than the
/// open describes a session spanning midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingSession {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl TradingSession {
    pub fn is_open<Z: TimeZone>(&self, at: &DateTime<Z>) -> bool {
        if matches!(at.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }

        let time = at.time();
        if self.open <= self.close {
            time >= self.open && time < self.close
        } else {
            time >= self.open || time < self.close
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartGate {
    /// Start on the next boundary of the cycle period
    IntervalBoundary,
    /// Start once the trading session is open
    TradingSession(TradingSession),
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub period: Duration,
    pub gate: StartGate,
    pub timezone: Tz,
    /// How often the session gate is re-checked
    pub gate_poll: Duration,
    /// Pause after a scheduler fault before resuming
    pub cooldown: Duration,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        let gate = match config.schedule.start {
            StartGateKind::Interval => StartGate::IntervalBoundary,
            StartGateKind::MarketHours => StartGate::TradingSession(TradingSession {
                open: config.schedule.market_open,
                close: config.schedule.market_close,
            }),
        };

        Self {
            period: config.interval.period(),
            gate,
            timezone: config.timezone,
            gate_poll: Duration::from_secs(config.schedule.poll_secs.max(1)),
            cooldown: Duration::from_secs(config.schedule.cooldown_secs),
        }
    }
}

/// Cron expression whose fire times are the boundaries of `period`.
///
/// Periods that do not fit a cron field fall back to the next coarser unit
/// (top of the hour, midnight).
pub fn interval_cron_expression(period: Duration) -> Result<String, SchedulerFault> {
    let secs = period.as_secs();
    if secs == 0 {
        return Err(SchedulerFault::ZeroPeriod);
    }

    // Cron format: second minute hour day month weekday
    let expr = if secs < 60 {
        format!("*/{} * * * * *", secs)
    } else if secs < 3_600 {
        format!("0 */{} * * * *", secs / 60)
    } else if secs < 86_400 && secs % 3_600 == 0 {
        format!("0 0 */{} * * *", secs / 3_600)
    } else if secs < 86_400 {
        "0 0 * * * *".to_string()
    } else {
        "0 0 0 * * *".to_string()
    };

    Ok(expr)
}

/// First boundary of `period` in `timezone` that is not earlier than one
/// second before `now`. A start that is already on the boundary fires
/// immediately.
pub fn next_interval_boundary(
    now: DateTime<Utc>,
    period: Duration,
    timezone: Tz,
) -> Result<DateTime<Utc>, SchedulerFault> {
    let expr = interval_cron_expression(period)?;
    let schedule = Schedule::from_str(&expr).map_err(|e| SchedulerFault::InvalidSchedule {
        expr: expr.clone(),
        reason: e.to_string(),
    })?;

    let local = now.with_timezone(&timezone);
    let next = schedule
        .after(&(local - chrono::Duration::seconds(1)))
        .next()
        .ok_or(SchedulerFault::NoUpcomingBoundary(expr))?;

    Ok(next.with_timezone(&Utc).max(now))
}

pub struct Scheduler<R> {
    runner: Arc<R>,
    settings: SchedulerSettings,
    clock: Arc<dyn Clock>,
}

impl<R: CycleRunner> Scheduler<R> {
    pub fn new(runner: Arc<R>, settings: SchedulerSettings) -> Result<Self, SchedulerFault> {
        if settings.period.is_zero() {
            return Err(SchedulerFault::ZeroPeriod);
        }

        info!(
            period_secs = settings.period.as_secs(),
            gate = ?settings.gate,
            timezone = %settings.timezone,
            "Scheduler: created"
        );

        Ok(Self {
            runner,
            settings,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Gate, then run cycles until the process is killed
    pub async fn run(&self) {
        self.drive(None).await;
    }

    /// Gate, then run exactly `cycles` cycles (faults included) and return
    pub async fn run_cycles(&self, cycles: u64) {
        self.drive(Some(cycles)).await;
    }

    async fn drive(&self, limit: Option<u64>) {
        let mut state = SchedulerState::WaitingForStart;
        let mut ticker: Option<Interval> = None;
        let mut fired: u64 = 0;

        loop {
            debug!(state = ?state, "Scheduler: state transition");
            state = match state {
                SchedulerState::WaitingForStart => match self.wait_for_gate().await {
                    Ok(()) => SchedulerState::Running,
                    Err(fault) => {
                        error!(error = %fault, "Scheduler: start gate failed");
                        SchedulerState::Recovering
                    }
                },
                SchedulerState::Running => {
                    let ticker = ticker.get_or_insert_with(|| self.new_ticker());
                    match self.run_ticks(ticker, &mut fired, limit).await {
                        Ok(()) => return,
                        Err(fault) => {
                            error!(error = %fault, cycle = fired, "Scheduler: fault during cycle");
                            SchedulerState::Recovering
                        }
                    }
                }
                SchedulerState::Recovering => {
                    if limit.is_some_and(|max| fired >= max) {
                        return;
                    }
                    warn!(
                        cooldown_secs = self.settings.cooldown.as_secs(),
                        "Scheduler: cooling down before resuming"
                    );
                    tokio::time::sleep(self.settings.cooldown).await;
                    if ticker.is_some() {
                        SchedulerState::Running
                    } else {
                        SchedulerState::WaitingForStart
                    }
                }
            };
        }
    }

    fn new_ticker(&self) -> Interval {
        let mut ticker = tokio::time::interval(self.settings.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    async fn wait_for_gate(&self) -> Result<(), SchedulerFault> {
        let timezone = self.settings.timezone;

        match self.settings.gate {
            StartGate::IntervalBoundary => {
                let now = self.clock.now();
                let wake = next_interval_boundary(now, self.settings.period, timezone)?;
                let delay = (wake - now).to_std().unwrap_or_default();
                info!(
                    start = %wake.with_timezone(&timezone),
                    wait_secs = delay.as_secs(),
                    "Scheduler: waiting for interval boundary"
                );
                tokio::time::sleep(delay).await;
            }
            StartGate::TradingSession(session) => loop {
                let local = self.clock.now().with_timezone(&timezone);
                if session.is_open(&local) {
                    info!(at = %local, "Scheduler: trading session open");
                    break;
                }
                debug!(at = %local, "Scheduler: market closed, waiting");
                tokio::time::sleep(self.settings.gate_poll).await;
            },
        }

        Ok(())
    }

    async fn run_ticks(
        &self,
        ticker: &mut Interval,
        fired: &mut u64,
        limit: Option<u64>,
    ) -> Result<(), SchedulerFault> {
        loop {
            if limit.is_some_and(|max| *fired >= max) {
                return Ok(());
            }

            ticker.tick().await;
            *fired += 1;

            let started = tokio::time::Instant::now();
            info!(cycle = *fired, "Scheduler: tick, running cycle");

            let runner = self.runner.clone();
            tokio::spawn(async move { runner.tick().await }).await?;

            debug!(
                cycle = *fired,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Scheduler: cycle finished"
            );
        }
    }
}
