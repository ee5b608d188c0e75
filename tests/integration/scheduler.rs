//! Scheduler timing under tokio's paused clock

use crate::test_utils::FakeClock;
use chrono::{NaiveTime, TimeZone, Utc};
use chrono_tz::America::New_York;
use shiftwatch::core::scheduler::{
    CycleRunner, Scheduler, SchedulerFault, SchedulerSettings, StartGate, TradingSession,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Runner that records when each cycle started and whether cycles overlapped
struct ProbeRunner {
    work: Duration,
    panic_on: Option<usize>,
    starts: Mutex<Vec<Instant>>,
    busy: AtomicBool,
    overlaps: AtomicUsize,
}

impl ProbeRunner {
    fn new(work: Duration) -> Self {
        Self {
            work,
            panic_on: None,
            starts: Mutex::new(Vec::new()),
            busy: AtomicBool::new(false),
            overlaps: AtomicUsize::new(0),
        }
    }

    fn panicking_on(mut self, cycle: usize) -> Self {
        self.panic_on = Some(cycle);
        self
    }

    fn starts(&self) -> Vec<Instant> {
        self.starts.lock().unwrap().clone()
    }

    fn gaps(&self) -> Vec<Duration> {
        self.starts()
            .windows(2)
            .map(|w| w[1].duration_since(w[0]))
            .collect()
    }
}

#[async_trait::async_trait]
impl CycleRunner for ProbeRunner {
    async fn tick(&self) {
        let cycle = {
            let mut starts = self.starts.lock().unwrap();
            starts.push(Instant::now());
            starts.len()
        };

        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        tokio::time::sleep(self.work).await;
        self.busy.store(false, Ordering::SeqCst);

        if self.panic_on == Some(cycle) {
            panic!("cycle {cycle} blew up");
        }
    }
}

fn settings(period: Duration, gate: StartGate) -> SchedulerSettings {
    SchedulerSettings {
        period,
        gate,
        timezone: New_York,
        gate_poll: Duration::from_secs(60),
        cooldown: Duration::from_secs(30),
    }
}

/// Clock sitting exactly on a 10s, 15m and hourly boundary
fn aligned_clock() -> Arc<FakeClock> {
    Arc::new(FakeClock::starting_at(
        Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap(),
    ))
}

#[tokio::test(start_paused = true)]
async fn test_cycles_fire_on_period() {
    let runner = Arc::new(ProbeRunner::new(Duration::from_secs(2)));
    let scheduler = Scheduler::new(
        runner.clone(),
        settings(Duration::from_secs(10), StartGate::IntervalBoundary),
    )
    .unwrap()
    .with_clock(aligned_clock());

    let origin = Instant::now();
    scheduler.run_cycles(3).await;

    let starts = runner.starts();
    assert_eq!(starts.len(), 3);
    assert!(starts[0].duration_since(origin) < Duration::from_secs(1));
    for gap in runner.gaps() {
        assert!(gap >= Duration::from_secs(10), "gap {gap:?}");
        assert!(gap < Duration::from_secs(11), "gap {gap:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_overrunning_cycles_never_overlap() {
    let runner = Arc::new(ProbeRunner::new(Duration::from_secs(25)));
    let scheduler = Scheduler::new(
        runner.clone(),
        settings(Duration::from_secs(10), StartGate::IntervalBoundary),
    )
    .unwrap()
    .with_clock(aligned_clock());

    scheduler.run_cycles(4).await;

    assert_eq!(runner.starts().len(), 4);
    assert_eq!(runner.overlaps.load(Ordering::SeqCst), 0);
    for gap in runner.gaps() {
        assert!(gap >= Duration::from_secs(25), "gap {gap:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_panicking_cycle_recovers_after_cooldown() {
    let runner = Arc::new(ProbeRunner::new(Duration::from_secs(1)).panicking_on(2));
    let scheduler = Scheduler::new(
        runner.clone(),
        settings(Duration::from_secs(10), StartGate::IntervalBoundary),
    )
    .unwrap()
    .with_clock(aligned_clock());

    scheduler.run_cycles(4).await;

    let gaps = runner.gaps();
    assert_eq!(runner.starts().len(), 4);
    assert!(gaps[0] >= Duration::from_secs(10));
    // Cycle 2 ran 1s before panicking, then the 30s cooldown
    assert!(gaps[1] >= Duration::from_secs(31), "gap {:?}", gaps[1]);
    assert!(gaps[2] >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_interval_gate_waits_for_boundary() {
    // 09:07:30 EST, next 15m boundary is 09:15:00
    let clock = Arc::new(FakeClock::starting_at(
        Utc.with_ymd_and_hms(2024, 3, 4, 14, 7, 30).unwrap(),
    ));
    let runner = Arc::new(ProbeRunner::new(Duration::from_secs(1)));
    let scheduler = Scheduler::new(
        runner.clone(),
        settings(Duration::from_secs(15 * 60), StartGate::IntervalBoundary),
    )
    .unwrap()
    .with_clock(clock);

    let origin = Instant::now();
    scheduler.run_cycles(1).await;

    let waited = runner.starts()[0].duration_since(origin);
    assert!(waited >= Duration::from_secs(450), "waited {waited:?}");
    assert!(waited < Duration::from_secs(451), "waited {waited:?}");
}

fn regular_session() -> StartGate {
    StartGate::TradingSession(TradingSession {
        open: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        close: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
    })
}

#[tokio::test(start_paused = true)]
async fn test_session_gate_polls_until_open() {
    // Monday 09:20 EST
    let clock = Arc::new(FakeClock::starting_at(
        Utc.with_ymd_and_hms(2024, 3, 4, 14, 20, 0).unwrap(),
    ));
    let runner = Arc::new(ProbeRunner::new(Duration::from_secs(1)));
    let scheduler = Scheduler::new(
        runner.clone(),
        settings(Duration::from_secs(15 * 60), regular_session()),
    )
    .unwrap()
    .with_clock(clock);

    let origin = Instant::now();
    scheduler.run_cycles(1).await;

    let waited = runner.starts()[0].duration_since(origin);
    assert!(waited >= Duration::from_secs(600), "waited {waited:?}");
    assert!(waited < Duration::from_secs(601), "waited {waited:?}");
}

#[tokio::test(start_paused = true)]
async fn test_session_gate_skips_weekend() {
    // Saturday 10:00 EST, session reopens Monday 09:30 EST
    let clock = Arc::new(FakeClock::starting_at(
        Utc.with_ymd_and_hms(2024, 3, 2, 15, 0, 0).unwrap(),
    ));
    let runner = Arc::new(ProbeRunner::new(Duration::from_secs(1)));
    let scheduler = Scheduler::new(
        runner.clone(),
        settings(Duration::from_secs(15 * 60), regular_session()),
    )
    .unwrap()
    .with_clock(clock);

    let origin = Instant::now();
    scheduler.run_cycles(1).await;

    let waited = runner.starts()[0].duration_since(origin);
    let reopen = Duration::from_secs(47 * 3600 + 1800);
    assert!(waited >= reopen, "waited {waited:?}");
    assert!(waited < reopen + Duration::from_secs(60), "waited {waited:?}");
}

#[test]
fn test_zero_period_is_rejected() {
    let runner = Arc::new(ProbeRunner::new(Duration::ZERO));
    let result = Scheduler::new(runner, settings(Duration::ZERO, StartGate::IntervalBoundary));
    assert!(matches!(result, Err(SchedulerFault::ZeroPeriod)));
}
