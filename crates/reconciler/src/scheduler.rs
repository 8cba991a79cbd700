//! Periodic sync scheduler.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::SyncConfig;
use crate::error::Result;
use crate::types::CycleReport;

/// One unit of work the scheduler runs on every tick.
#[async_trait]
pub trait SyncCycle: Send {
    /// Run a full cycle.
    async fn run_cycle(&mut self) -> Result<CycleReport>;
}

/// When cycles run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Wait before the first cycle.
    pub initial_delay: Duration,
    /// Period between cycle starts. Zero runs a single cycle.
    pub sync_interval: Duration,
}

impl From<&SyncConfig> for Schedule {
    fn from(config: &SyncConfig) -> Self {
        Self {
            initial_delay: config.initial_delay,
            sync_interval: config.sync_interval,
        }
    }
}

/// Drives a [`SyncCycle`] on a fixed schedule until stopped.
///
/// A cycle that outlasts the interval delays the next one; missed ticks
/// are dropped, so at most one cycle is ever in flight. Stopping never
/// interrupts a running cycle.
pub struct SyncScheduler<C> {
    cycle: C,
    schedule: Schedule,
    stop_rx: watch::Receiver<bool>,
    stop_tx: watch::Sender<bool>,
}

impl<C: SyncCycle> SyncScheduler<C> {
    /// Create a scheduler.
    pub fn new(cycle: C, schedule: Schedule) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            cycle,
            schedule,
            stop_rx,
            stop_tx,
        }
    }

    /// Get a stopper handle.
    #[must_use]
    pub fn stopper(&self) -> SchedulerStopper {
        SchedulerStopper {
            stop_tx: self.stop_tx.clone(),
        }
    }

    /// Stop the scheduler.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Consume the scheduler and return its cycle.
    pub fn into_inner(self) -> C {
        self.cycle
    }

    /// Run until stopped. Returns the number of cycles run.
    pub async fn run(&mut self) -> usize {
        info!(
            initial_delay_secs = self.schedule.initial_delay.as_secs(),
            sync_interval_secs = self.schedule.sync_interval.as_secs(),
            "Starting sync scheduler"
        );

        let mut stop = self.stop_rx.clone();

        tokio::select! {
            biased;
            () = stopped(&mut stop) => {
                info!("Sync scheduler stopped before first sync");
                return 0;
            }
            () = tokio::time::sleep(self.schedule.initial_delay) => {}
        }

        self.run_once().await;
        let mut cycles = 1;

        let period = self.schedule.sync_interval;
        if period.is_zero() {
            info!("Sync interval is 0, running once and exiting");
            return cycles;
        }

        let Some(first_tick) = Instant::now().checked_add(period) else {
            warn!(
                sync_interval_secs = period.as_secs(),
                "Sync interval too large to schedule, waiting for stop"
            );
            stopped(&mut stop).await;
            info!(cycles, "Sync scheduler stopped");
            return cycles;
        };
        let mut ticker = tokio::time::interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = stopped(&mut stop) => {
                    info!(cycles, "Sync scheduler stopped");
                    return cycles;
                }
                _ = ticker.tick() => {
                    self.run_once().await;
                    cycles += 1;
                }
            }
        }
    }

    async fn run_once(&mut self) {
        match self.cycle.run_cycle().await {
            Ok(report) if report.is_success() => {
                info!(mode = ?report.mode(), "Sync cycle finished");
            }
            Ok(report) => {
                warn!(
                    mode = ?report.mode(),
                    gave_up = ?report.gave_up_quorums(),
                    "Sync cycle finished with failures"
                );
            }
            Err(e) => {
                error!(error = %e, "Sync cycle failed");
            }
        }
    }
}

async fn stopped(stop: &mut watch::Receiver<bool>) {
    // the sender lives in the scheduler, so this only returns once stop is set
    let _ = stop.wait_for(|stopped| *stopped).await;
}

/// Handle to stop a [`SyncScheduler`] from another task.
#[derive(Clone)]
pub struct SchedulerStopper {
    stop_tx: watch::Sender<bool>,
}

impl SchedulerStopper {
    /// Stop the scheduler after any in-flight cycle completes.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Whether a stop was requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Probe {
        runs: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    struct CountingCycle {
        probe: Arc<Probe>,
        duration: Duration,
        fail: bool,
    }

    impl CountingCycle {
        fn new(probe: Arc<Probe>) -> Self {
            Self {
                probe,
                duration: Duration::ZERO,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl SyncCycle for CountingCycle {
        async fn run_cycle(&mut self) -> Result<CycleReport> {
            let now = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.probe.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.probe.runs.fetch_add(1, Ordering::SeqCst);

            if !self.duration.is_zero() {
                tokio::time::sleep(self.duration).await;
            }
            self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                return Err(Error::cycle_failed("injected"));
            }
            Ok(CycleReport::FullSet {
                quorums: Vec::new(),
                outcomes: Vec::new(),
            })
        }
    }

    fn schedule(initial_delay: u64, sync_interval: u64) -> Schedule {
        Schedule {
            initial_delay: Duration::from_secs(initial_delay),
            sync_interval: Duration::from_secs(sync_interval),
        }
    }

    async fn run_until(
        mut scheduler: SyncScheduler<CountingCycle>,
        stop_after: Duration,
    ) -> usize {
        let stopper = scheduler.stopper();
        let handle = tokio::spawn(async move { scheduler.run().await });

        tokio::time::sleep(stop_after).await;
        stopper.stop();

        handle.await.unwrap_or(usize::MAX)
    }

    #[test]
    fn test_schedule_from_config() {
        let config = SyncConfig::dynamic()
            .initial_delay(Duration::from_secs(30))
            .sync_interval(Duration::from_secs(60));
        assert_eq!(Schedule::from(&config), schedule(30, 60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_run_on_interval() {
        let probe = Arc::new(Probe::default());
        let scheduler = SyncScheduler::new(CountingCycle::new(probe.clone()), schedule(0, 10));

        // t = 0, 10, 20, 30
        let cycles = run_until(scheduler, Duration::from_secs(35)).await;

        assert_eq!(cycles, 4);
        assert_eq!(probe.runs.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_runs_once_and_returns() {
        let probe = Arc::new(Probe::default());
        let mut scheduler =
            SyncScheduler::new(CountingCycle::new(probe.clone()), schedule(0, 0));

        assert_eq!(scheduler.run().await, 1);
        assert_eq!(probe.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrunning_cycle_never_overlaps() {
        let probe = Arc::new(Probe::default());
        let mut cycle = CountingCycle::new(probe.clone());
        cycle.duration = Duration::from_secs(25);
        let scheduler = SyncScheduler::new(cycle, schedule(0, 10));

        let cycles = run_until(scheduler, Duration::from_secs(70)).await;

        assert!((2..=3).contains(&cycles), "ran {cycles} cycles");
        assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(probe.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_cycle_does_not_stop_scheduler() {
        let probe = Arc::new(Probe::default());
        let mut cycle = CountingCycle::new(probe.clone());
        cycle.fail = true;
        let scheduler = SyncScheduler::new(cycle, schedule(0, 10));

        let cycles = run_until(scheduler, Duration::from_secs(25)).await;

        assert_eq!(cycles, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unschedulable_interval_runs_once_then_waits_for_stop() {
        let probe = Arc::new(Probe::default());
        let scheduler =
            SyncScheduler::new(CountingCycle::new(probe.clone()), schedule(0, u64::MAX));

        let cycles = run_until(scheduler, Duration::from_millis(50)).await;

        assert_eq!(cycles, 1);
        assert_eq!(probe.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_initial_delay() {
        let probe = Arc::new(Probe::default());
        let scheduler = SyncScheduler::new(CountingCycle::new(probe.clone()), schedule(100, 10));

        let cycles = run_until(scheduler, Duration::from_secs(50)).await;

        assert_eq!(cycles, 0);
        assert_eq!(probe.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_requested_before_run() {
        let probe = Arc::new(Probe::default());
        let mut scheduler =
            SyncScheduler::new(CountingCycle::new(probe.clone()), schedule(0, 10));
        let stopper = scheduler.stopper();

        stopper.stop();
        assert!(stopper.is_stopped());
        assert_eq!(scheduler.run().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_in_flight_cycle() {
        let probe = Arc::new(Probe::default());
        let mut cycle = CountingCycle::new(probe.clone());
        cycle.duration = Duration::from_secs(30);
        let scheduler = SyncScheduler::new(cycle, schedule(0, 60));

        let start = Instant::now();
        let cycles = run_until(scheduler, Duration::from_secs(5)).await;

        assert_eq!(cycles, 1);
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert_eq!(probe.in_flight.load(Ordering::SeqCst), 0);
    }
}
