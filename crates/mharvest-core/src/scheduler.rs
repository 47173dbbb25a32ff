//! Periodic, non-overlapping harvest cycles.
//!
//! ```text
//!   tick ──► in flight? ──yes──► ticks_skipped += 1
//!                │
//!                no
//!                ▼
//!         spawn run_cycle ──► collector 1 ──► collector 2 ──► ... (one shared deadline)
//! ```
//!
//! The first tick fires immediately. A tick that arrives while the previous
//! cycle is still running is dropped, never queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::collector::{CollectContext, CollectReport, Collector};
use crate::metrics::{
    HARVEST_COLLECTOR_DURATION, HARVEST_COLLECTOR_FAILED_STEPS, HARVEST_COLLECTOR_PARSE_WARNINGS,
    HARVEST_CYCLES_COMPLETED, HARVEST_CYCLES_TIMED_OUT, HARVEST_LAST_CYCLE_DURATION,
    HARVEST_LAST_CYCLE_TIMESTAMP, HARVEST_TICKS_SKIPPED,
};
use crate::registry::{GaugeSeries, SeriesSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Collecting,
    Stopped,
}

/// Result of one collection cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub reports: Vec<CollectReport>,
    pub duration: Duration,
    /// Collector that was running when the cycle deadline hit.
    pub abandoned: Option<String>,
    /// Collectors that never started because the deadline hit first.
    pub skipped: Vec<String>,
}

impl CycleOutcome {
    pub fn timed_out(&self) -> bool {
        self.abandoned.is_some()
    }
}

// ============ Self-metrics ============

/// Point-in-time view of the scheduler counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarvestSummary {
    pub cycles_completed: u64,
    pub cycles_timed_out: u64,
    pub ticks_skipped: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// Counters about the harvester itself, exposed like any other source.
pub struct HarvestStats {
    completed: AtomicU64,
    timed_out: AtomicU64,
    skipped: AtomicU64,
    last_cycle_at: RwLock<Option<DateTime<Utc>>>,

    cycles_completed: GaugeSeries,
    cycles_timed_out: GaugeSeries,
    ticks_skipped: GaugeSeries,
    last_cycle_duration: GaugeSeries,
    last_cycle_timestamp: GaugeSeries,
    collector_duration: GaugeSeries,
    collector_failed_steps: GaugeSeries,
    collector_parse_warnings: GaugeSeries,
}

impl Default for HarvestStats {
    fn default() -> Self {
        Self::new()
    }
}

impl HarvestStats {
    pub fn new() -> Self {
        let stats = Self {
            completed: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            last_cycle_at: RwLock::new(None),
            cycles_completed: GaugeSeries::new(HARVEST_CYCLES_COMPLETED),
            cycles_timed_out: GaugeSeries::new(HARVEST_CYCLES_TIMED_OUT),
            ticks_skipped: GaugeSeries::new(HARVEST_TICKS_SKIPPED),
            last_cycle_duration: GaugeSeries::new(HARVEST_LAST_CYCLE_DURATION),
            last_cycle_timestamp: GaugeSeries::new(HARVEST_LAST_CYCLE_TIMESTAMP),
            collector_duration: GaugeSeries::new(HARVEST_COLLECTOR_DURATION),
            collector_failed_steps: GaugeSeries::new(HARVEST_COLLECTOR_FAILED_STEPS),
            collector_parse_warnings: GaugeSeries::new(HARVEST_COLLECTOR_PARSE_WARNINGS),
        };
        // Counters read 0 from the first scrape on.
        set_scalar(&stats.cycles_completed, 0.0);
        set_scalar(&stats.cycles_timed_out, 0.0);
        set_scalar(&stats.ticks_skipped, 0.0);
        stats
    }

    pub fn summary(&self) -> HarvestSummary {
        HarvestSummary {
            cycles_completed: self.completed.load(Ordering::Relaxed),
            cycles_timed_out: self.timed_out.load(Ordering::Relaxed),
            ticks_skipped: self.skipped.load(Ordering::Relaxed),
            last_cycle_at: *self
                .last_cycle_at
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }

    fn record_skipped_tick(&self) -> u64 {
        let total = self.skipped.fetch_add(1, Ordering::Relaxed) + 1;
        set_scalar(&self.ticks_skipped, total as f64);
        total
    }

    fn record_collector(&self, report: &CollectReport) {
        let labels = [report.collector.as_str()];
        let _ = self
            .collector_duration
            .set(&labels, report.duration.as_secs_f64());
        let _ = self
            .collector_failed_steps
            .set(&labels, report.failed_steps() as f64);
        let _ = self
            .collector_parse_warnings
            .set(&labels, report.parse_warnings() as f64);
    }

    fn record_cycle(&self, outcome: &CycleOutcome) {
        if outcome.timed_out() {
            let total = self.timed_out.fetch_add(1, Ordering::Relaxed) + 1;
            set_scalar(&self.cycles_timed_out, total as f64);
        } else {
            let total = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
            set_scalar(&self.cycles_completed, total as f64);
        }

        let now = Utc::now();
        set_scalar(&self.last_cycle_duration, outcome.duration.as_secs_f64());
        set_scalar(
            &self.last_cycle_timestamp,
            now.timestamp_millis() as f64 / 1000.0,
        );
        *self
            .last_cycle_at
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(now);
    }
}

fn set_scalar(series: &GaugeSeries, value: f64) {
    // An unlabelled series accepts an empty label set.
    let _ = series.set::<&str>(&[], value);
}

impl SeriesSource for HarvestStats {
    fn name(&self) -> &str {
        "harvester"
    }

    fn series(&self) -> Vec<&GaugeSeries> {
        vec![
            &self.cycles_completed,
            &self.cycles_timed_out,
            &self.ticks_skipped,
            &self.last_cycle_duration,
            &self.last_cycle_timestamp,
            &self.collector_duration,
            &self.collector_failed_steps,
            &self.collector_parse_warnings,
        ]
    }
}

// ============ Scheduler ============

pub struct HarvestScheduler {
    collectors: Vec<Arc<dyn Collector>>,
    interval: Duration,
    cycle_timeout: Duration,
    shutdown_timeout: Duration,
    stats: Arc<HarvestStats>,
    state: watch::Sender<SchedulerState>,
}

impl HarvestScheduler {
    pub fn new(
        collectors: Vec<Arc<dyn Collector>>,
        interval: Duration,
        cycle_timeout: Duration,
        shutdown_timeout: Duration,
        stats: Arc<HarvestStats>,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            collectors,
            interval,
            cycle_timeout,
            shutdown_timeout,
            stats,
            state,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> &Arc<HarvestStats> {
        &self.stats
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn collector_names(&self) -> Vec<String> {
        self.collectors.iter().map(|c| c.name().to_string()).collect()
    }

    fn set_state(&self, next: SchedulerState) {
        self.state.send_if_modified(|current| {
            if *current == SchedulerState::Stopped || *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    /// Ticks until `cancel` fires, then gives the in-flight cycle
    /// `shutdown_timeout` to finish before aborting it.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: Option<JoinHandle<CycleOutcome>> = None;

        info!(
            interval_ms = self.interval.as_millis() as u64,
            cycle_timeout_ms = self.cycle_timeout.as_millis() as u64,
            collectors = ?self.collector_names(),
            "harvest scheduler started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }

            if let Some(handle) = &in_flight {
                if !handle.is_finished() {
                    let skipped = self.stats.record_skipped_tick();
                    warn!(ticks_skipped = skipped, "previous cycle still running, tick skipped");
                    continue;
                }
            }
            if let Some(handle) = in_flight.take() {
                log_join(handle.await);
            }

            let this = Arc::clone(&self);
            in_flight = Some(tokio::spawn(async move { this.run_cycle().await }));
        }

        if let Some(mut handle) = in_flight.take() {
            if !handle.is_finished() {
                info!(
                    timeout_ms = self.shutdown_timeout.as_millis() as u64,
                    "waiting for in-flight cycle"
                );
            }
            match tokio::time::timeout(self.shutdown_timeout, &mut handle).await {
                Ok(result) => log_join(result),
                Err(_) => {
                    warn!("in-flight cycle did not finish before shutdown timeout, aborting");
                    handle.abort();
                }
            }
        }

        self.state.send_replace(SchedulerState::Stopped);
        info!(summary = ?self.stats.summary(), "harvest scheduler stopped");
    }

    /// Runs every collector once, in order, under one deadline.
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.set_state(SchedulerState::Collecting);
        let _idle_on_exit = IdleOnDrop(self);
        let started = Instant::now();
        let deadline = started + self.cycle_timeout;
        let ctx = CollectContext::new(deadline);

        let mut reports = Vec::with_capacity(self.collectors.len());
        let mut abandoned = None;
        let mut skipped = Vec::new();

        for collector in &self.collectors {
            if abandoned.is_some() {
                skipped.push(collector.name().to_string());
                continue;
            }
            match tokio::time::timeout_at(deadline, collector.collect_once(&ctx)).await {
                Ok(report) => {
                    self.stats.record_collector(&report);
                    reports.push(report);
                }
                Err(_) => abandoned = Some(collector.name().to_string()),
            }
        }

        let outcome = CycleOutcome {
            reports,
            duration: started.elapsed(),
            abandoned,
            skipped,
        };
        self.stats.record_cycle(&outcome);
        self.log_cycle(&outcome);
        outcome
    }

    fn log_cycle(&self, outcome: &CycleOutcome) {
        let duration_ms = outcome.duration.as_millis() as u64;
        let failed_steps: usize = outcome.reports.iter().map(|r| r.failed_steps()).sum();

        if let Some(collector) = &outcome.abandoned {
            warn!(
                duration_ms,
                collector = %collector,
                skipped = ?outcome.skipped,
                "cycle deadline exceeded"
            );
        } else if self.stats.summary().cycles_completed == 1 {
            info!(duration_ms, failed_steps, "first collection cycle completed");
        } else {
            debug!(duration_ms, failed_steps, "collection cycle completed");
        }

        if outcome.duration > self.interval / 2 {
            warn!(
                duration_ms,
                interval_ms = self.interval.as_millis() as u64,
                "cycle exceeded 50% of interval"
            );
        }
    }
}

/// Returns the scheduler to `Idle` when a cycle ends, including when a
/// collector panics or the cycle task is aborted.
struct IdleOnDrop<'a>(&'a HarvestScheduler);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.set_state(SchedulerState::Idle);
    }
}

fn log_join(result: Result<CycleOutcome, JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!(error = %e, "collection cycle panicked");
        }
    }
}
