//! Collectors: one per domain, each owning a fixed set of series.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        HarvestScheduler                      │
//! │   ┌──────────────────┐ ┌──────────────────┐ ┌─────────────┐  │
//! │   │ SystemCollector  │ │ContainerCollector│ │ Network...  │  │
//! │   │ cpu/mem/disk/up  │ │ docker / podman  │ │ ifaces/ping │  │
//! │   └────────┬─────────┘ └────────┬─────────┘ └──────┬──────┘  │
//! │            └────────────────────┼──────────────────┘         │
//! │                          ┌──────▼──────┐                     │
//! │                          │  Executor   │ (trait)             │
//! │                          └──────┬──────┘                     │
//! └─────────────────────────────────┼────────────────────────────┘
//!                    ┌──────────────┴──────────────┐
//!             ┌──────▼───────┐              ┌──────▼───────┐
//!             │SystemExecutor│              │ MockExecutor │
//!             │ (processes)  │              │ (scenarios)  │
//!             └──────────────┘              └──────────────┘
//! ```
//!
//! # Testing
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use mharvest_core::collector::{CollectContext, Collector, SystemCollector};
//! use mharvest_core::config::MetricsConfig;
//! use mharvest_core::executor::MockExecutor;
//! use mharvest_core::probe::{Platform, SystemProbes};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//! let exec = Arc::new(MockExecutor::typical_linux());
//! let probes = SystemProbes::for_platform(Platform::Linux);
//! let collector = SystemCollector::new(exec, probes, &MetricsConfig::default());
//! let report = collector.collect_once(&CollectContext::within(Duration::from_secs(5))).await;
//! assert_eq!(report.failed_steps(), 0);
//! # });
//! ```

mod container;
mod network;
mod system;

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::executor::{CommandExecutor, ExecError};
use crate::parser::ParseOutput;
use crate::probe::CommandSpec;
use crate::registry::SeriesSource;

pub use container::{ContainerCollector, Runtime};
pub use network::NetworkCollector;
pub use system::SystemCollector;

/// Uniform contract driven by the scheduler.
///
/// `collect_once` never fails as a whole: every step is best-effort and the
/// returned report says what happened to each one.
#[async_trait]
pub trait Collector: SeriesSource {
    async fn collect_once(&self, ctx: &CollectContext) -> CollectReport;
}

/// Time budget of the cycle a collector runs in.
#[derive(Debug, Clone, Copy)]
pub struct CollectContext {
    deadline: Instant,
}

impl CollectContext {
    pub fn new(deadline: Instant) -> Self {
        Self { deadline }
    }

    /// A context whose deadline is `budget` from now.
    pub fn within(budget: Duration) -> Self {
        Self::new(Instant::now() + budget)
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Deadline for one command: its own timeout, but never past the cycle.
    pub fn command_deadline(&self, per_command: Duration) -> Duration {
        per_command.min(self.remaining())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Ok { samples: usize, warnings: usize },
    Failed(String),
    Skipped(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub step: String,
    pub outcome: StepOutcome,
}

/// What one `collect_once` pass did, step by step.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectReport {
    pub collector: String,
    pub steps: Vec<StepReport>,
    pub duration: Duration,
}

impl CollectReport {
    pub fn new(collector: impl Into<String>) -> Self {
        Self {
            collector: collector.into(),
            steps: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Records a step outcome. Failures are logged here so every collector
    /// reports them the same way.
    pub fn push(&mut self, step: impl Into<String>, outcome: StepOutcome) {
        let step = step.into();
        match &outcome {
            StepOutcome::Failed(error) => {
                warn!(collector = %self.collector, step = %step, error = %error, "collection step failed");
            }
            StepOutcome::Skipped(reason) => {
                debug!(collector = %self.collector, step = %step, reason, "collection step skipped");
            }
            StepOutcome::Ok { samples, warnings } => {
                debug!(collector = %self.collector, step = %step, samples, warnings, "collection step done");
            }
        }
        self.steps.push(StepReport { step, outcome });
    }

    pub fn step(&self, name: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step == name).map(|s| &s.outcome)
    }

    pub fn failed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed(_)))
            .count()
    }

    pub fn parse_warnings(&self) -> usize {
        self.steps
            .iter()
            .map(|s| match s.outcome {
                StepOutcome::Ok { warnings, .. } => warnings,
                _ => 0,
            })
            .sum()
    }

    pub fn samples(&self) -> usize {
        self.steps
            .iter()
            .map(|s| match s.outcome {
                StepOutcome::Ok { samples, .. } => samples,
                _ => 0,
            })
            .sum()
    }
}

/// Runs one command under the cycle budget and decodes its stdout.
pub(crate) async fn run_command(
    executor: &dyn CommandExecutor,
    ctx: &CollectContext,
    per_command: Duration,
    command: &CommandSpec,
) -> Result<String, ExecError> {
    let stdout = executor
        .execute(ctx.command_deadline(per_command), command.program, &command.args)
        .await?;
    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

/// Folds parser output into `source` and summarises it as a step outcome.
pub(crate) fn apply_output<S: SeriesSource + ?Sized>(
    source: &S,
    step: &str,
    output: ParseOutput,
) -> StepOutcome {
    for warning in &output.warnings {
        debug!(collector = source.name(), step, %warning, "skipped unparsable line");
    }
    StepOutcome::Ok {
        samples: source.apply(&output.samples),
        warnings: output.warnings.len(),
    }
}
