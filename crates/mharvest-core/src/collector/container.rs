//! Per-container usage from docker (rootful) and podman (rootless).

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use super::{CollectContext, CollectReport, Collector, StepOutcome, apply_output, run_command};
use crate::config::ContainersConfig;
use crate::executor::CommandExecutor;
use crate::metrics::{
    CONTAINER_BLOCK_IO, CONTAINER_CPU_USAGE, CONTAINER_MEMORY_USAGE, CONTAINER_NETWORK_IO,
    CONTAINER_RUNNING,
};
use crate::parser::ParseOutput;
use crate::parser::container::parse_container_rows;
use crate::probe::CommandSpec;
use crate::registry::{GaugeSeries, SeriesSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    Docker,
    Podman,
}

impl Runtime {
    /// Label value and program name.
    pub fn as_str(self) -> &'static str {
        match self {
            Runtime::Docker => "docker",
            Runtime::Podman => "podman",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ContainerCollector {
    executor: Arc<dyn CommandExecutor>,
    command_timeout: Duration,
    runtimes: Vec<Runtime>,
    monitored: Vec<String>,
    ignored: Vec<String>,

    cpu: GaugeSeries,
    memory: GaugeSeries,
    network: GaugeSeries,
    block: GaugeSeries,
    running: GaugeSeries,
}

impl ContainerCollector {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        command_timeout: Duration,
        config: &ContainersConfig,
    ) -> Self {
        let mut runtimes = Vec::new();
        if config.docker_enabled {
            runtimes.push(Runtime::Docker);
        }
        if config.podman_enabled {
            runtimes.push(Runtime::Podman);
        }
        Self {
            executor,
            command_timeout,
            runtimes,
            monitored: config.monitored_names.clone(),
            ignored: config.ignored_names.clone(),
            cpu: GaugeSeries::new(CONTAINER_CPU_USAGE),
            memory: GaugeSeries::new(CONTAINER_MEMORY_USAGE),
            network: GaugeSeries::new(CONTAINER_NETWORK_IO),
            block: GaugeSeries::new(CONTAINER_BLOCK_IO),
            running: GaugeSeries::new(CONTAINER_RUNNING),
        }
    }

    pub fn runtimes(&self) -> &[Runtime] {
        &self.runtimes
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.ignored.iter().any(|i| i == name)
    }

    /// Queries each allow-listed container on its own.
    async fn collect_targeted(&self, ctx: &CollectContext, runtime: Runtime, report: &mut CollectReport) {
        for name in self.monitored.iter().filter(|n| !self.is_ignored(n)) {
            let step = format!("{runtime}:{name}");
            let command = CommandSpec::container_stats(runtime.as_str(), Some(name.as_str()));
            let outcome =
                match run_command(self.executor.as_ref(), ctx, self.command_timeout, &command).await {
                    Ok(raw) => {
                        let table = parse_container_rows(&raw);
                        let mut out = ParseOutput {
                            samples: Vec::new(),
                            warnings: table.warnings,
                        };
                        for row in table.rows.iter().filter(|r| r.name == *name) {
                            row.write_samples(runtime.as_str(), &mut out);
                        }
                        apply_output(self, &step, out)
                    }
                    Err(e) => {
                        // Unknown, not stopped.
                        self.running.remove(&[name.as_str(), runtime.as_str()]);
                        StepOutcome::Failed(e.to_string())
                    }
                };
            report.push(step, outcome);
        }
    }

    /// One call for every running container, dropping deny-listed rows.
    async fn collect_bulk(&self, ctx: &CollectContext, runtime: Runtime, report: &mut CollectReport) {
        let step = runtime.as_str();
        let command = CommandSpec::container_stats(runtime.as_str(), None);
        let outcome = match run_command(self.executor.as_ref(), ctx, self.command_timeout, &command).await {
            Ok(raw) => {
                let table = parse_container_rows(&raw);
                let mut out = ParseOutput {
                    samples: Vec::new(),
                    warnings: table.warnings,
                };
                let mut listed = HashSet::new();
                for row in &table.rows {
                    if self.is_ignored(&row.name) {
                        debug!(container = %row.name, %runtime, "ignored container");
                        continue;
                    }
                    listed.insert(row.name.as_str());
                    row.write_samples(runtime.as_str(), &mut out);
                }
                // The listing covers every running container, so anything
                // missing from it is gone.
                for series in self.series() {
                    prune(series, runtime, |name| !listed.contains(name));
                }
                apply_output(self, step, out)
            }
            Err(e) => {
                prune(&self.running, runtime, |_| true);
                StepOutcome::Failed(e.to_string())
            }
        };
        report.push(step, outcome);
    }
}

/// Removes the entries of `runtime` whose container name matches `stale`.
/// Every container series is labelled `container, runtime, ..`.
fn prune(series: &GaugeSeries, runtime: Runtime, stale: impl Fn(&str) -> bool) {
    let mut removed = 0;
    for (labels, _) in series.snapshot() {
        let (Some(name), Some(rt)) = (labels.first(), labels.get(1)) else {
            continue;
        };
        if rt == runtime.as_str() && stale(name) && series.remove(&labels) {
            removed += 1;
        }
    }
    if removed > 0 {
        debug!(series = series.name(), %runtime, removed, "pruned container entries");
    }
}

impl SeriesSource for ContainerCollector {
    fn name(&self) -> &str {
        "container"
    }

    fn series(&self) -> Vec<&GaugeSeries> {
        vec![&self.cpu, &self.memory, &self.network, &self.block, &self.running]
    }
}

#[async_trait]
impl Collector for ContainerCollector {
    async fn collect_once(&self, ctx: &CollectContext) -> CollectReport {
        let started = Instant::now();
        let mut report = CollectReport::new(self.name());

        for &runtime in &self.runtimes {
            if self.monitored.is_empty() {
                self.collect_bulk(ctx, runtime, &mut report).await;
            } else {
                self.collect_targeted(ctx, runtime, &mut report).await;
            }
        }

        report.duration = started.elapsed();
        report
    }
}
