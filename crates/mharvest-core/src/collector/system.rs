//! Host CPU, memory, disk and uptime.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{CollectContext, CollectReport, Collector, StepOutcome, apply_output, run_command};
use crate::config::MetricsConfig;
use crate::executor::CommandExecutor;
use crate::metrics::{SYSTEM_CPU_USAGE, SYSTEM_DISK_USAGE, SYSTEM_MEMORY_USAGE, SYSTEM_UPTIME};
use crate::parser::ParseOutput;
use crate::probe::{CommandSpec, SystemProbes};
use crate::registry::{GaugeSeries, SeriesSource};

pub struct SystemCollector {
    executor: Arc<dyn CommandExecutor>,
    probes: SystemProbes,
    disk_paths: Vec<String>,
    command_timeout: Duration,

    cpu: GaugeSeries,
    memory: GaugeSeries,
    disk: GaugeSeries,
    uptime: GaugeSeries,
}

impl SystemCollector {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        probes: SystemProbes,
        config: &MetricsConfig,
    ) -> Self {
        Self {
            executor,
            probes,
            disk_paths: config.disk_paths.clone(),
            command_timeout: config.command_timeout,
            cpu: GaugeSeries::new(SYSTEM_CPU_USAGE),
            memory: GaugeSeries::new(SYSTEM_MEMORY_USAGE),
            disk: GaugeSeries::new(SYSTEM_DISK_USAGE),
            uptime: GaugeSeries::new(SYSTEM_UPTIME),
        }
    }

    async fn step(
        &self,
        ctx: &CollectContext,
        report: &mut CollectReport,
        step: &str,
        command: CommandSpec,
        parse: impl FnOnce(&str) -> ParseOutput,
    ) {
        let outcome = match run_command(self.executor.as_ref(), ctx, self.command_timeout, &command).await
        {
            Ok(raw) => apply_output(self, step, parse(&raw)),
            Err(e) => StepOutcome::Failed(e.to_string()),
        };
        report.push(step, outcome);
    }
}

impl SeriesSource for SystemCollector {
    fn name(&self) -> &str {
        "system"
    }

    fn series(&self) -> Vec<&GaugeSeries> {
        vec![&self.cpu, &self.memory, &self.disk, &self.uptime]
    }
}

#[async_trait]
impl Collector for SystemCollector {
    async fn collect_once(&self, ctx: &CollectContext) -> CollectReport {
        let started = Instant::now();
        let mut report = CollectReport::new(self.name());
        let probes = self.probes;

        self.step(ctx, &mut report, "cpu", probes.cpu.command(), |raw| {
            probes.cpu.parse(raw)
        })
        .await;
        self.step(ctx, &mut report, "memory", probes.memory.command(), |raw| {
            probes.memory.parse(raw)
        })
        .await;
        self.step(
            ctx,
            &mut report,
            "disk",
            probes.disk.command(&self.disk_paths),
            |raw| probes.disk.parse(raw),
        )
        .await;
        self.step(ctx, &mut report, "uptime", probes.uptime.command(), |raw| {
            probes.uptime.parse(raw)
        })
        .await;

        report.duration = started.elapsed();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{MockExecutor, MockFailure};
    use crate::probe::Platform;

    fn collector(exec: MockExecutor, platform: Platform) -> SystemCollector {
        SystemCollector::new(
            Arc::new(exec),
            SystemProbes::for_platform(platform),
            &MetricsConfig::default(),
        )
    }

    fn ctx() -> CollectContext {
        CollectContext::within(Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_collect_linux() {
        let c = collector(MockExecutor::typical_linux(), Platform::Linux);
        let report = c.collect_once(&ctx()).await;

        assert_eq!(report.failed_steps(), 0);
        assert_eq!(c.cpu.get(&["user"]), Some(3.2));
        assert_eq!(c.memory.get(&["available"]), Some(5732098048.0));
        assert_eq!(c.disk.get(&["/dev/sda1", "total"]), Some(1_024_000_000.0));
        assert_eq!(c.uptime.get::<&str>(&[]), Some(210_600.0));
    }

    #[tokio::test]
    async fn test_collect_macos() {
        let c = collector(MockExecutor::typical_macos(), Platform::Macos);
        let report = c.collect_once(&ctx()).await;

        assert_eq!(report.failed_steps(), 0);
        assert_eq!(c.cpu.get(&["system"]), Some(10.25));
        assert_eq!(c.memory.get(&["free"]), Some(1100.0 * 16384.0));
        assert_eq!(c.memory.get(&["total"]), None);
    }

    #[tokio::test]
    async fn test_failed_step_does_not_stop_others() {
        let mut exec = MockExecutor::typical_linux();
        let probes = SystemProbes::for_platform(Platform::Linux);
        exec.add_failure(&probes.cpu.command(), MockFailure::NonZeroExit(1));
        exec.remove(&probes.memory.command());

        let c = collector(exec, Platform::Linux);
        let report = c.collect_once(&ctx()).await;

        assert_eq!(report.failed_steps(), 2);
        assert!(matches!(report.step("cpu"), Some(StepOutcome::Failed(_))));
        assert!(c.cpu.is_empty());
        assert!(c.memory.is_empty());
        assert_eq!(c.disk.len(), 3);
        assert_eq!(c.uptime.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_values() {
        let c = collector(MockExecutor::typical_linux(), Platform::Linux);
        c.collect_once(&ctx()).await;
        assert_eq!(c.cpu.get(&["idle"]), Some(95.6));

        let mut exec = MockExecutor::typical_linux();
        exec.add_failure(
            &SystemProbes::for_platform(Platform::Linux).cpu.command(),
            MockFailure::Timeout,
        );
        let c2 = SystemCollector {
            executor: Arc::new(exec),
            ..c
        };
        c2.collect_once(&ctx()).await;
        assert_eq!(c2.cpu.get(&["idle"]), Some(95.6));
    }

    #[tokio::test]
    async fn test_disk_paths_are_passed_to_df() {
        let exec = Arc::new(MockExecutor::typical_linux());
        let config = MetricsConfig {
            disk_paths: vec!["/".into(), "/var".into()],
            ..MetricsConfig::default()
        };
        let c = SystemCollector::new(
            exec.clone(),
            SystemProbes::for_platform(Platform::Linux),
            &config,
        );
        let report = c.collect_once(&ctx()).await;

        assert!(exec.calls().contains(&"df -kP / /var".to_string()));
        assert!(matches!(report.step("disk"), Some(StepOutcome::Failed(_))));
    }
}
