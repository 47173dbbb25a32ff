//! Interface counters and ping reachability.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

use super::{CollectContext, CollectReport, Collector, StepOutcome, apply_output, run_command};
use crate::config::NetworkConfig;
use crate::executor::CommandExecutor;
use crate::metrics::{
    INTERFACE_RX_BYTES, INTERFACE_RX_DROPPED, INTERFACE_RX_ERRORS, INTERFACE_RX_PACKETS,
    INTERFACE_TX_BYTES, INTERFACE_TX_DROPPED, INTERFACE_TX_ERRORS, INTERFACE_TX_PACKETS,
    INTERFACE_UP, PING_LATENCY, PING_PACKET_LOSS, PING_REACHABLE,
};
use crate::parser::net_dev::InterfaceFilter;
use crate::parser::ping::parse_ping;
use crate::probe::{CommandSpec, InterfaceProbe};
use crate::registry::{GaugeSeries, SeriesSource};

pub struct NetworkCollector {
    executor: Arc<dyn CommandExecutor>,
    command_timeout: Duration,
    interfaces: Option<InterfaceProbe>,
    filter: InterfaceFilter,
    ping_targets: Vec<String>,
    ping_count: u32,

    rx_bytes: GaugeSeries,
    rx_packets: GaugeSeries,
    rx_errors: GaugeSeries,
    rx_dropped: GaugeSeries,
    tx_bytes: GaugeSeries,
    tx_packets: GaugeSeries,
    tx_errors: GaugeSeries,
    tx_dropped: GaugeSeries,
    up: GaugeSeries,
    ping_latency: GaugeSeries,
    ping_loss: GaugeSeries,
    ping_reachable: GaugeSeries,
}

impl NetworkCollector {
    /// `interfaces` is `None` on platforms without `/proc/net/dev`.
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        command_timeout: Duration,
        interfaces: Option<InterfaceProbe>,
        config: &NetworkConfig,
    ) -> Self {
        Self {
            executor,
            command_timeout,
            interfaces,
            filter: InterfaceFilter {
                monitor_loopback: config.monitor_loopback,
                ignored: config.ignored_interfaces.clone(),
            },
            ping_targets: config.ping_targets(),
            ping_count: config.ping_count,
            rx_bytes: GaugeSeries::new(INTERFACE_RX_BYTES),
            rx_packets: GaugeSeries::new(INTERFACE_RX_PACKETS),
            rx_errors: GaugeSeries::new(INTERFACE_RX_ERRORS),
            rx_dropped: GaugeSeries::new(INTERFACE_RX_DROPPED),
            tx_bytes: GaugeSeries::new(INTERFACE_TX_BYTES),
            tx_packets: GaugeSeries::new(INTERFACE_TX_PACKETS),
            tx_errors: GaugeSeries::new(INTERFACE_TX_ERRORS),
            tx_dropped: GaugeSeries::new(INTERFACE_TX_DROPPED),
            up: GaugeSeries::new(INTERFACE_UP),
            ping_latency: GaugeSeries::new(PING_LATENCY),
            ping_loss: GaugeSeries::new(PING_PACKET_LOSS),
            ping_reachable: GaugeSeries::new(PING_REACHABLE),
        }
    }

    pub fn ping_targets(&self) -> &[String] {
        &self.ping_targets
    }

    async fn collect_interfaces(&self, ctx: &CollectContext, report: &mut CollectReport) {
        let Some(probe) = self.interfaces else {
            report.push("interfaces", StepOutcome::Skipped("no interface source on this platform"));
            return;
        };
        let outcome =
            match run_command(self.executor.as_ref(), ctx, self.command_timeout, &probe.command()).await {
                Ok(raw) => apply_output(self, "interfaces", probe.parse(&raw, &self.filter)),
                Err(e) => StepOutcome::Failed(e.to_string()),
            };
        report.push("interfaces", outcome);
    }

    /// Probes every target at once; each answer is folded in afterwards.
    async fn collect_pings(&self, ctx: &CollectContext, report: &mut CollectReport) {
        let commands: Vec<CommandSpec> = self
            .ping_targets
            .iter()
            .map(|target| CommandSpec::ping(target, self.ping_count))
            .collect();
        let results = join_all(
            commands
                .iter()
                .map(|command| run_command(self.executor.as_ref(), ctx, self.command_timeout, command)),
        )
        .await;

        for (target, result) in self.ping_targets.iter().zip(results) {
            let step = format!("ping:{target}");
            let outcome = match result {
                Ok(raw) => {
                    let out = parse_ping(&raw, target);
                    if out.value(PING_LATENCY.name, &[target.as_str()]).is_none() {
                        self.ping_latency.remove(&[target.as_str()]);
                    }
                    apply_output(self, &step, out)
                }
                Err(e) => {
                    self.mark_unreachable(target);
                    StepOutcome::Failed(e.to_string())
                }
            };
            report.push(step, outcome);
        }
    }

    /// Latency is only exposed next to `reachable = 1`.
    fn mark_unreachable(&self, target: &str) {
        self.ping_latency.remove(&[target]);
        if let Err(e) = self.ping_reachable.set(&[target], 0.0) {
            warn!(ping_target = target, error = %e, "failed to record ping reachability");
        }
    }
}

impl SeriesSource for NetworkCollector {
    fn name(&self) -> &str {
        "network"
    }

    fn series(&self) -> Vec<&GaugeSeries> {
        vec![
            &self.rx_bytes,
            &self.rx_packets,
            &self.rx_errors,
            &self.rx_dropped,
            &self.tx_bytes,
            &self.tx_packets,
            &self.tx_errors,
            &self.tx_dropped,
            &self.up,
            &self.ping_latency,
            &self.ping_loss,
            &self.ping_reachable,
        ]
    }
}

#[async_trait]
impl Collector for NetworkCollector {
    async fn collect_once(&self, ctx: &CollectContext) -> CollectReport {
        let started = Instant::now();
        let mut report = CollectReport::new(self.name());

        self.collect_interfaces(ctx, &mut report).await;
        self.collect_pings(ctx, &mut report).await;

        report.duration = started.elapsed();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{MockExecutor, MockFailure, MockResponse};
    use crate::probe::Platform;

    fn collector(exec: MockExecutor, config: &NetworkConfig, platform: Platform) -> NetworkCollector {
        NetworkCollector::new(
            Arc::new(exec),
            Duration::from_secs(5),
            InterfaceProbe::for_platform(platform),
            config,
        )
    }

    #[tokio::test]
    async fn test_collect_linux_defaults() {
        let c = collector(MockExecutor::typical_linux(), &NetworkConfig::default(), Platform::Linux);
        let report = c.collect_once(&CollectContext::within(Duration::from_secs(10))).await;

        assert_eq!(report.failed_steps(), 0);
        assert_eq!(c.rx_bytes.get(&["eth0"]), Some(100.0));
        assert_eq!(c.tx_packets.get(&["eth0"]), Some(20.0));
        assert_eq!(c.up.get(&["eth0"]), Some(1.0));
        assert_eq!(c.rx_bytes.get(&["lo"]), None);
        assert_eq!(c.ping_latency.get(&["8.8.8.8"]), Some(12.0));
        assert_eq!(c.ping_reachable.get(&["google.com"]), Some(1.0));
        assert_eq!(c.ping_loss.get(&["1.1.1.1"]), Some(0.0));
    }

    #[tokio::test]
    async fn test_interfaces_skipped_without_source() {
        let c = collector(MockExecutor::typical_linux(), &NetworkConfig::default(), Platform::Macos);
        let report = c.collect_once(&CollectContext::within(Duration::from_secs(10))).await;

        assert!(matches!(report.step("interfaces"), Some(StepOutcome::Skipped(_))));
        assert!(c.rx_bytes.is_empty());
        assert_eq!(c.ping_reachable.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_ping_marks_unreachable() {
        let mut exec = MockExecutor::typical_linux();
        exec.add_failure(&CommandSpec::ping("10.9.9.9", 3), MockFailure::NonZeroExit(1));
        let config = NetworkConfig {
            ping_targets: vec!["10.9.9.9".into(), "8.8.8.8".into()],
            ..NetworkConfig::default()
        };
        let c = collector(exec, &config, Platform::Linux);
        let report = c.collect_once(&CollectContext::within(Duration::from_secs(10))).await;

        assert_eq!(report.failed_steps(), 1);
        assert_eq!(c.ping_reachable.get(&["10.9.9.9"]), Some(0.0));
        assert_eq!(c.ping_latency.get(&["10.9.9.9"]), None);
        assert_eq!(c.ping_reachable.get(&["8.8.8.8"]), Some(1.0));
    }

    #[tokio::test]
    async fn test_latency_dropped_when_target_becomes_unreachable() {
        let fails = CommandSpec::ping("10.9.9.9", 3);
        let silent = CommandSpec::ping("10.8.8.8", 3);
        let reply = "64 bytes from x: icmp_seq=1 time=7 ms\n1 packets transmitted, 1 received\n";
        let mut exec = MockExecutor::new();
        exec.add_output(&fails, reply);
        exec.add_output(&silent, reply);
        let config = NetworkConfig {
            ping_targets: vec!["10.9.9.9".into(), "10.8.8.8".into()],
            ..NetworkConfig::default()
        };
        let c = collector(exec, &config, Platform::Macos);
        c.collect_once(&CollectContext::within(Duration::from_secs(10))).await;
        assert_eq!(c.ping_latency.get(&["10.9.9.9"]), Some(7.0));
        assert_eq!(c.ping_latency.get(&["10.8.8.8"]), Some(7.0));

        let mut exec = MockExecutor::new();
        exec.add_failure(&fails, MockFailure::NonZeroExit(2));
        exec.add_output(&silent, "1 packets transmitted, 0 received, 100% packet loss\n");
        let c = NetworkCollector {
            executor: Arc::new(exec),
            ..c
        };
        c.collect_once(&CollectContext::within(Duration::from_secs(10))).await;

        assert_eq!(c.ping_reachable.get(&["10.9.9.9"]), Some(0.0));
        assert_eq!(c.ping_latency.get(&["10.9.9.9"]), None);
        assert_eq!(c.ping_reachable.get(&["10.8.8.8"]), Some(0.0));
        assert_eq!(c.ping_latency.get(&["10.8.8.8"]), None);
        assert_eq!(c.ping_loss.get(&["10.8.8.8"]), Some(100.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pings_run_concurrently() {
        let mut exec = MockExecutor::new();
        for target in ["a.example", "b.example", "c.example"] {
            exec.add_response(
                &CommandSpec::ping(target, 3),
                MockResponse::Delayed(
                    Duration::from_secs(2),
                    Box::new(MockResponse::Output(
                        "64 bytes from x: icmp_seq=1 time=1 ms\n1 packets transmitted, 1 received\n"
                            .into(),
                    )),
                ),
            );
        }
        let config = NetworkConfig {
            ping_targets: vec!["a.example".into(), "b.example".into(), "c.example".into()],
            ..NetworkConfig::default()
        };
        let c = collector(exec, &config, Platform::Macos);

        let started = tokio::time::Instant::now();
        let report = c.collect_once(&CollectContext::within(Duration::from_secs(10))).await;

        assert_eq!(report.failed_steps(), 0);
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(c.ping_reachable.len(), 3);
    }

    #[tokio::test]
    async fn test_ping_count_is_configurable() {
        let exec = Arc::new(MockExecutor::new());
        let config = NetworkConfig {
            ping_targets: vec!["1.1.1.1".into()],
            ping_count: 5,
            ..NetworkConfig::default()
        };
        let c = NetworkCollector::new(exec.clone(), Duration::from_secs(1), None, &config);
        c.collect_once(&CollectContext::within(Duration::from_secs(5))).await;

        assert_eq!(exec.calls(), vec!["ping -c 5 1.1.1.1"]);
    }
}
