//! Builds the collectors, registry and scheduler from a `Config`.

use std::sync::Arc;

use tracing::info;

use crate::collector::{Collector, ContainerCollector, NetworkCollector, SystemCollector};
use crate::config::Config;
use crate::executor::CommandExecutor;
use crate::probe::{InterfaceProbe, Platform, SystemProbes};
use crate::registry::{Registry, RegistryError};
use crate::scheduler::{HarvestScheduler, HarvestStats};

/// Everything the daemon needs after startup.
pub struct Pipeline {
    pub platform: Platform,
    pub registry: Arc<Registry>,
    pub scheduler: Arc<HarvestScheduler>,
    pub stats: Arc<HarvestStats>,
}

impl Pipeline {
    pub fn collector_names(&self) -> Vec<String> {
        self.scheduler.collector_names()
    }
}

/// Wires one collector per enabled domain to `executor`, registers every
/// series source and hands the collectors to a scheduler.
pub fn build(
    config: &Config,
    executor: Arc<dyn CommandExecutor>,
    platform: Platform,
) -> Result<Pipeline, RegistryError> {
    let mut registry = Registry::new();
    let mut collectors: Vec<Arc<dyn Collector>> = Vec::new();
    let metrics = &config.metrics;

    if metrics.enable_system_metrics {
        let probes = SystemProbes::for_platform(platform);
        info!(?probes, "system metrics enabled");
        add(
            SystemCollector::new(executor.clone(), probes, metrics),
            &mut registry,
            &mut collectors,
        )?;
    }

    if metrics.enable_container_metrics {
        let collector =
            ContainerCollector::new(executor.clone(), metrics.command_timeout, &config.containers);
        info!(
            runtimes = ?collector.runtimes(),
            monitored = config.containers.monitored_names.len(),
            ignored = config.containers.ignored_names.len(),
            "container metrics enabled"
        );
        add(collector, &mut registry, &mut collectors)?;
    }

    if metrics.enable_network_metrics {
        let interfaces = InterfaceProbe::for_platform(platform);
        let collector = NetworkCollector::new(
            executor.clone(),
            metrics.command_timeout,
            interfaces,
            &config.network,
        );
        info!(
            interfaces = interfaces.is_some(),
            ping_targets = ?collector.ping_targets(),
            "network metrics enabled"
        );
        add(collector, &mut registry, &mut collectors)?;
    }

    let stats = Arc::new(HarvestStats::new());
    registry.register(stats.clone())?;

    let scheduler = Arc::new(HarvestScheduler::new(
        collectors,
        metrics.collection_interval,
        metrics.cycle_timeout(),
        config.server.shutdown_timeout,
        stats.clone(),
    ));

    Ok(Pipeline {
        platform,
        registry: Arc::new(registry),
        scheduler,
        stats,
    })
}

fn add<C: Collector + 'static>(
    collector: C,
    registry: &mut Registry,
    collectors: &mut Vec<Arc<dyn Collector>>,
) -> Result<(), RegistryError> {
    let collector = Arc::new(collector);
    registry.register(collector.clone())?;
    collectors.push(collector);
    Ok(())
}
