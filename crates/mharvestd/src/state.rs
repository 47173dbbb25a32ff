//! Shared application state and the global allocator.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::sync::Arc;

use mharvest_core::config::Config;
use mharvest_core::pipeline::Pipeline;
use mharvest_core::registry::Registry;
use mharvest_core::scheduler::HarvestStats;

/// Facts about the running service that never change after startup.
pub(crate) struct ServiceInfo {
    pub(crate) collectors: Vec<String>,
    pub(crate) docker_enabled: bool,
    pub(crate) podman_enabled: bool,
    pub(crate) collection_interval: String,
    pub(crate) platform: &'static str,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) registry: Arc<Registry>,
    pub(crate) stats: Arc<HarvestStats>,
    pub(crate) info: Arc<ServiceInfo>,
}

impl AppState {
    pub(crate) fn new(config: &Config, pipeline: &Pipeline) -> Self {
        let info = ServiceInfo {
            collectors: pipeline.collector_names(),
            docker_enabled: config.containers.docker_enabled,
            podman_enabled: config.containers.podman_enabled,
            collection_interval: humantime::format_duration(config.metrics.collection_interval)
                .to_string(),
            platform: pipeline.platform.as_str(),
        };
        Self {
            registry: pipeline.registry.clone(),
            stats: pipeline.stats.clone(),
            info: Arc::new(info),
        }
    }
}
