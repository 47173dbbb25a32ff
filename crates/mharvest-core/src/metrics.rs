//! Descriptors of every series the harvester exposes.
//!
//! Parsers tag samples with these names and collectors register series from
//! the same descriptors, so a name and its label schema live in one place.

use crate::registry::SeriesDesc;

// ============ System ============

pub const SYSTEM_CPU_USAGE: SeriesDesc = SeriesDesc {
    name: "system_cpu_usage_percent",
    help: "System CPU usage percentage",
    labels: &["type"],
};

pub const SYSTEM_MEMORY_USAGE: SeriesDesc = SeriesDesc {
    name: "system_memory_usage_bytes",
    help: "System memory usage in bytes",
    labels: &["type"],
};

pub const SYSTEM_DISK_USAGE: SeriesDesc = SeriesDesc {
    name: "system_disk_usage_bytes",
    help: "System disk usage in bytes",
    labels: &["device", "type"],
};

pub const SYSTEM_UPTIME: SeriesDesc = SeriesDesc {
    name: "system_uptime_seconds",
    help: "System uptime in seconds",
    labels: &[],
};

// ============ Containers ============

pub const CONTAINER_CPU_USAGE: SeriesDesc = SeriesDesc {
    name: "container_cpu_usage_percent",
    help: "Container CPU usage percentage",
    labels: &["container", "runtime"],
};

pub const CONTAINER_MEMORY_USAGE: SeriesDesc = SeriesDesc {
    name: "container_memory_usage_bytes",
    help: "Container memory usage in bytes",
    labels: &["container", "runtime", "type"],
};

pub const CONTAINER_NETWORK_IO: SeriesDesc = SeriesDesc {
    name: "container_network_io_bytes",
    help: "Container network I/O in bytes",
    labels: &["container", "runtime", "direction"],
};

pub const CONTAINER_BLOCK_IO: SeriesDesc = SeriesDesc {
    name: "container_block_io_bytes",
    help: "Container block I/O in bytes",
    labels: &["container", "runtime", "direction"],
};

pub const CONTAINER_RUNNING: SeriesDesc = SeriesDesc {
    name: "container_running",
    help: "Container running status (1 when stats were reported)",
    labels: &["container", "runtime"],
};

// ============ Network interfaces ============

pub const INTERFACE_RX_BYTES: SeriesDesc = SeriesDesc {
    name: "network_interface_rx_bytes_total",
    help: "Total received bytes on network interface",
    labels: &["interface"],
};

pub const INTERFACE_RX_PACKETS: SeriesDesc = SeriesDesc {
    name: "network_interface_rx_packets_total",
    help: "Total received packets on network interface",
    labels: &["interface"],
};

pub const INTERFACE_RX_ERRORS: SeriesDesc = SeriesDesc {
    name: "network_interface_rx_errors_total",
    help: "Total receive errors on network interface",
    labels: &["interface"],
};

pub const INTERFACE_RX_DROPPED: SeriesDesc = SeriesDesc {
    name: "network_interface_rx_dropped_total",
    help: "Total dropped received packets on network interface",
    labels: &["interface"],
};

pub const INTERFACE_TX_BYTES: SeriesDesc = SeriesDesc {
    name: "network_interface_tx_bytes_total",
    help: "Total transmitted bytes on network interface",
    labels: &["interface"],
};

pub const INTERFACE_TX_PACKETS: SeriesDesc = SeriesDesc {
    name: "network_interface_tx_packets_total",
    help: "Total transmitted packets on network interface",
    labels: &["interface"],
};

pub const INTERFACE_TX_ERRORS: SeriesDesc = SeriesDesc {
    name: "network_interface_tx_errors_total",
    help: "Total transmit errors on network interface",
    labels: &["interface"],
};

pub const INTERFACE_TX_DROPPED: SeriesDesc = SeriesDesc {
    name: "network_interface_tx_dropped_total",
    help: "Total dropped transmitted packets on network interface",
    labels: &["interface"],
};

/// Approximate: 1 when the interface has carried traffic since boot, not a
/// link-state check.
pub const INTERFACE_UP: SeriesDesc = SeriesDesc {
    name: "network_interface_up",
    help: "Network interface has carried traffic (1) or not (0); approximates link state",
    labels: &["interface"],
};

// ============ Ping ============

pub const PING_LATENCY: SeriesDesc = SeriesDesc {
    name: "network_ping_latency_milliseconds",
    help: "Ping latency to target host in milliseconds",
    labels: &["target"],
};

pub const PING_PACKET_LOSS: SeriesDesc = SeriesDesc {
    name: "network_ping_packet_loss_percent",
    help: "Ping packet loss percentage to target host",
    labels: &["target"],
};

pub const PING_REACHABLE: SeriesDesc = SeriesDesc {
    name: "network_ping_reachable",
    help: "Target host is reachable via ping (1) or not (0)",
    labels: &["target"],
};

// ============ Harvester self-metrics ============

pub const HARVEST_CYCLES_COMPLETED: SeriesDesc = SeriesDesc {
    name: "harvester_cycles_completed",
    help: "Collection cycles run to completion since startup",
    labels: &[],
};

pub const HARVEST_CYCLES_TIMED_OUT: SeriesDesc = SeriesDesc {
    name: "harvester_cycles_timed_out",
    help: "Collection cycles abandoned at the cycle deadline since startup",
    labels: &[],
};

pub const HARVEST_TICKS_SKIPPED: SeriesDesc = SeriesDesc {
    name: "harvester_ticks_skipped",
    help: "Scheduler ticks dropped because a cycle was still running",
    labels: &[],
};

pub const HARVEST_LAST_CYCLE_DURATION: SeriesDesc = SeriesDesc {
    name: "harvester_last_cycle_duration_seconds",
    help: "Wall time of the most recent collection cycle",
    labels: &[],
};

pub const HARVEST_LAST_CYCLE_TIMESTAMP: SeriesDesc = SeriesDesc {
    name: "harvester_last_cycle_timestamp_seconds",
    help: "Unix time at which the most recent collection cycle ended",
    labels: &[],
};

pub const HARVEST_COLLECTOR_DURATION: SeriesDesc = SeriesDesc {
    name: "harvester_collector_duration_seconds",
    help: "Wall time of the collector's most recent collect pass",
    labels: &["collector"],
};

pub const HARVEST_COLLECTOR_FAILED_STEPS: SeriesDesc = SeriesDesc {
    name: "harvester_collector_failed_steps",
    help: "Steps that failed in the collector's most recent collect pass",
    labels: &["collector"],
};

pub const HARVEST_COLLECTOR_PARSE_WARNINGS: SeriesDesc = SeriesDesc {
    name: "harvester_collector_parse_warnings",
    help: "Lines skipped by parsers in the collector's most recent collect pass",
    labels: &["collector"],
};
