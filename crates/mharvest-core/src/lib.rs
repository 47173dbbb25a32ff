//! mharvest-core — collection and exposition pipeline for the metric harvester.
//!
//! Provides:
//! - `config` — immutable JSON configuration with defaults and validation
//! - `executor` — bounded external command execution (real and scripted mock)
//! - `parser` — pure parsers turning diagnostic command output into samples
//! - `probe` — per-platform selection of diagnostic tools and their parsers
//! - `collector` — system, container and network collectors
//! - `registry` — gauge series storage and text exposition
//! - `scheduler` — periodic, non-overlapping harvest cycles
//! - `pipeline` — wiring of all of the above from a `Config`

pub mod collector;
pub mod config;
pub mod executor;
pub mod metrics;
pub mod parser;
pub mod pipeline;
pub mod probe;
pub mod registry;
pub mod scheduler;

/// Crate version with the git revision it was built from.
pub const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("MHARVEST_BUILD_SHA"),
    ")"
);
