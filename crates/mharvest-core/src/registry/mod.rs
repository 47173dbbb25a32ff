//! In-memory metric registry and text exposition.
//!
//! The registry owns no values itself. Collectors own their `GaugeSeries`
//! and expose them through `SeriesSource`; the registry only keeps read-only
//! handles and renders whatever the sources hold at the moment of the call.

pub mod exposition;
pub mod series;

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::parser::Sample;

pub use exposition::{Format, format_value};
pub use series::{GaugeSeries, LabelError, LabelValues, SeriesDesc};

/// Anything that owns a fixed set of series.
pub trait SeriesSource: Send + Sync {
    /// Short identifier used in logs and self-metrics.
    fn name(&self) -> &str;

    /// Every series this source owns. The set never changes after construction.
    fn series(&self) -> Vec<&GaugeSeries>;

    /// Folds parser samples into the owned series. Returns how many were stored.
    ///
    /// Samples naming a series this source does not own, or carrying the wrong
    /// number of labels, are dropped with a warning.
    fn apply(&self, samples: &[Sample]) -> usize {
        let owned = self.series();
        let mut stored = 0;
        for sample in samples {
            let Some(series) = owned.iter().find(|s| s.name() == sample.metric) else {
                warn!(
                    source = self.name(),
                    metric = sample.metric,
                    "sample for a series this source does not own"
                );
                continue;
            };
            match series.set(&sample.labels, sample.value) {
                Ok(()) => stored += 1,
                Err(e) => warn!(source = self.name(), error = %e, "sample rejected"),
            }
        }
        stored
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("series `{series}` from `{source_name}` is already registered")]
    Duplicate {
        series: &'static str,
        source_name: String,
    },
}

/// Read-only view over every registered source.
#[derive(Default)]
pub struct Registry {
    sources: Vec<Arc<dyn SeriesSource>>,
    names: HashSet<&'static str>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source. Fails without side effects if any of its series names
    /// is already taken.
    pub fn register(&mut self, source: Arc<dyn SeriesSource>) -> Result<(), RegistryError> {
        let mut incoming = HashSet::new();
        for series in source.series() {
            let name = series.name();
            if self.names.contains(name) || !incoming.insert(name) {
                return Err(RegistryError::Duplicate {
                    series: name,
                    source_name: source.name().to_string(),
                });
            }
        }
        self.names.extend(incoming);
        self.sources.push(source);
        Ok(())
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn series_count(&self) -> usize {
        self.names.len()
    }

    /// Renders the current value of every series.
    ///
    /// Each series is copied under its own read lock, one at a time, so no
    /// lock is held while text is produced.
    pub fn render(&self, format: Format) -> String {
        let mut families: Vec<(SeriesDesc, Vec<(LabelValues, f64)>)> = self
            .sources
            .iter()
            .flat_map(|source| {
                source
                    .series()
                    .into_iter()
                    .map(|series| (*series.desc(), series.snapshot()))
                    .collect::<Vec<_>>()
            })
            .collect();
        families.sort_by(|a, b| a.0.name.cmp(b.0.name));

        let mut out = String::with_capacity(4096);
        for (desc, entries) in &families {
            exposition::write_family(&mut out, desc, entries);
        }
        exposition::write_trailer(&mut out, format);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const UPTIME: SeriesDesc = SeriesDesc {
        name: "test_uptime_seconds",
        help: "Uptime",
        labels: &[],
    };
    const CPU: SeriesDesc = SeriesDesc {
        name: "test_cpu_percent",
        help: "CPU",
        labels: &["type"],
    };

    struct Fixed {
        name: &'static str,
        series: Vec<GaugeSeries>,
    }

    impl Fixed {
        fn new(name: &'static str, descs: &[SeriesDesc]) -> Arc<Self> {
            Arc::new(Self {
                name,
                series: descs.iter().map(|d| GaugeSeries::new(*d)).collect(),
            })
        }
    }

    impl SeriesSource for Fixed {
        fn name(&self) -> &str {
            self.name
        }
        fn series(&self) -> Vec<&GaugeSeries> {
            self.series.iter().collect()
        }
    }

    #[test]
    fn test_duplicate_series_is_rejected() {
        let mut registry = Registry::new();
        registry.register(Fixed::new("a", &[UPTIME, CPU])).unwrap();

        let err = registry.register(Fixed::new("b", &[CPU])).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Duplicate { series: "test_cpu_percent", .. }
        ));
        assert_eq!(registry.source_names(), vec!["a"]);
    }

    #[test]
    fn test_duplicate_within_one_source_is_rejected() {
        let mut registry = Registry::new();
        assert!(registry.register(Fixed::new("a", &[CPU, CPU])).is_err());
        assert_eq!(registry.series_count(), 0);
    }

    #[test]
    fn test_render_sorts_families_and_skips_empty() {
        let mut registry = Registry::new();
        let source = Fixed::new("a", &[UPTIME, CPU]);
        registry.register(source.clone()).unwrap();

        source.series[0].set::<&str>(&[], 3600.0).unwrap();
        let out = registry.render(Format::Prometheus);
        assert!(!out.contains("test_cpu_percent"));

        source.series[1].set(&["user"], 12.5).unwrap();
        let out = registry.render(Format::Prometheus);
        let cpu = out.find("# HELP test_cpu_percent").unwrap();
        let uptime = out.find("# HELP test_uptime_seconds").unwrap();
        assert!(cpu < uptime);
        assert!(out.contains("test_cpu_percent{type=\"user\"} 12.5\n"));
        assert!(out.contains("test_uptime_seconds 3600\n"));
        assert!(!out.contains("# EOF"));
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut registry = Registry::new();
        let source = Fixed::new("a", &[CPU]);
        registry.register(source.clone()).unwrap();
        source.series[0].set(&["user"], 1.0).unwrap();
        source.series[0].set(&["idle"], 99.0).unwrap();

        let first = registry.render(Format::OpenMetrics);
        let second = registry.render(Format::OpenMetrics);
        assert_eq!(first, second);
        assert!(first.ends_with("# EOF\n"));
    }

    #[test]
    fn test_apply_drops_foreign_and_malformed_samples() {
        let source = Fixed::new("a", &[CPU]);
        let samples = vec![
            Sample::new(&CPU, ["user"], 10.0),
            Sample::new(&UPTIME, Vec::<String>::new(), 5.0),
            Sample {
                metric: CPU.name,
                labels: vec![],
                value: 1.0,
            },
        ];

        assert_eq!(source.apply(&samples), 1);
        assert_eq!(source.series[0].get(&["user"]), Some(10.0));
    }

    #[test]
    fn test_concurrent_reads_see_whole_values() {
        let mut registry = Registry::new();
        let source = Fixed::new("a", &[CPU]);
        registry.register(source.clone()).unwrap();
        source.series[0].set(&["user"], 1.0).unwrap();
        let registry = Arc::new(registry);

        let writer = {
            let source = source.clone();
            thread::spawn(move || {
                for i in 0..2000 {
                    let v = if i % 2 == 0 { 2.0 } else { 1.0 };
                    source.series[0].set(&["user"], v).unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        let out = registry.render(Format::Prometheus);
                        assert!(
                            out.contains("test_cpu_percent{type=\"user\"} 1\n")
                                || out.contains("test_cpu_percent{type=\"user\"} 2\n"),
                            "unexpected snapshot: {out}"
                        );
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }
}
