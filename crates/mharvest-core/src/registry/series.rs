//! Gauge series: one current value per label combination.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use thiserror::Error;

/// Static description of a series: name, help text and label schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

/// A sample did not supply exactly the label set the series was declared with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("series `{series}` expects {expected} label values, got {got}")]
pub struct LabelError {
    pub series: &'static str,
    pub expected: usize,
    pub got: usize,
}

/// Label values in the order of `SeriesDesc::labels`.
pub type LabelValues = Vec<String>;

/// A last-write-wins gauge family.
///
/// Every write replaces a single entry under this series' own lock, so a
/// reader never observes a partially written value and never waits on any
/// other series.
#[derive(Debug)]
pub struct GaugeSeries {
    desc: SeriesDesc,
    values: RwLock<BTreeMap<LabelValues, f64>>,
}

impl GaugeSeries {
    pub fn new(desc: SeriesDesc) -> Self {
        Self {
            desc,
            values: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn desc(&self) -> &SeriesDesc {
        &self.desc
    }

    pub fn name(&self) -> &'static str {
        self.desc.name
    }

    /// Sets the value for one label combination.
    pub fn set<S: AsRef<str>>(&self, labels: &[S], value: f64) -> Result<(), LabelError> {
        let key = self.key(labels)?;
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
        Ok(())
    }

    /// Forgets one label combination. Returns whether it was present.
    pub fn remove<S: AsRef<str>>(&self, labels: &[S]) -> bool {
        let Ok(key) = self.key(labels) else {
            return false;
        };
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
            .is_some()
    }

    pub fn get<S: AsRef<str>>(&self, labels: &[S]) -> Option<f64> {
        let key = self.key(labels).ok()?;
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied()
    }

    /// Point-in-time copy of every known entry, ordered by label values.
    pub fn snapshot(&self) -> Vec<(LabelValues, f64)> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(labels, value)| (labels.clone(), *value))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key<S: AsRef<str>>(&self, labels: &[S]) -> Result<LabelValues, LabelError> {
        if labels.len() != self.desc.labels.len() {
            return Err(LabelError {
                series: self.desc.name,
                expected: self.desc.labels.len(),
                got: labels.len(),
            });
        }
        Ok(labels.iter().map(|l| l.as_ref().to_owned()).collect())
    }
}
