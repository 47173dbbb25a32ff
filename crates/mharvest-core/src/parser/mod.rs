//! Parsers for diagnostic command output.
//!
//! Every parser is a pure function from raw text to a [`ParseOutput`]. A line
//! that cannot be understood is skipped and recorded as a [`ParseWarning`];
//! parsing always continues with the next line. An empty output is a valid
//! result and means the tool reported nothing, which is not the same as the
//! command failing.

pub mod container;
pub mod cpu;
pub mod disk;
pub mod memory;
pub mod net_dev;
pub mod ping;
pub mod units;
pub mod uptime;

use std::fmt;

use crate::registry::SeriesDesc;

/// One observed value for one series and label combination.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub metric: &'static str,
    pub labels: Vec<String>,
    pub value: f64,
}

impl Sample {
    pub fn new<L, S>(desc: &SeriesDesc, labels: L, value: f64) -> Self
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            metric: desc.name,
            labels: labels.into_iter().map(Into::into).collect(),
            value,
        }
    }
}

/// A line the parser skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// 1-based line number within the command output.
    pub line: usize,
    pub content: String,
    pub reason: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} ({:?})", self.line, self.reason, self.content)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOutput {
    pub samples: Vec<Sample>,
    pub warnings: Vec<ParseWarning>,
}

impl ParseOutput {
    pub fn push<L, S>(&mut self, desc: &SeriesDesc, labels: L, value: f64)
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.samples.push(Sample::new(desc, labels, value));
    }

    pub fn warn(&mut self, line: usize, content: &str, reason: impl Into<String>) {
        self.warnings.push(ParseWarning {
            line,
            content: content.to_string(),
            reason: reason.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Looks up a sample value by metric name and label values.
    pub fn value(&self, metric: &str, labels: &[&str]) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| s.metric == metric && s.labels.iter().map(String::as_str).eq(labels.iter().copied()))
            .map(|s| s.value)
    }
}
