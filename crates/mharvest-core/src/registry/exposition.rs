//! Text exposition formats consumed by pull-based scrapers.

use std::fmt::Write;

use super::series::{LabelValues, SeriesDesc};

/// Output format of the exposition endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Prometheus text format 0.0.4.
    #[default]
    Prometheus,
    /// OpenMetrics 1.0.0 text format.
    OpenMetrics,
}

impl Format {
    pub fn content_type(self) -> &'static str {
        match self {
            Format::Prometheus => "text/plain; version=0.0.4; charset=utf-8",
            Format::OpenMetrics => "application/openmetrics-text; version=1.0.0; charset=utf-8",
        }
    }

    /// Picks a format from an HTTP `Accept` header value.
    pub fn negotiate(accept: Option<&str>) -> Self {
        match accept {
            Some(accept) if accept.contains("application/openmetrics-text") => Format::OpenMetrics,
            _ => Format::Prometheus,
        }
    }
}

/// Writes one gauge family. Families without entries are skipped entirely.
pub(crate) fn write_family(out: &mut String, desc: &SeriesDesc, entries: &[(LabelValues, f64)]) {
    if entries.is_empty() {
        return;
    }

    let _ = writeln!(out, "# HELP {} {}", desc.name, escape_help(desc.help));
    let _ = writeln!(out, "# TYPE {} gauge", desc.name);

    for (labels, value) in entries {
        out.push_str(desc.name);
        if !desc.labels.is_empty() {
            out.push('{');
            for (i, (name, value)) in desc.labels.iter().zip(labels).enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}=\"{}\"", name, escape_label_value(value));
            }
            out.push('}');
        }
        out.push(' ');
        out.push_str(&format_value(*value));
        out.push('\n');
    }
}

pub(crate) fn write_trailer(out: &mut String, format: Format) {
    if format == Format::OpenMetrics {
        out.push_str("# EOF\n");
    }
}

/// Formats a sample value the way scrapers expect it.
///
/// Integral values print without a fractional part (`1024`, not `1024.0`).
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        format!("{value}")
    }
}

fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}
