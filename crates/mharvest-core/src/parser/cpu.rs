//! Aggregate CPU split from `top` batch output.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::ParseOutput;
use crate::metrics::SYSTEM_CPU_USAGE;

static VALUE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)%?\s*([A-Za-z]+)").expect("cpu regex is valid")
});

/// Parses procps `top -bn1`.
///
/// ```text
/// %Cpu(s):  3.2 us,  1.1 sy,  0.0 ni, 95.6 id,  0.0 wa,  0.0 hi,  0.1 si,  0.0 st
/// ```
pub fn parse_top_batch(raw: &str) -> ParseOutput {
    parse_summary(raw, "Cpu(s)")
}

/// Parses macOS `top -l 1 -n 0`.
///
/// ```text
/// CPU usage: 5.12% user, 10.25% sys, 84.62% idle
/// ```
pub fn parse_top_macos(raw: &str) -> ParseOutput {
    parse_summary(raw, "CPU usage:")
}

fn parse_summary(raw: &str, marker: &str) -> ParseOutput {
    let mut out = ParseOutput::default();

    // Only the first summary line: per-CPU lines (top -1) follow it.
    let Some((idx, line)) = raw.lines().enumerate().find(|(_, l)| l.contains(marker)) else {
        return out;
    };
    let body = line.split_once(':').map_or(line, |(_, rest)| rest);

    let mut seen = HashSet::new();
    for caps in VALUE_TAG_RE.captures_iter(body) {
        let kind = match &caps[2] {
            "us" | "user" => "user",
            "sy" | "sys" | "system" => "system",
            "id" | "idle" => "idle",
            _ => continue,
        };
        if !seen.insert(kind) {
            continue;
        }
        match caps[1].parse::<f64>() {
            Ok(value) => out.push(&SYSTEM_CPU_USAGE, [kind], value),
            Err(_) => out.warn(idx + 1, line, format!("unparsable {kind} value")),
        }
    }

    if seen.is_empty() {
        out.warn(idx + 1, line, "summary line without user/system/idle values");
    }
    out
}
