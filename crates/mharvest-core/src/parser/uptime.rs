//! System uptime from `uptime`.

use std::sync::LazyLock;

use regex::Regex;

use super::ParseOutput;
use crate::metrics::SYSTEM_UPTIME;

static HOURS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"up\s+(?:(\d+)\s+days?,\s+)?(\d+):(\d+)").expect("uptime regex is valid")
});

// `uptime` prints minutes instead of H:MM during the first hour.
static MINUTES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"up\s+(?:(\d+)\s+days?,\s+)?(\d+)\s+mins?").expect("uptime regex is valid")
});

/// Parses `uptime` output into seconds. No recognisable uptime is not an
/// error: the output is simply empty.
///
/// ```text
///  10:15:01 up 2 days, 10:30,  1 user,  load average: 0.08, 0.03, 0.01
/// ```
pub fn parse_uptime(raw: &str) -> ParseOutput {
    let mut out = ParseOutput::default();

    let seconds = if let Some(caps) = HOURS_RE.captures(raw) {
        let days = number(caps.get(1).map(|m| m.as_str()));
        let hours = number(caps.get(2).map(|m| m.as_str()));
        let minutes = number(caps.get(3).map(|m| m.as_str()));
        days * 86_400.0 + hours * 3_600.0 + minutes * 60.0
    } else if let Some(caps) = MINUTES_RE.captures(raw) {
        let days = number(caps.get(1).map(|m| m.as_str()));
        let minutes = number(caps.get(2).map(|m| m.as_str()));
        days * 86_400.0 + minutes * 60.0
    } else {
        return out;
    };

    out.push(&SYSTEM_UPTIME, Vec::<String>::new(), seconds);
    out
}

fn number(s: Option<&str>) -> f64 {
    s.and_then(|s| s.parse().ok()).unwrap_or(0.0)
}
