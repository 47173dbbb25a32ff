//! Reachability and latency from `ping -c N`.

use std::sync::LazyLock;

use regex::Regex;

use super::ParseOutput;
use crate::metrics::{PING_LATENCY, PING_PACKET_LOSS, PING_REACHABLE};

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time[=<]([\d.]+)\s*ms").expect("ping time regex is valid"));

// iputils: "3 received"; BSD/macOS: "3 packets received".
static SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) packets transmitted, (\d+) (?:packets )?received")
        .expect("ping summary regex is valid")
});

/// Parses the output of `ping -c N <target>`.
///
/// Echo replies supply latencies; the summary line, when present, supplies
/// the authoritative sent/received counts.
pub fn parse_ping(raw: &str, target: &str) -> ParseOutput {
    let mut out = ParseOutput::default();
    let mut latencies = Vec::new();
    let mut sent = 0u64;
    let mut received = 0u64;

    for (idx, line) in raw.lines().enumerate() {
        if line.contains("time=") || line.contains("time<") {
            match TIME_RE
                .captures(line)
                .and_then(|c| c[1].parse::<f64>().ok())
            {
                Some(ms) => latencies.push(ms),
                None => out.warn(idx + 1, line, "echo reply without a readable time"),
            }
            received += 1;
        }
        if let Some(caps) = SUMMARY_RE.captures(line) {
            match (caps[1].parse::<u64>(), caps[2].parse::<u64>()) {
                (Ok(s), Ok(r)) => {
                    sent = s;
                    received = r;
                }
                _ => out.warn(idx + 1, line, "unparsable packet counts"),
            }
        }
    }

    if latencies.is_empty() {
        out.push(&PING_REACHABLE, [target], 0.0);
    } else {
        let mean = latencies.iter().sum::<f64>() / latencies.len() as f64;
        out.push(&PING_LATENCY, [target], mean);
        out.push(&PING_REACHABLE, [target], 1.0);
    }

    if sent > 0 {
        let lost = sent.saturating_sub(received) as f64;
        out.push(&PING_PACKET_LOSS, [target], lost / sent as f64 * 100.0);
    }
    out
}
