//! Memory usage from `free -b` (Linux) and `vm_stat` (macOS).

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::ParseOutput;
use crate::metrics::SYSTEM_MEMORY_USAGE;

/// Column positions of the `Mem:` row in procps-ng `free -b`, counting the
/// `Mem:` label as field 0.
const FREE_FALLBACK_COLUMNS: [(&str, usize); 4] =
    [("total", 1), ("used", 2), ("free", 3), ("available", 6)];

/// Page size assumed when the `vm_stat` banner is missing.
const DEFAULT_PAGE_SIZE: f64 = 4096.0;

static PAGE_SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"page size of (\d+) bytes").expect("page size regex is valid")
});

/// Parses `free -b`. Values are already bytes.
///
/// Columns are located through the header when one is present so that older
/// procps layouts (`buffers cached`, no `available`) do not shift values.
pub fn parse_free(raw: &str) -> ParseOutput {
    let mut out = ParseOutput::default();

    let header: Option<Vec<&str>> = raw
        .lines()
        .find(|l| l.split_whitespace().next() == Some("total"))
        .map(|l| l.split_whitespace().collect());

    let Some((idx, line)) = raw
        .lines()
        .enumerate()
        .find(|(_, l)| l.trim_start().starts_with("Mem:"))
    else {
        return out;
    };
    let fields: Vec<&str> = line.split_whitespace().collect();

    let columns: Vec<(&str, usize)> = match &header {
        Some(header) => FREE_FALLBACK_COLUMNS
            .iter()
            .filter_map(|(kind, _)| {
                header
                    .iter()
                    .position(|h| h == kind)
                    .map(|pos| (*kind, pos + 1))
            })
            .collect(),
        None => FREE_FALLBACK_COLUMNS.to_vec(),
    };

    for (kind, col) in columns {
        let Some(token) = fields.get(col) else {
            out.warn(idx + 1, line, format!("missing {kind} column"));
            continue;
        };
        match token.parse::<f64>() {
            Ok(value) => out.push(&SYSTEM_MEMORY_USAGE, [kind], value),
            Err(_) => out.warn(idx + 1, line, format!("unparsable {kind} value {token:?}")),
        }
    }
    out
}

/// Parses macOS `vm_stat`. The tool counts pages of the size it prints in
/// its banner; `total` is not reported and stays absent.
pub fn parse_vm_stat(raw: &str) -> ParseOutput {
    let mut out = ParseOutput::default();

    let page_size = match PAGE_SIZE_RE.captures(raw).and_then(|c| c[1].parse::<f64>().ok()) {
        Some(size) => size,
        None => {
            let first = raw.lines().next().unwrap_or_default();
            out.warn(1, first, "page size banner missing, assuming 4096 bytes");
            DEFAULT_PAGE_SIZE
        }
    };

    let mut pages: HashMap<&str, f64> = HashMap::new();
    for (idx, line) in raw.lines().enumerate() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().trim_matches('"');
        if !key.starts_with("Pages ") {
            continue;
        }
        match value.trim().trim_end_matches('.').parse::<f64>() {
            Ok(count) => {
                pages.insert(key, count);
            }
            Err(_) => out.warn(idx + 1, line, "unparsable page count"),
        }
    }
    if pages.is_empty() {
        return out;
    }

    let get = |key: &str| pages.get(key).copied().unwrap_or(0.0);
    let free = get("Pages free");
    let speculative = get("Pages speculative");
    let used = get("Pages active") + get("Pages wired down") + get("Pages occupied by compressor");
    let available = free + get("Pages inactive") + speculative;

    out.push(&SYSTEM_MEMORY_USAGE, ["used"], used * page_size);
    out.push(&SYSTEM_MEMORY_USAGE, ["free"], (free + speculative) * page_size);
    out.push(&SYSTEM_MEMORY_USAGE, ["available"], available * page_size);
    out
}
