//! Per-container usage from `docker stats` / `podman stats` tables.

use std::sync::LazyLock;

use regex::Regex;

use super::units::{parse_byte_size, parse_percent, split_pair};
use super::{ParseOutput, ParseWarning};
use crate::metrics::{
    CONTAINER_BLOCK_IO, CONTAINER_CPU_USAGE, CONTAINER_MEMORY_USAGE, CONTAINER_NETWORK_IO,
    CONTAINER_RUNNING,
};

const SIZE: &str = r"[0-9.]+[A-Za-z]*";

/// The aligned table printed by both runtimes: optional ID, name, CPU%,
/// `used / limit`, optional MEM%, `rx / tx`, `read / write`, optional PIDS.
static ANCHORED_RE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"^(?:[0-9a-f]{{12,64}}\s+)?(?P<name>\S+)\s+(?P<cpu>[0-9.]+)%\s+(?P<mem_used>{SIZE})\s*/\s*(?P<mem_limit>{SIZE})\s+(?:[0-9.]+%\s+)?(?P<net_rx>{SIZE})\s*/\s*(?P<net_tx>{SIZE})\s+(?P<blk_read>{SIZE})\s*/\s*(?P<blk_write>{SIZE})(?:\s+\d+)?\s*$"
    );
    Regex::new(&pattern).expect("container stats regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLayout {
    Anchored,
    Compact,
}

/// One container's line of the stats table. Fields a runtime printed as
/// `--` or in an unknown unit are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerRow {
    pub name: String,
    pub cpu_percent: f64,
    pub mem_used: Option<f64>,
    pub mem_limit: Option<f64>,
    pub net_rx: Option<f64>,
    pub net_tx: Option<f64>,
    pub block_read: Option<f64>,
    pub block_write: Option<f64>,
    pub layout: RowLayout,
}

impl ContainerRow {
    /// Appends this row's samples. A row always carries a CPU value, so every
    /// row reports `container_running = 1`.
    pub fn write_samples(&self, runtime: &str, out: &mut ParseOutput) {
        let name = self.name.as_str();
        out.push(&CONTAINER_CPU_USAGE, [name, runtime], self.cpu_percent);
        out.push(&CONTAINER_RUNNING, [name, runtime], 1.0);

        let pairs = [
            (&CONTAINER_MEMORY_USAGE, "used", self.mem_used),
            (&CONTAINER_MEMORY_USAGE, "limit", self.mem_limit),
            (&CONTAINER_NETWORK_IO, "rx", self.net_rx),
            (&CONTAINER_NETWORK_IO, "tx", self.net_tx),
            (&CONTAINER_BLOCK_IO, "read", self.block_read),
            (&CONTAINER_BLOCK_IO, "write", self.block_write),
        ];
        for (desc, kind, value) in pairs {
            if let Some(value) = value {
                out.push(desc, [name, runtime, kind], value);
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerTable {
    pub rows: Vec<ContainerRow>,
    pub warnings: Vec<ParseWarning>,
}

/// Splits a stats table into rows without assigning a runtime.
pub fn parse_container_rows(raw: &str) -> ContainerTable {
    let mut table = ContainerTable::default();

    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_header(trimmed) {
            continue;
        }
        match parse_anchored(trimmed).or_else(|| parse_compact(trimmed)) {
            Some(row) => table.rows.push(row),
            None => table.warnings.push(ParseWarning {
                line: idx + 1,
                content: line.to_string(),
                reason: "line matches neither stats layout".to_string(),
            }),
        }
    }
    table
}

/// Parses a stats table into samples labeled with `runtime`.
pub fn parse_container_stats(raw: &str, runtime: &str) -> ParseOutput {
    let table = parse_container_rows(raw);
    let mut out = ParseOutput {
        samples: Vec::new(),
        warnings: table.warnings,
    };
    for row in &table.rows {
        row.write_samples(runtime, &mut out);
    }
    out
}

fn is_header(line: &str) -> bool {
    let first = line.split_whitespace().next().unwrap_or_default();
    !first.is_empty() && first.chars().all(|c| c.is_ascii_uppercase()) && line.contains("CPU")
}

fn parse_anchored(line: &str) -> Option<ContainerRow> {
    let caps = ANCHORED_RE.captures(line)?;
    let size = |group: &str| caps.name(group).and_then(|m| parse_byte_size(m.as_str()));

    Some(ContainerRow {
        name: caps["name"].to_string(),
        cpu_percent: parse_percent(&caps["cpu"])?,
        mem_used: size("mem_used"),
        mem_limit: size("mem_limit"),
        net_rx: size("net_rx"),
        net_tx: size("net_tx"),
        block_read: size("blk_read"),
        block_write: size("blk_write"),
        layout: RowLayout::Anchored,
    })
}

/// `name cpu% used/limit rx/tx read/write`, tolerating `--` placeholders.
fn parse_compact(line: &str) -> Option<ContainerRow> {
    let normalized = line.replace(" / ", "/");
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    if tokens.len() < 5 || !tokens[2..5].iter().all(|t| t.contains('/')) {
        return None;
    }

    let pair = |token: &str| -> (Option<f64>, Option<f64>) {
        match split_pair(token) {
            Some((a, b)) => (parse_byte_size(a), parse_byte_size(b)),
            None => (None, None),
        }
    };
    let (mem_used, mem_limit) = pair(tokens[2]);
    let (net_rx, net_tx) = pair(tokens[3]);
    let (block_read, block_write) = pair(tokens[4]);

    Some(ContainerRow {
        name: tokens[0].to_string(),
        cpu_percent: parse_percent(tokens[1])?,
        mem_used,
        mem_limit,
        net_rx,
        net_tx,
        block_read,
        block_write,
        layout: RowLayout::Compact,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;

    const DOCKER_FULL: &str = "\
CONTAINER ID   NAME       CPU %     MEM USAGE / LIMIT     MEM %     NET I/O           BLOCK I/O        PIDS
4a5b6c7d8e9f   web        0.25%     12.5MiB / 1.5GiB      0.81%     1.2kB / 648B      0B / 4.1MB       3
0f1e2d3c4b5a   db         12.00%    256MiB / 1.5GiB       16.67%    12.9KB / 2.1kB    8.19MB / 0B      21
";

    fn get(out: &ParseOutput, metric: &str, labels: &[&str]) -> Option<f64> {
        out.value(metric, labels)
    }

    #[test]
    fn test_docker_full_table() {
        let out = parse_container_stats(DOCKER_FULL, "docker");

        assert!(out.warnings.is_empty());
        assert_eq!(get(&out, "container_cpu_usage_percent", &["web", "docker"]), Some(0.25));
        assert_eq!(get(&out, "container_running", &["web", "docker"]), Some(1.0));
        assert_eq!(
            get(&out, "container_memory_usage_bytes", &["web", "docker", "used"]),
            Some(12.5 * MIB)
        );
        assert_eq!(
            get(&out, "container_memory_usage_bytes", &["web", "docker", "limit"]),
            Some(1.5 * GIB)
        );
        assert_eq!(get(&out, "container_network_io_bytes", &["web", "docker", "rx"]), Some(1200.0));
        assert_eq!(get(&out, "container_network_io_bytes", &["web", "docker", "tx"]), Some(648.0));
        assert_eq!(get(&out, "container_block_io_bytes", &["web", "docker", "read"]), Some(0.0));
        assert_eq!(
            get(&out, "container_block_io_bytes", &["web", "docker", "write"]),
            Some(4_100_000.0)
        );
        assert_eq!(get(&out, "container_network_io_bytes", &["db", "docker", "rx"]), Some(12_900.0));
    }

    #[test]
    fn test_name_only_format() {
        let raw = "\
NAME      CPU %     MEM USAGE / LIMIT     NET I/O           BLOCK I/O
web       0.25%     12.5MiB / 1.5GiB      1.2kB / 648B      0B / 4.1MB
";
        let table = parse_container_rows(raw);

        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].name, "web");
        assert_eq!(table.rows[0].layout, RowLayout::Anchored);
    }

    #[test]
    fn test_compact_layout_tolerates_placeholders() {
        let raw = "web 1.5% --/-- 1kB/2kB 0B/0B\n";
        let table = parse_container_rows(raw);

        assert_eq!(table.rows.len(), 1);
        let row = &table.rows[0];
        assert_eq!(row.layout, RowLayout::Compact);
        assert_eq!(row.cpu_percent, 1.5);
        assert_eq!(row.mem_used, None);
        assert_eq!(row.net_rx, Some(1000.0));
        assert_eq!(row.block_write, Some(0.0));
    }

    #[test]
    fn test_unmatched_line_warns_and_continues() {
        let raw = "\
NAME      CPU %     MEM USAGE / LIMIT     NET I/O           BLOCK I/O
this is not a stats row
web       0.25%     12.5MiB / 1.5GiB      1.2kB / 648B      0B / 4.1MB
";
        let out = parse_container_stats(raw, "podman");

        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].line, 2);
        assert_eq!(get(&out, "container_running", &["web", "podman"]), Some(1.0));
    }

    #[test]
    fn test_one_container_per_data_row() {
        let raw = "\
CONTAINER ID   NAME       CPU %     MEM USAGE / LIMIT     MEM %     NET I/O           BLOCK I/O        PIDS
4a5b6c7d8e9f   web        0.25%     12.5MiB / 1.5GiB      0.81%     1.2kB / 648B      0B / 4.1MB       3

cache 0.10% 1MiB/64MiB 0B/0B 0B/0B
garbage
0f1e2d3c4b5a   db         12.00%    256MiB / 1.5GiB       16.67%    12.9KB / 2.1kB    8.19MB / 0B      21
";
        let out = parse_container_stats(raw, "docker");

        let names: HashSet<&str> = out.samples.iter().map(|s| s.labels[0].as_str()).collect();
        assert_eq!(names.len(), 3);
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_empty_table() {
        let out = parse_container_stats("NAME CPU % MEM USAGE / LIMIT NET I/O BLOCK I/O\n", "docker");
        assert!(out.is_empty());
        assert!(out.warnings.is_empty());
    }
}
