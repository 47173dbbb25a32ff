//! Filesystem usage from POSIX `df -kP`.

use super::ParseOutput;
use crate::metrics::SYSTEM_DISK_USAGE;

const KIB: f64 = 1024.0;

/// Parses `df -kP` output: 1 KiB blocks, one filesystem per line.
///
/// ```text
/// Filesystem     1024-blocks      Used Available Capacity Mounted on
/// /dev/sda1         1000000    500000    500000      50% /
/// ```
pub fn parse_df(raw: &str) -> ParseOutput {
    let mut out = ParseOutput::default();

    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() || line.starts_with("Filesystem") {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 6 {
            out.warn(idx + 1, line, format!("expected 6 fields, got {}", fields.len()));
            continue;
        }

        let device = fields[0];
        for (kind, token) in [("total", fields[1]), ("used", fields[2]), ("available", fields[3])] {
            match token.parse::<f64>() {
                Ok(blocks) => out.push(&SYSTEM_DISK_USAGE, [device, kind], blocks * KIB),
                Err(_) => out.warn(idx + 1, line, format!("unparsable {kind} blocks {token:?}")),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk(out: &ParseOutput, device: &str, kind: &str) -> Option<f64> {
        out.value("system_disk_usage_bytes", &[device, kind])
    }

    #[test]
    fn test_parse_df() {
        let raw = "\
Filesystem     1024-blocks      Used Available Capacity Mounted on
/dev/sda1          1000000    500000    500000      50% /
";
        let out = parse_df(raw);

        assert_eq!(disk(&out, "/dev/sda1", "total"), Some(1_024_000_000.0));
        assert_eq!(disk(&out, "/dev/sda1", "used"), Some(512_000_000.0));
        assert_eq!(disk(&out, "/dev/sda1", "available"), Some(512_000_000.0));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_multiple_filesystems() {
        let raw = "\
Filesystem     1024-blocks      Used Available Capacity Mounted on
/dev/nvme0n1p2   487652344 201234567 261543210      44% /
tmpfs              8141616         0   8141616       0% /dev/shm
";
        let out = parse_df(raw);
        assert_eq!(out.samples.len(), 6);
        assert_eq!(disk(&out, "tmpfs", "used"), Some(0.0));
    }

    #[test]
    fn test_short_and_malformed_rows_are_skipped() {
        let raw = "\
Filesystem     1024-blocks      Used Available Capacity Mounted on
/dev/sdb1 100
/dev/sdc1          1000     abc       500      50% /data
";
        let out = parse_df(raw);

        assert_eq!(out.warnings.len(), 2);
        assert_eq!(out.warnings[0].line, 2);
        assert_eq!(disk(&out, "/dev/sdc1", "total"), Some(1_024_000.0));
        assert_eq!(disk(&out, "/dev/sdc1", "used"), None);
    }
}
