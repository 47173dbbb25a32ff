//! Per-interface counters from Linux `/proc/net/dev`.

use super::ParseOutput;
use crate::metrics::{
    INTERFACE_RX_BYTES, INTERFACE_RX_DROPPED, INTERFACE_RX_ERRORS, INTERFACE_RX_PACKETS,
    INTERFACE_TX_BYTES, INTERFACE_TX_DROPPED, INTERFACE_TX_ERRORS, INTERFACE_TX_PACKETS,
    INTERFACE_UP,
};
use crate::registry::SeriesDesc;

const LOOPBACK: &str = "lo";

/// Field index within the 16 counters following `name:` and the series it feeds.
const COUNTERS: [(usize, SeriesDesc); 8] = [
    (0, INTERFACE_RX_BYTES),
    (1, INTERFACE_RX_PACKETS),
    (2, INTERFACE_RX_ERRORS),
    (3, INTERFACE_RX_DROPPED),
    (8, INTERFACE_TX_BYTES),
    (9, INTERFACE_TX_PACKETS),
    (10, INTERFACE_TX_ERRORS),
    (11, INTERFACE_TX_DROPPED),
];

/// Which interfaces to report.
#[derive(Debug, Clone, Default)]
pub struct InterfaceFilter {
    pub monitor_loopback: bool,
    pub ignored: Vec<String>,
}

impl InterfaceFilter {
    pub fn accepts(&self, name: &str) -> bool {
        if name == LOOPBACK && !self.monitor_loopback {
            return false;
        }
        !self.ignored.iter().any(|i| i == name)
    }
}

/// Parses `/proc/net/dev`.
///
/// ```text
/// Inter-|   Receive                                                |  Transmit
///  face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
///   eth0: 100 10 0 0 0 0 0 0 200 20 0 0 0 0 0 0
/// ```
///
/// `network_interface_up` is a traffic heuristic: 1 when the interface has
/// moved any bytes since boot. It does not read the link state.
pub fn parse_net_dev(raw: &str, filter: &InterfaceFilter) -> ParseOutput {
    let mut out = ParseOutput::default();

    for (idx, line) in raw.lines().enumerate().skip(2) {
        if line.trim().is_empty() {
            continue;
        }
        let Some((name, counters)) = line.split_once(':') else {
            out.warn(idx + 1, line, "missing interface separator");
            continue;
        };
        let name = name.trim();
        if !filter.accepts(name) {
            continue;
        }

        let fields: Vec<&str> = counters.split_whitespace().collect();
        if fields.len() < 16 {
            out.warn(idx + 1, line, format!("expected 16 counters, got {}", fields.len()));
            continue;
        }
        let values: Result<Vec<f64>, _> = fields[..16].iter().map(|f| f.parse::<f64>()).collect();
        let Ok(values) = values else {
            out.warn(idx + 1, line, "unparsable counter");
            continue;
        };

        for (i, desc) in &COUNTERS {
            out.push(desc, [name], values[*i]);
        }
        let up = if values[0] > 0.0 || values[8] > 0.0 { 1.0 } else { 0.0 };
        out.push(&INTERFACE_UP, [name], up);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 5000 50 0 0 0 0 0 0 5000 50 0 0 0 0 0 0
  eth0: 100 10 0 0 0 0 0 0 200 20 0 0 0 0 0 0
docker0: 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
";

    #[test]
    fn test_parse_net_dev() {
        let out = parse_net_dev(PROC_NET_DEV, &InterfaceFilter::default());

        assert_eq!(out.value("network_interface_rx_bytes_total", &["eth0"]), Some(100.0));
        assert_eq!(out.value("network_interface_rx_packets_total", &["eth0"]), Some(10.0));
        assert_eq!(out.value("network_interface_tx_bytes_total", &["eth0"]), Some(200.0));
        assert_eq!(out.value("network_interface_tx_packets_total", &["eth0"]), Some(20.0));
        assert_eq!(out.value("network_interface_up", &["eth0"]), Some(1.0));
        assert_eq!(out.value("network_interface_up", &["docker0"]), Some(0.0));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_loopback_excluded_by_default() {
        let out = parse_net_dev(PROC_NET_DEV, &InterfaceFilter::default());
        assert_eq!(out.value("network_interface_rx_bytes_total", &["lo"]), None);

        let filter = InterfaceFilter {
            monitor_loopback: true,
            ..Default::default()
        };
        let out = parse_net_dev(PROC_NET_DEV, &filter);
        assert_eq!(out.value("network_interface_rx_bytes_total", &["lo"]), Some(5000.0));
    }

    #[test]
    fn test_ignored_interfaces() {
        let filter = InterfaceFilter {
            monitor_loopback: false,
            ignored: vec!["docker0".to_string()],
        };
        let out = parse_net_dev(PROC_NET_DEV, &filter);
        assert_eq!(out.value("network_interface_up", &["docker0"]), None);
        assert_eq!(out.samples.len(), 9);
    }

    #[test]
    fn test_short_line_warns() {
        let raw = "header\nheader\n  eth1: 1 2 3\n  eth0: 100 10 0 0 0 0 0 0 200 20 0 0 0 0 0 0\n";
        let out = parse_net_dev(raw, &InterfaceFilter::default());

        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].line, 3);
        assert_eq!(out.value("network_interface_up", &["eth0"]), Some(1.0));
    }
}
