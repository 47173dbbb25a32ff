//! Pre-built command outputs for testing.
//!
//! These scenarios script every command a default configuration issues on
//! a given platform, with realistic tool output.

use super::mock::MockExecutor;
use crate::probe::{CommandSpec, InterfaceProbe, Platform, SystemProbes};

pub const TOP_BATCH: &str = "\
top - 10:15:01 up 2 days, 10:30,  1 user,  load average: 0.08, 0.03, 0.01
Tasks: 118 total,   1 running, 117 sleeping,   0 stopped,   0 zombie
%Cpu(s):  3.2 us,  1.1 sy,  0.0 ni, 95.6 id,  0.0 wa,  0.0 hi,  0.1 si,  0.0 st
MiB Mem :   7951.3 total,    512.2 free,   2210.0 used,   5229.1 buff/cache
MiB Swap:   2048.0 total,   2048.0 free,      0.0 used.   5431.6 avail Mem
";

pub const FREE_BYTES: &str = "\
               total        used        free      shared  buff/cache   available
Mem:      8336797696  2317549568   537100288    12345678  5482147840  5732098048
Swap:     2147479552           0  2147479552
";

pub const DF_ROOT: &str = "\
Filesystem     1024-blocks      Used Available Capacity Mounted on
/dev/sda1          1000000    500000    500000      50% /
";

pub const UPTIME: &str =
    " 10:15:01 up 2 days, 10:30,  1 user,  load average: 0.08, 0.03, 0.01\n";

pub const PROC_NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 5000 50 0 0 0 0 0 0 5000 50 0 0 0 0 0 0
  eth0: 100 10 0 0 0 0 0 0 200 20 0 0 0 0 0 0
";

pub const DOCKER_STATS: &str = "\
NAME      CPU %     MEM USAGE / LIMIT     NET I/O           BLOCK I/O
web       0.25%     12.5MiB / 1.5GiB      1.2kB / 648B      0B / 4.1MB
db        12.00%    256MiB / 1.5GiB       12.9kB / 2.1kB    8.19MB / 0B
";

pub const PODMAN_STATS: &str = "\
NAME      CPU %     MEM USAGE / LIMIT     NET I/O           BLOCK I/O
web       0.30%     13MiB / 1.5GiB        1.1kB / 600B      0B / 4MB
";

pub const TOP_MACOS: &str = "\
Processes: 512 total, 2 running, 510 sleeping, 2048 threads
Load Avg: 1.52, 1.71, 1.80
CPU usage: 5.12% user, 10.25% sys, 84.62% idle
";

pub const VM_STAT: &str = "\
Mach Virtual Memory Statistics: (page size of 16384 bytes)
Pages free:                                1000.
Pages active:                              2000.
Pages inactive:                             500.
Pages speculative:                          100.
Pages wired down:                           300.
Pages occupied by compressor:               200.
";

pub fn ping_output(target: &str, times_ms: &[f64], sent: usize) -> String {
    let mut out = format!("PING {target} ({target}) 56(84) bytes of data.\n");
    for (seq, ms) in times_ms.iter().enumerate() {
        out.push_str(&format!(
            "64 bytes from {target}: icmp_seq={} ttl=118 time={ms} ms\n",
            seq + 1
        ));
    }
    let received = times_ms.len();
    let loss = if sent > 0 {
        (sent - received.min(sent)) * 100 / sent
    } else {
        0
    };
    out.push_str(&format!(
        "\n--- {target} ping statistics ---\n{sent} packets transmitted, {received} received, {loss}% packet loss, time 2003ms\n"
    ));
    out
}

impl MockExecutor {
    /// A Linux host with docker and podman each running containers and
    /// every default ping target answering.
    pub fn typical_linux() -> Self {
        let mut exec = Self::new();
        let probes = SystemProbes::for_platform(Platform::Linux);

        exec.add_output(&probes.cpu.command(), TOP_BATCH);
        exec.add_output(&probes.memory.command(), FREE_BYTES);
        exec.add_output(&probes.disk.command(&["/".to_string()]), DF_ROOT);
        exec.add_output(&probes.uptime.command(), UPTIME);
        if let Some(interfaces) = InterfaceProbe::for_platform(Platform::Linux) {
            exec.add_output(&interfaces.command(), PROC_NET_DEV);
        }

        exec.add_output(&CommandSpec::container_stats("docker", None), DOCKER_STATS);
        exec.add_output(&CommandSpec::container_stats("podman", None), PODMAN_STATS);

        for (target, times) in [
            ("8.8.8.8", [10.0, 12.0, 14.0]),
            ("1.1.1.1", [8.0, 9.0, 10.0]),
            ("google.com", [20.0, 21.0, 22.0]),
        ] {
            exec.add_output(&CommandSpec::ping(target, 3), ping_output(target, &times, 3));
        }
        exec
    }

    /// A macOS host without container runtimes.
    pub fn typical_macos() -> Self {
        let mut exec = Self::new();
        let probes = SystemProbes::for_platform(Platform::Macos);

        exec.add_output(&probes.cpu.command(), TOP_MACOS);
        exec.add_output(&probes.memory.command(), VM_STAT);
        exec.add_output(&probes.disk.command(&["/".to_string()]), DF_ROOT);
        exec.add_output(&probes.uptime.command(), UPTIME);
        exec
    }
}
