//! Diagnostic tools per platform.
//!
//! Each probe variant knows the command line it runs and the parser for that
//! command's output. The variants are picked once, at startup, from the
//! detected [`Platform`].

use std::fmt;

use crate::parser::net_dev::InterfaceFilter;
use crate::parser::{ParseOutput, cpu, disk, memory, net_dev, uptime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Macos,
    Other,
}

impl Platform {
    pub fn detect() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::Macos
        } else {
            Platform::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Macos => "macos",
            Platform::Other => "other",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A program and its arguments. `Display` renders the command line, which is
/// also the key scripted executors match on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandSpec {
    pub program: &'static str,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: &'static str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `ping -c <count> <target>`.
    pub fn ping(target: &str, count: u32) -> Self {
        Self::new("ping", ["-c".to_string(), count.to_string(), target.to_string()])
    }

    /// `<runtime> stats --no-stream --format <table>` for every running
    /// container, or for one container when `name` is given.
    pub fn container_stats(runtime: &'static str, name: Option<&str>) -> Self {
        let mut args = vec![
            "stats".to_string(),
            "--no-stream".to_string(),
            "--format".to_string(),
            CONTAINER_STATS_FORMAT.to_string(),
        ];
        args.extend(name.map(str::to_string));
        Self::new(runtime, args)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Both runtimes are asked for the same columns so one parser serves both.
/// The runtimes expand the literal `\t` themselves.
pub const CONTAINER_STATS_FORMAT: &str =
    "table {{.Name}}\\t{{.CPUPerc}}\\t{{.MemUsage}}\\t{{.NetIO}}\\t{{.BlockIO}}";

// ============ CPU ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuProbe {
    /// procps `top -bn1`.
    TopBatch,
    /// macOS `top -l 1 -n 0`.
    TopMacos,
}

impl CpuProbe {
    pub fn command(self) -> CommandSpec {
        match self {
            CpuProbe::TopBatch => CommandSpec::new("top", ["-bn1"]),
            CpuProbe::TopMacos => CommandSpec::new("top", ["-l", "1", "-n", "0"]),
        }
    }

    pub fn parse(self, raw: &str) -> ParseOutput {
        match self {
            CpuProbe::TopBatch => cpu::parse_top_batch(raw),
            CpuProbe::TopMacos => cpu::parse_top_macos(raw),
        }
    }
}

// ============ Memory ============

/// The unit a memory tool reports in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryUnit {
    Bytes,
    /// Pages of the size the tool declares in its own output.
    Pages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryProbe {
    /// procps `free -b`.
    Free,
    /// macOS `vm_stat`.
    VmStat,
}

impl MemoryProbe {
    pub fn command(self) -> CommandSpec {
        match self {
            MemoryProbe::Free => CommandSpec::new("free", ["-b"]),
            MemoryProbe::VmStat => CommandSpec::new("vm_stat", Vec::<String>::new()),
        }
    }

    pub fn unit(self) -> MemoryUnit {
        match self {
            MemoryProbe::Free => MemoryUnit::Bytes,
            MemoryProbe::VmStat => MemoryUnit::Pages,
        }
    }

    pub fn parse(self, raw: &str) -> ParseOutput {
        match self {
            MemoryProbe::Free => memory::parse_free(raw),
            MemoryProbe::VmStat => memory::parse_vm_stat(raw),
        }
    }
}

// ============ Disk ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskProbe {
    /// POSIX `df -kP`, sizes in 1 KiB blocks.
    DfKilobytes,
}

impl DiskProbe {
    /// An empty `paths` lists every mounted filesystem.
    pub fn command(self, paths: &[String]) -> CommandSpec {
        match self {
            DiskProbe::DfKilobytes => {
                let mut args = vec!["-kP".to_string()];
                args.extend(paths.iter().cloned());
                CommandSpec::new("df", args)
            }
        }
    }

    pub fn parse(self, raw: &str) -> ParseOutput {
        match self {
            DiskProbe::DfKilobytes => disk::parse_df(raw),
        }
    }
}

// ============ Uptime ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UptimeProbe {
    Uptime,
}

impl UptimeProbe {
    pub fn command(self) -> CommandSpec {
        match self {
            UptimeProbe::Uptime => CommandSpec::new("uptime", Vec::<String>::new()),
        }
    }

    pub fn parse(self, raw: &str) -> ParseOutput {
        match self {
            UptimeProbe::Uptime => uptime::parse_uptime(raw),
        }
    }
}

// ============ Network interfaces ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceProbe {
    /// Linux `/proc/net/dev`.
    ProcNetDev,
}

impl InterfaceProbe {
    pub fn for_platform(platform: Platform) -> Option<Self> {
        match platform {
            Platform::Linux => Some(InterfaceProbe::ProcNetDev),
            Platform::Macos | Platform::Other => None,
        }
    }

    pub fn command(self) -> CommandSpec {
        match self {
            InterfaceProbe::ProcNetDev => CommandSpec::new("cat", ["/proc/net/dev"]),
        }
    }

    pub fn parse(self, raw: &str, filter: &InterfaceFilter) -> ParseOutput {
        match self {
            InterfaceProbe::ProcNetDev => net_dev::parse_net_dev(raw, filter),
        }
    }
}

// ============ Selection ============

/// The system-family probes for one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemProbes {
    pub cpu: CpuProbe,
    pub memory: MemoryProbe,
    pub disk: DiskProbe,
    pub uptime: UptimeProbe,
}

impl SystemProbes {
    /// Unknown platforms get the procps tools; they are the most common
    /// outside macOS.
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Macos => Self {
                cpu: CpuProbe::TopMacos,
                memory: MemoryProbe::VmStat,
                disk: DiskProbe::DfKilobytes,
                uptime: UptimeProbe::Uptime,
            },
            Platform::Linux | Platform::Other => Self {
                cpu: CpuProbe::TopBatch,
                memory: MemoryProbe::Free,
                disk: DiskProbe::DfKilobytes,
                uptime: UptimeProbe::Uptime,
            },
        }
    }
}
