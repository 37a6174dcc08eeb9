use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::LoadProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Memory,
    Cpu,
    Disk,
    Network,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            JobKind::Memory => "RAM",
            JobKind::Cpu => "CPU",
            JobKind::Disk => "DISK",
            JobKind::Network => "NET",
        };
        f.write_str(tag)
    }
}

/// One unit of synthetic work for a single resource dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceJob {
    MemoryHold { size_mb: u64 },
    CpuBurn { duration: Duration },
    DiskChurn { size_mb: u64 },
    NetworkPull { url: String, duration: Duration },
}

impl ResourceJob {
    /// The four jobs of one cycle, in a fixed order.
    pub fn plan(profile: &LoadProfile, url: &str) -> Vec<ResourceJob> {
        vec![
            ResourceJob::MemoryHold {
                size_mb: profile.ram_mb,
            },
            ResourceJob::CpuBurn {
                duration: Duration::from_secs(profile.cpu_duration_secs),
            },
            ResourceJob::DiskChurn {
                size_mb: profile.disk_mb,
            },
            ResourceJob::NetworkPull {
                url: url.to_string(),
                duration: Duration::from_secs(profile.net_duration_secs),
            },
        ]
    }

    pub fn kind(&self) -> JobKind {
        match self {
            ResourceJob::MemoryHold { .. } => JobKind::Memory,
            ResourceJob::CpuBurn { .. } => JobKind::Cpu,
            ResourceJob::DiskChurn { .. } => JobKind::Disk,
            ResourceJob::NetworkPull { .. } => JobKind::Network,
        }
    }

    /// Zero size or duration means the dimension is skipped this cycle.
    pub fn is_noop(&self) -> bool {
        match self {
            ResourceJob::MemoryHold { size_mb } | ResourceJob::DiskChurn { size_mb } => {
                *size_mb == 0
            }
            ResourceJob::CpuBurn { duration } => duration.is_zero(),
            ResourceJob::NetworkPull { url, duration } => url.is_empty() || duration.is_zero(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum JobSummary {
    MemoryHeld {
        bytes: usize,
        total_held: usize,
    },
    CpuBurned {
        iterations: u64,
    },
    DiskChurned {
        written: u64,
        read: u64,
    },
    NetworkPulled {
        bytes: u64,
        requests_ok: u64,
        requests_failed: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Completed(JobSummary),
    Skipped,
    Cancelled,
    Failed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub kind: JobKind,
    pub outcome: JobOutcome,
    pub elapsed: Duration,
}

impl JobReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, JobOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub jobs: Vec<JobReport>,
}

impl CycleReport {
    pub fn job(&self, kind: JobKind) -> Option<&JobReport> {
        self.jobs.iter().find(|report| report.kind == kind)
    }

    pub fn failures(&self) -> usize {
        self.jobs.iter().filter(|report| report.is_failure()).count()
    }
}
