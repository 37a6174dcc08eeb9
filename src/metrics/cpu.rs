use serde_json::Value;

use crate::error::ExtractionError;

use super::types::{counter, object, required, SnapshotPair};

/// Empirical divisor used when the runtime never reports a system-wide CPU
/// counter (seen on Docker Desktop for Windows). It only approximates a
/// percentage on that platform and is not meaningful elsewhere.
pub const FALLBACK_USAGE_DIVISOR: f64 = 1e7;

/// Cumulative CPU counters from one `cpu_stats`/`precpu_stats` section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuCounters {
    pub total_usage: u64,
    pub system_usage: u64,
    pub online_cpus: u64,
    pub percpu_count: usize,
}

impl CpuCounters {
    pub fn from_section(section: &Value, field: &'static str) -> Result<Self, ExtractionError> {
        let stats = object(section, field)?;
        let usage = object(
            required(stats, "cpu_usage", "cpu_usage")?,
            "cpu_usage",
        )?;

        let percpu_count = match usage.get("percpu_usage") {
            None | Some(Value::Null) => 0,
            Some(Value::Array(cores)) => cores.len(),
            Some(_) => {
                return Err(ExtractionError::WrongType {
                    field: "cpu_usage.percpu_usage",
                    expected: "an array",
                })
            }
        };

        Ok(CpuCounters {
            total_usage: counter(usage, "total_usage", "cpu_usage.total_usage")?,
            system_usage: counter(stats, "system_cpu_usage", "system_cpu_usage")?,
            online_cpus: counter(stats, "online_cpus", "online_cpus")?,
            percpu_count,
        })
    }

    /// Explicit online count, then the per-core list length, never zero.
    pub fn cpu_count(&self) -> u64 {
        if self.online_cpus > 0 {
            self.online_cpus
        } else if self.percpu_count > 0 {
            self.percpu_count as u64
        } else {
            1
        }
    }
}

/// Delta-over-delta utilisation, scaled so that one saturated core is 100%.
pub fn cpu_percent(current: &CpuCounters, previous: &CpuCounters) -> f64 {
    if current.system_usage == 0 || previous.system_usage == 0 {
        return current.total_usage as f64 / FALLBACK_USAGE_DIVISOR;
    }

    let cpu_delta = i128::from(current.total_usage) - i128::from(previous.total_usage);
    let system_delta = i128::from(current.system_usage) - i128::from(previous.system_usage);

    if cpu_delta > 0 && system_delta > 0 {
        (cpu_delta as f64 / system_delta as f64) * current.cpu_count() as f64 * 100.0
    } else {
        0.0
    }
}

/// Counters for the earlier half of the pair.
///
/// The runtime embeds its own previous sample as `precpu_stats`; when a
/// document lacks it, the preceding snapshot's `cpu_stats` stands in. With
/// neither, zeroed counters select the fallback formula.
pub fn previous_counters(pair: &SnapshotPair<'_>) -> CpuCounters {
    let embedded = pair
        .current
        .section("precpu_stats")
        .and_then(|section| CpuCounters::from_section(section, "precpu_stats").ok());
    if let Some(counters) = embedded {
        return counters;
    }

    pair.previous
        .and_then(|prev| prev.section("cpu_stats"))
        .and_then(|section| CpuCounters::from_section(section, "cpu_stats").ok())
        .unwrap_or_default()
}

pub fn collect_cpu_percent(pair: &SnapshotPair<'_>) -> Result<f64, ExtractionError> {
    let section = pair
        .current
        .section("cpu_stats")
        .ok_or(ExtractionError::MissingField("cpu_stats"))?;
    let current = CpuCounters::from_section(section, "cpu_stats")?;
    let previous = previous_counters(pair);
    Ok(cpu_percent(&current, &previous))
}
