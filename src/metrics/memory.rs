use crate::error::ExtractionError;

use super::types::{counter, object, RawSnapshot};

pub const BYTES_PER_GIB: f64 = (1u64 << 30) as f64;

/// Used and limit memory in GiB.
pub fn collect_memory_gib(snapshot: &RawSnapshot) -> Result<(f64, f64), ExtractionError> {
    let section = snapshot
        .section("memory_stats")
        .ok_or(ExtractionError::MissingField("memory_stats"))?;
    let stats = object(section, "memory_stats")?;

    let usage = counter(stats, "usage", "memory_stats.usage")?;
    let limit = counter(stats, "limit", "memory_stats.limit")?;

    Ok((usage as f64 / BYTES_PER_GIB, limit as f64 / BYTES_PER_GIB))
}
