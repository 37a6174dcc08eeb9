use chrono::{DateTime, Utc};

use crate::error::ExtractionError;

use super::cpu::collect_cpu_percent;
use super::disk::collect_disk_io;
use super::memory::collect_memory_gib;
use super::network::collect_network_bytes;
use super::types::{DerivedMetrics, Extraction, FieldFault, MetricGroup, SnapshotPair};

/// Project a snapshot pair onto [`DerivedMetrics`].
///
/// Every group is read independently. A group that fails is reported in
/// `faults` and contributes zeros; the others are unaffected.
pub fn derive_metrics(pair: &SnapshotPair<'_>, captured_at: DateTime<Utc>) -> Extraction {
    let mut faults = Vec::new();

    let cpu_percent = settle(MetricGroup::Cpu, collect_cpu_percent(pair), &mut faults);
    let (mem_used_gib, mem_limit_gib) = settle(
        MetricGroup::Memory,
        collect_memory_gib(pair.current),
        &mut faults,
    );
    let (rx_bytes, tx_bytes) = settle(
        MetricGroup::Network,
        collect_network_bytes(pair.current),
        &mut faults,
    );
    let (read_mib, write_kib) = settle(
        MetricGroup::Disk,
        collect_disk_io(pair.current),
        &mut faults,
    );

    Extraction {
        metrics: DerivedMetrics {
            cpu_percent,
            mem_used_gib,
            mem_limit_gib,
            rx_bytes,
            tx_bytes,
            read_mib,
            write_kib,
            timestamp: pair.current.read_at().unwrap_or(captured_at),
        },
        faults,
    }
}

fn settle<T: Default>(
    group: MetricGroup,
    result: Result<T, ExtractionError>,
    faults: &mut Vec<FieldFault>,
) -> T {
    result.unwrap_or_else(|error| {
        faults.push(FieldFault { group, error });
        T::default()
    })
}
