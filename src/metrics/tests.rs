#![cfg(test)]

use super::cpu::{collect_cpu_percent, previous_counters};
use super::*;
use crate::error::ExtractionError;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;

fn counters(total: u64, system: u64, online: u64) -> CpuCounters {
    CpuCounters {
        total_usage: total,
        system_usage: system,
        online_cpus: online,
        percpu_count: 0,
    }
}

fn docker_stats(total: u64, pre_total: u64, system: u64, pre_system: u64) -> RawSnapshot {
    RawSnapshot::new(json!({
        "read": "2025-03-01T12:00:01Z",
        "cpu_stats": {
            "cpu_usage": { "total_usage": total, "percpu_usage": [1, 2] },
            "system_cpu_usage": system,
            "online_cpus": 4
        },
        "precpu_stats": {
            "cpu_usage": { "total_usage": pre_total },
            "system_cpu_usage": pre_system
        },
        "memory_stats": { "usage": 1073741824u64, "limit": 4294967296u64 },
        "networks": {
            "eth0": { "rx_bytes": 2048, "tx_bytes": 1024 },
            "eth1": { "rx_bytes": 9, "tx_bytes": 9 }
        },
        "blkio_stats": {
            "io_service_bytes_recursive": [
                { "op": "Read", "value": 3145728 },
                { "op": "Write", "value": 4096 }
            ]
        }
    }))
}

#[test]
fn cpu_percent_scales_delta_by_core_count() {
    let snapshot = docker_stats(200, 100, 1000, 500);
    let pair = SnapshotPair::first(&snapshot);
    assert_eq!(collect_cpu_percent(&pair), Ok(80.0));
}

#[test]
fn cpu_percent_falls_back_without_system_counter() {
    let current = counters(123_456_789, 5000, 2);
    let previous = counters(100, 0, 2);
    assert_eq!(cpu_percent(&current, &previous), 123_456_789.0 / 1e7);

    let current = counters(50_000_000, 0, 2);
    let previous = counters(100, 400, 2);
    assert_eq!(cpu_percent(&current, &previous), 5.0);
}

#[test]
fn cpu_percent_is_zero_without_progress() {
    assert_eq!(cpu_percent(&counters(100, 1000, 4), &counters(100, 500, 4)), 0.0);
    assert_eq!(cpu_percent(&counters(200, 500, 4), &counters(100, 500, 4)), 0.0);
    // counter reset between samples
    assert_eq!(cpu_percent(&counters(50, 1000, 4), &counters(100, 500, 4)), 0.0);
    assert_eq!(cpu_percent(&counters(200, 400, 4), &counters(100, 500, 4)), 0.0);
}

#[test]
fn cpu_count_resolution_order() {
    let mut c = CpuCounters {
        total_usage: 0,
        system_usage: 0,
        online_cpus: 8,
        percpu_count: 2,
    };
    assert_eq!(c.cpu_count(), 8);
    c.online_cpus = 0;
    assert_eq!(c.cpu_count(), 2);
    c.percpu_count = 0;
    assert_eq!(c.cpu_count(), 1);
}

#[test]
fn percpu_list_used_when_online_count_missing() {
    let snapshot = RawSnapshot::new(json!({
        "cpu_stats": {
            "cpu_usage": { "total_usage": 300, "percpu_usage": [150, 150] },
            "system_cpu_usage": 2000
        },
        "precpu_stats": {
            "cpu_usage": { "total_usage": 100 },
            "system_cpu_usage": 1000
        }
    }));
    // (200 / 1000) * 2 cores * 100
    assert_eq!(collect_cpu_percent(&SnapshotPair::first(&snapshot)), Ok(40.0));
}

#[test]
fn previous_snapshot_stands_in_for_missing_precpu() {
    let earlier = RawSnapshot::new(json!({
        "cpu_stats": { "cpu_usage": { "total_usage": 100 }, "system_cpu_usage": 500, "online_cpus": 4 }
    }));
    let later = RawSnapshot::new(json!({
        "cpu_stats": { "cpu_usage": { "total_usage": 200 }, "system_cpu_usage": 1000, "online_cpus": 4 }
    }));

    let alone = SnapshotPair::first(&later);
    assert_eq!(previous_counters(&alone), CpuCounters::default());
    assert_eq!(collect_cpu_percent(&alone), Ok(200.0 / 1e7));

    let paired = SnapshotPair::new(&later, Some(&earlier));
    assert_eq!(collect_cpu_percent(&paired), Ok(80.0));
}

#[test]
fn malformed_cpu_section_is_reported() {
    let snapshot = RawSnapshot::new(json!({ "cpu_stats": { "system_cpu_usage": 10 } }));
    assert_eq!(
        collect_cpu_percent(&SnapshotPair::first(&snapshot)),
        Err(ExtractionError::MissingField("cpu_usage"))
    );

    let snapshot = RawSnapshot::new(json!({
        "cpu_stats": { "cpu_usage": { "total_usage": "lots" } }
    }));
    assert!(matches!(
        collect_cpu_percent(&SnapshotPair::first(&snapshot)),
        Err(ExtractionError::WrongType { .. })
    ));
}

#[test]
fn full_document_derives_every_metric() {
    let snapshot = docker_stats(200, 100, 1000, 500);
    let extraction = derive_metrics(&SnapshotPair::first(&snapshot), Utc::now());
    assert!(extraction.is_clean(), "{:?}", extraction.faults);

    let m = extraction.metrics;
    assert_eq!(m.cpu_percent, 80.0);
    assert_eq!(m.mem_used_gib, 1.0);
    assert_eq!(m.mem_limit_gib, 4.0);
    // first interface in document order, not alphabetical
    assert_eq!((m.rx_bytes, m.tx_bytes), (2048, 1024));
    assert_eq!(m.read_mib, 3.0);
    assert_eq!(m.write_kib, 4.0);
    assert_eq!(m.timestamp, Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 1).unwrap());
}

#[test]
fn first_interface_follows_document_order() {
    let snapshot = RawSnapshot::new(json!({
        "networks": {
            "zz0": { "rx_bytes": 1, "tx_bytes": 2 },
            "aa0": { "rx_bytes": 3, "tx_bytes": 4 }
        }
    }));
    let m = derive_metrics(&SnapshotPair::first(&snapshot), Utc::now()).metrics;
    assert_eq!((m.rx_bytes, m.tx_bytes), (1, 2));
}

#[test]
fn empty_networks_default_to_zero() {
    let snapshot = RawSnapshot::new(json!({ "networks": {} }));
    let extraction = derive_metrics(&SnapshotPair::first(&snapshot), Utc::now());
    assert_eq!(extraction.metrics.rx_bytes, 0);
    assert_eq!(extraction.metrics.tx_bytes, 0);
    assert!(extraction
        .faults
        .iter()
        .any(|fault| fault.group == MetricGroup::Network));
}

#[test]
fn empty_or_null_blkio_defaults_to_zero() {
    for list in [json!([]), json!(null)] {
        let snapshot = RawSnapshot::new(json!({
            "blkio_stats": { "io_service_bytes_recursive": list }
        }));
        let extraction = derive_metrics(&SnapshotPair::first(&snapshot), Utc::now());
        assert_eq!(extraction.metrics.read_mib, 0.0);
        assert_eq!(extraction.metrics.write_kib, 0.0);
        assert!(!extraction
            .faults
            .iter()
            .any(|fault| fault.group == MetricGroup::Disk));
    }
}

#[test]
fn single_blkio_entry_is_malformed() {
    let snapshot = RawSnapshot::new(json!({
        "blkio_stats": { "io_service_bytes_recursive": [{ "value": 1048576 }] }
    }));
    let extraction = derive_metrics(&SnapshotPair::first(&snapshot), Utc::now());
    assert_eq!(extraction.metrics.read_mib, 0.0);
    assert_eq!(extraction.metrics.write_kib, 0.0);
    assert!(extraction.faults.contains(&FieldFault {
        group: MetricGroup::Disk,
        error: ExtractionError::TooFewEntries {
            field: "blkio_stats.io_service_bytes_recursive",
            found: 1,
            needed: 2,
        },
    }));
}

#[test]
fn one_bad_group_does_not_block_the_rest() {
    let mut document = docker_stats(200, 100, 1000, 500).document().clone();
    document["networks"] = json!("not an object");
    document["cpu_stats"] = json!(17);
    let snapshot = RawSnapshot::new(document);

    let extraction = derive_metrics(&SnapshotPair::first(&snapshot), Utc::now());
    let groups: Vec<MetricGroup> = extraction.faults.iter().map(|f| f.group).collect();
    assert_eq!(groups, vec![MetricGroup::Cpu, MetricGroup::Network]);

    let m = extraction.metrics;
    assert_eq!(m.cpu_percent, 0.0);
    assert_eq!((m.rx_bytes, m.tx_bytes), (0, 0));
    assert_eq!(m.mem_used_gib, 1.0);
    assert_eq!(m.read_mib, 3.0);
}

#[test]
fn missing_read_timestamp_uses_capture_time() {
    let snapshot = RawSnapshot::new(json!({ "read": "not a time" }));
    let captured = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let m = derive_metrics(&SnapshotPair::first(&snapshot), captured).metrics;
    assert_eq!(m.timestamp, captured);
}

fn metrics_at(second: u32, cpu: f64) -> DerivedMetrics {
    DerivedMetrics {
        cpu_percent: cpu,
        mem_used_gib: 0.0,
        mem_limit_gib: 0.0,
        rx_bytes: 0,
        tx_bytes: 0,
        read_mib: 0.0,
        write_kib: 0.0,
        timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, second).unwrap(),
    }
}

#[test]
fn history_evicts_oldest_past_capacity() {
    let mut history = MetricsHistory::new(3);
    for second in 0..4 {
        history.record(metrics_at(second, second as f64));
    }
    assert_eq!(history.len(), 3);
    assert_eq!(history.cpu_series(), vec![1.0, 2.0, 3.0]);
    assert_eq!(
        history.labels().collect::<Vec<_>>(),
        vec!["00:00:01", "00:00:02", "00:00:03"]
    );
    assert_eq!(history.oldest().map(|m| m.cpu_percent), Some(1.0));
}

#[test]
fn dashboard_ceiling_tracks_peak() {
    let mut dashboard = ConsoleDashboard::new(10);
    assert!(dashboard.render().is_none());

    let snapshot = RawSnapshot::new(json!({}));
    let low = metrics_at(0, 50.0);
    dashboard
        .accept(&Tick { index: 0, raw: &snapshot, metrics: &low })
        .unwrap();
    assert_eq!(dashboard.cpu_ceiling(), 120.0);

    let high = metrics_at(1, 180.0);
    dashboard
        .accept(&Tick { index: 1, raw: &snapshot, metrics: &high })
        .unwrap();
    assert_eq!(dashboard.cpu_ceiling(), 190.0);
    let line = dashboard.render().unwrap();
    assert!(line.starts_with("CPU Usage: 180.00%"), "{line}");
}

#[test]
fn line_buffer_reassembles_split_documents() {
    let mut lines = LineBuffer::default();
    lines.extend(b"{\"a\":1}\n{\"b\"");
    assert_eq!(lines.next_line().as_deref(), Some("{\"a\":1}"));
    assert_eq!(lines.next_line(), None);
    lines.extend(b":2}\r\n\n");
    assert_eq!(lines.next_line().as_deref(), Some("{\"b\":2}"));
    assert_eq!(lines.next_line(), None);
    lines.extend(b"{\"c\":3}");
    assert_eq!(lines.take_remainder().as_deref(), Some("{\"c\":3}"));
    assert_eq!(lines.take_remainder(), None);
}

struct ScriptedSource(VecDeque<SourceEvent>);

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn next_event(&mut self) -> SourceEvent {
        self.0.pop_front().unwrap_or(SourceEvent::End)
    }
}

#[tokio::test]
async fn sampler_pairs_consecutive_snapshots() {
    let first = RawSnapshot::new(json!({
        "cpu_stats": { "cpu_usage": { "total_usage": 100 }, "system_cpu_usage": 500, "online_cpus": 2 }
    }));
    let second = RawSnapshot::new(json!({
        "cpu_stats": { "cpu_usage": { "total_usage": 300 }, "system_cpu_usage": 1500, "online_cpus": 2 }
    }));
    let bad = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let source = ScriptedSource(VecDeque::from(vec![
        SourceEvent::Snapshot(first),
        SourceEvent::Error(crate::error::SourceError::Decode(bad)),
        SourceEvent::Snapshot(second),
    ]));

    let sampler = UsageSampler::new(source, ConsoleDashboard::new(5), CancellationToken::new());
    let (summary, dashboard) = sampler.run().await;

    assert_eq!(summary.ticks, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.stop_reason, StopReason::EndOfStream);
    // (200 / 1000) * 2 * 100
    assert_eq!(dashboard.history().cpu_series()[1], 40.0);
}

#[tokio::test]
async fn sampler_honours_tick_limit_and_cancellation() {
    let snapshots = (0..5)
        .map(|_| SourceEvent::Snapshot(RawSnapshot::new(json!({}))))
        .collect();
    let sampler = UsageSampler::new(
        ScriptedSource(snapshots),
        ConsoleDashboard::new(5),
        CancellationToken::new(),
    )
    .with_tick_limit(Some(3));
    let (summary, dashboard) = sampler.run().await;
    assert_eq!(summary.stop_reason, StopReason::TickLimit);
    assert_eq!(dashboard.history().len(), 3);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let sampler = UsageSampler::new(
        ScriptedSource(VecDeque::new()),
        ConsoleDashboard::new(5),
        cancel,
    );
    let (summary, _) = sampler.run().await;
    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert_eq!(summary.ticks, 0);
}
