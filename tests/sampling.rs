use std::time::Duration;

use billing_sim::error::SourceError;
use billing_sim::metrics::{
    ConsoleDashboard, DockerStatsSource, JsonLinesRecorder, JsonLinesSource, SnapshotSource,
    SourceEvent, StopReason, Tee, UsageSampler,
};
use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn stats_line(total: u64, system: u64) -> String {
    json!({
        "read": "2025-03-01T12:00:00Z",
        "cpu_stats": {
            "cpu_usage": { "total_usage": total },
            "system_cpu_usage": system,
            "online_cpus": 2
        },
        "memory_stats": { "usage": 536870912u64, "limit": 1073741824u64 },
        "networks": { "eth0": { "rx_bytes": 10, "tx_bytes": 20 } },
        "blkio_stats": { "io_service_bytes_recursive": [] }
    })
    .to_string()
}

#[tokio::test]
async fn live_stream_feeds_dashboard_and_recording() {
    let server = MockServer::start_async().await;
    let body = format!(
        "{}\n{}\nnot json\n{}",
        stats_line(100, 1_000),
        stats_line(300, 2_000),
        stats_line(700, 3_000)
    );
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/containers/load/stats")
                .query_param("stream", "true");
            then.status(200).body(body);
        })
        .await;

    let dir = TempDir::new().expect("temp dir");
    let record_path = dir.path().join("nested").join("usage.jl");
    let client = reqwest::Client::new();
    let source = DockerStatsSource::connect(&client, &server.base_url(), "load")
        .await
        .expect("connect");
    let sink = Tee {
        first: ConsoleDashboard::new(200),
        second: JsonLinesRecorder::open(&record_path).expect("recorder"),
    };

    let (summary, sink) = UsageSampler::new(source, sink, CancellationToken::new())
        .run()
        .await;

    assert_eq!(summary.stop_reason, StopReason::EndOfStream);
    assert_eq!(summary.ticks, 3);
    assert_eq!(summary.skipped, 1);
    let cpu = sink.first.history().cpu_series();
    // (200 / 1000) * 2 * 100 and (400 / 1000) * 2 * 100
    assert_eq!(cpu[1], 40.0);
    assert_eq!(cpu[2], 80.0);
    let latest = sink.first.history().latest().expect("latest");
    assert_eq!(latest.mem_used_gib, 0.5);
    assert_eq!(latest.rx_bytes, 10);
    assert_eq!(sink.second.written(), 3);

    // the recording replays to the same series
    let replay = JsonLinesSource::open(&record_path, Duration::ZERO)
        .await
        .expect("replay");
    let (summary, dashboard) =
        UsageSampler::new(replay, ConsoleDashboard::new(200), CancellationToken::new())
            .run()
            .await;
    assert_eq!(summary.ticks, 3);
    assert_eq!(summary.skipped, 0);
    assert_eq!(dashboard.history().cpu_series(), cpu);
}

#[tokio::test]
async fn unknown_container_is_fatal_at_connect() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/containers/missing/stats");
            then.status(404).body("{\"message\":\"No such container\"}");
        })
        .await;

    let client = reqwest::Client::new();
    let result = DockerStatsSource::connect(&client, &server.base_url(), "missing").await;
    match result {
        Err(err @ SourceError::Status { .. }) => assert!(err.is_fatal()),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("connect should fail"),
    }
}

#[tokio::test]
async fn missing_recording_is_io_error() {
    let dir = TempDir::new().expect("temp dir");
    let result = JsonLinesSource::open(&dir.path().join("absent.jl"), Duration::ZERO).await;
    assert!(matches!(result, Err(SourceError::Io { .. })));
}

#[tokio::test(start_paused = true)]
async fn paced_replay_spaces_ticks() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("usage.jl");
    std::fs::write(
        &path,
        format!("{}\n\n{}\n", stats_line(1, 10), stats_line(2, 20)),
    )
    .expect("write recording");

    let mut source = JsonLinesSource::open(&path, Duration::from_millis(900))
        .await
        .expect("open");
    let started = tokio::time::Instant::now();
    assert!(matches!(source.next_event().await, SourceEvent::Snapshot(_)));
    assert!(matches!(source.next_event().await, SourceEvent::Snapshot(_)));
    assert!(started.elapsed() >= Duration::from_millis(900));
    assert!(matches!(source.next_event().await, SourceEvent::End));
}

#[tokio::test]
async fn corrupt_recording_line_is_skipped() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("usage.jl");
    let mut contents = Vec::new();
    contents.extend_from_slice(stats_line(100, 1_000).as_bytes());
    contents.extend_from_slice(b"\n{\"read\": \"\xff\xfe\"}\n");
    contents.extend_from_slice(stats_line(300, 2_000).as_bytes());
    contents.push(b'\n');
    std::fs::write(&path, contents).expect("write recording");

    let mut source = JsonLinesSource::open(&path, Duration::ZERO)
        .await
        .expect("open");
    assert!(matches!(source.next_event().await, SourceEvent::Snapshot(_)));
    match source.next_event().await {
        SourceEvent::Error(err @ SourceError::Encoding { .. }) => assert!(!err.is_fatal()),
        other => panic!("unexpected event {other:?}"),
    }

    let replay = JsonLinesSource::open(&path, Duration::ZERO)
        .await
        .expect("open");
    let (summary, dashboard) =
        UsageSampler::new(replay, ConsoleDashboard::new(200), CancellationToken::new())
            .run()
            .await;
    assert_eq!(summary.stop_reason, StopReason::EndOfStream);
    assert_eq!(summary.ticks, 2);
    assert_eq!(summary.skipped, 1);
    // pairing survives the skipped line: (200 / 1000) * 2 * 100
    assert_eq!(dashboard.history().cpu_series()[1], 40.0);
}
