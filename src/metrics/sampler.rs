use std::collections::HashSet;

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::select;
use tokio_util::sync::CancellationToken;

use super::extract::derive_metrics;
use super::sink::{MetricsSink, Tick};
use super::source::{SnapshotSource, SourceEvent};
use super::types::{MetricGroup, RawSnapshot, SnapshotPair};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    Cancelled,
    TickLimit,
    SourceFailed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SamplerSummary {
    pub ticks: u64,
    pub skipped: u64,
    pub faults: u64,
    pub stop_reason: StopReason,
}

/// Sequential pull loop: one snapshot per tick, in source order.
///
/// Only the previous snapshot is retained, for CPU pairing. History belongs
/// to the sink.
pub struct UsageSampler<S, K> {
    source: S,
    sink: K,
    cancel: CancellationToken,
    tick_limit: Option<u64>,
}

impl<S: SnapshotSource, K: MetricsSink> UsageSampler<S, K> {
    pub fn new(source: S, sink: K, cancel: CancellationToken) -> Self {
        UsageSampler {
            source,
            sink,
            cancel,
            tick_limit: None,
        }
    }

    pub fn with_tick_limit(mut self, limit: Option<u64>) -> Self {
        self.tick_limit = limit;
        self
    }

    /// Run until the source ends, fails, the limit is hit or the token fires.
    /// Hands the sink back so callers can inspect what it accumulated.
    pub async fn run(mut self) -> (SamplerSummary, K) {
        let mut previous: Option<RawSnapshot> = None;
        let mut reported: HashSet<MetricGroup> = HashSet::new();
        let mut ticks = 0u64;
        let mut skipped = 0u64;
        let mut faults = 0u64;

        let stop_reason = loop {
            if self.tick_limit.is_some_and(|limit| ticks >= limit) {
                break StopReason::TickLimit;
            }

            let event = select! {
                biased;
                _ = self.cancel.cancelled() => break StopReason::Cancelled,
                event = self.source.next_event() => event,
            };

            match event {
                SourceEvent::Snapshot(snapshot) => {
                    let pair = SnapshotPair::new(&snapshot, previous.as_ref());
                    let extraction = derive_metrics(&pair, Utc::now());

                    for fault in &extraction.faults {
                        faults += 1;
                        if reported.insert(fault.group) {
                            warn!("{} metrics defaulted to 0: {}", fault.group, fault.error);
                        } else {
                            debug!("{} metrics defaulted to 0: {}", fault.group, fault.error);
                        }
                    }

                    let tick = Tick {
                        index: ticks,
                        raw: &snapshot,
                        metrics: &extraction.metrics,
                    };
                    if let Err(err) = self.sink.accept(&tick) {
                        warn!("metrics consumer rejected tick {}: {}", ticks, err);
                    }

                    ticks += 1;
                    previous = Some(snapshot);
                }
                SourceEvent::Error(err) if !err.is_fatal() => {
                    warn!("skipping tick: {}", err);
                    skipped += 1;
                }
                SourceEvent::Error(err) => {
                    error!("stats source failed: {}", err);
                    break StopReason::SourceFailed(err.to_string());
                }
                SourceEvent::End => {
                    info!("stats stream ended after {} ticks", ticks);
                    break StopReason::EndOfStream;
                }
            }
        };

        if let Err(err) = self.sink.finish() {
            warn!("metrics consumer failed to finish: {}", err);
        }

        let summary = SamplerSummary {
            ticks,
            skipped,
            faults,
            stop_reason,
        };
        (summary, self.sink)
    }
}
