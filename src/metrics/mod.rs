mod cpu;
mod disk;
mod extract;
mod history;
mod memory;
mod network;
mod sampler;
mod sink;
mod source;
#[cfg(test)]
mod tests;
mod types;

pub use cpu::{cpu_percent, CpuCounters, FALLBACK_USAGE_DIVISOR};
pub use extract::derive_metrics;
pub use history::MetricsHistory;
pub use sampler::{SamplerSummary, StopReason, UsageSampler};
pub use sink::{ConsoleDashboard, JsonLinesRecorder, MetricsSink, Tee, Tick};
pub use source::{DockerStatsSource, JsonLinesSource, LineBuffer, SnapshotSource, SourceEvent};
pub use types::{DerivedMetrics, Extraction, FieldFault, MetricGroup, RawSnapshot, SnapshotPair};
