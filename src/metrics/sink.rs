use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use log::info;

use super::history::MetricsHistory;
use super::types::{DerivedMetrics, RawSnapshot};

/// One sampler tick as handed to a consumer.
#[derive(Clone, Copy, Debug)]
pub struct Tick<'a> {
    pub index: u64,
    pub raw: &'a RawSnapshot,
    pub metrics: &'a DerivedMetrics,
}

pub trait MetricsSink: Send {
    fn accept(&mut self, tick: &Tick<'_>) -> io::Result<()>;

    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Text rendition of the four dashboard panels over a bounded history.
pub struct ConsoleDashboard {
    history: MetricsHistory,
}

impl ConsoleDashboard {
    pub fn new(capacity: usize) -> Self {
        ConsoleDashboard {
            history: MetricsHistory::new(capacity),
        }
    }

    pub fn history(&self) -> &MetricsHistory {
        &self.history
    }

    /// Upper bound of the CPU panel: at least 120%, or peak plus headroom.
    pub fn cpu_ceiling(&self) -> f64 {
        f64::max(120.0, self.history.peak_cpu() + 10.0)
    }

    pub fn render(&self) -> Option<String> {
        let latest = self.history.latest()?;
        Some(format!(
            "CPU Usage: {:.2}% (scale {:.0}) | Memory Usage: {:.2}GB / {:.2}GB | \
             Disk IO: {:.2}MB / {:.2}KB | Network IO: {} / {}",
            latest.cpu_percent,
            self.cpu_ceiling(),
            latest.mem_used_gib,
            latest.mem_limit_gib,
            latest.read_mib,
            latest.write_kib,
            ByteSize::b(latest.rx_bytes).to_string_as(true),
            ByteSize::b(latest.tx_bytes).to_string_as(true),
        ))
    }
}

impl MetricsSink for ConsoleDashboard {
    fn accept(&mut self, tick: &Tick<'_>) -> io::Result<()> {
        self.history.record(tick.metrics.clone());
        if let Some(line) = self.render() {
            info!("[{}] {}", tick.metrics.timestamp.format("%H:%M:%S"), line);
        }
        Ok(())
    }
}

/// Appends every raw snapshot as one JSON line, flushed immediately.
pub struct JsonLinesRecorder {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl JsonLinesRecorder {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!("recording raw stats to {}", path.display());
        Ok(JsonLinesRecorder {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl MetricsSink for JsonLinesRecorder {
    fn accept(&mut self, tick: &Tick<'_>) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, tick.raw.document())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Forwards every tick to both sinks; the second still runs if the first fails.
pub struct Tee<A, B> {
    pub first: A,
    pub second: B,
}

impl<A: MetricsSink, B: MetricsSink> MetricsSink for Tee<A, B> {
    fn accept(&mut self, tick: &Tick<'_>) -> io::Result<()> {
        let first = self.first.accept(tick);
        let second = self.second.accept(tick);
        first.and(second)
    }

    fn finish(&mut self) -> io::Result<()> {
        let first = self.first.finish();
        let second = self.second.finish();
        first.and(second)
    }
}
