use std::collections::VecDeque;

use super::types::DerivedMetrics;

/// Bounded window of recent ticks with a parallel column of time labels.
#[derive(Clone, Debug)]
pub struct MetricsHistory {
    entries: VecDeque<DerivedMetrics>,
    labels: VecDeque<String>,
    capacity: usize,
}

impl MetricsHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        MetricsHistory {
            entries: VecDeque::with_capacity(capacity),
            labels: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a tick, evicting the oldest once the window is full.
    pub fn record(&mut self, metrics: DerivedMetrics) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.labels.pop_front();
        }
        self.labels
            .push_back(metrics.timestamp.format("%H:%M:%S").to_string());
        self.entries.push_back(metrics);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&DerivedMetrics> {
        self.entries.back()
    }

    pub fn oldest(&self) -> Option<&DerivedMetrics> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DerivedMetrics> {
        self.entries.iter()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn cpu_series(&self) -> Vec<f64> {
        self.entries.iter().map(|m| m.cpu_percent).collect()
    }

    pub fn memory_series(&self) -> Vec<f64> {
        self.entries.iter().map(|m| m.mem_used_gib).collect()
    }

    pub fn peak_cpu(&self) -> f64 {
        self.entries
            .iter()
            .map(|m| m.cpu_percent)
            .fold(0.0, f64::max)
    }
}
