use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ExtractionError;

/// One stats document as emitted by the container runtime.
///
/// Kept as an owned JSON value: the runtime schema differs between platforms
/// and a missing or malformed section must not prevent capturing the rest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawSnapshot(Value);

impl RawSnapshot {
    pub fn new(document: Value) -> Self {
        RawSnapshot(document)
    }

    pub fn from_json(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line).map(RawSnapshot)
    }

    pub fn document(&self) -> &Value {
        &self.0
    }

    pub fn section(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The runtime's own capture time (`read`), if present and parseable.
    pub fn read_at(&self) -> Option<DateTime<Utc>> {
        let text = self.0.get("read")?.as_str()?;
        DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

/// Current snapshot plus whatever came right before it.
#[derive(Clone, Copy, Debug)]
pub struct SnapshotPair<'a> {
    pub current: &'a RawSnapshot,
    pub previous: Option<&'a RawSnapshot>,
}

impl<'a> SnapshotPair<'a> {
    pub fn new(current: &'a RawSnapshot, previous: Option<&'a RawSnapshot>) -> Self {
        SnapshotPair { current, previous }
    }

    pub fn first(current: &'a RawSnapshot) -> Self {
        SnapshotPair {
            current,
            previous: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub cpu_percent: f64,
    pub mem_used_gib: f64,
    pub mem_limit_gib: f64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub read_mib: f64,
    pub write_kib: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricGroup {
    Cpu,
    Memory,
    Network,
    Disk,
}

impl fmt::Display for MetricGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricGroup::Cpu => "cpu",
            MetricGroup::Memory => "memory",
            MetricGroup::Network => "network",
            MetricGroup::Disk => "disk",
        };
        f.write_str(name)
    }
}

/// A metric group that fell back to its default for this tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldFault {
    pub group: MetricGroup,
    pub error: ExtractionError,
}

#[derive(Clone, Debug)]
pub struct Extraction {
    pub metrics: DerivedMetrics,
    pub faults: Vec<FieldFault>,
}

impl Extraction {
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}

// Field accessors shared by the per-group extractors. Absent and `null`
// counters read as zero; a present value of the wrong shape is an error.

pub(super) fn object<'a>(
    value: &'a Value,
    field: &'static str,
) -> Result<&'a Map<String, Value>, ExtractionError> {
    value.as_object().ok_or(ExtractionError::WrongType {
        field,
        expected: "an object",
    })
}

pub(super) fn required<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    field: &'static str,
) -> Result<&'a Value, ExtractionError> {
    match map.get(key) {
        Some(Value::Null) | None => Err(ExtractionError::MissingField(field)),
        Some(value) => Ok(value),
    }
}

pub(super) fn counter(
    map: &Map<String, Value>,
    key: &str,
    field: &'static str,
) -> Result<u64, ExtractionError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(0),
        Some(value) => value.as_u64().ok_or(ExtractionError::WrongType {
            field,
            expected: "an unsigned integer",
        }),
    }
}
