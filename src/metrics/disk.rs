use serde_json::Value;

use crate::error::ExtractionError;

use super::types::{counter, object, RawSnapshot};

const SERVICE_BYTES: &str = "blkio_stats.io_service_bytes_recursive";

/// Block-IO read and write counters, read in MiB and write in KiB.
///
/// The runtime lists service bytes per device and operation; the first two
/// entries are taken as read and write respectively.
pub fn collect_disk_io(snapshot: &RawSnapshot) -> Result<(f64, f64), ExtractionError> {
    let section = snapshot
        .section("blkio_stats")
        .ok_or(ExtractionError::MissingField("blkio_stats"))?;
    let blkio = object(section, "blkio_stats")?;

    let entries = match blkio.get("io_service_bytes_recursive") {
        // cgroup v2 hosts report `null` instead of an empty list
        None | Some(Value::Null) => return Ok((0.0, 0.0)),
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            return Err(ExtractionError::WrongType {
                field: SERVICE_BYTES,
                expected: "an array",
            })
        }
    };

    match entries.as_slice() {
        [] => Ok((0.0, 0.0)),
        [read, write, ..] => {
            let read = counter(object(read, SERVICE_BYTES)?, "value", SERVICE_BYTES)?;
            let write = counter(object(write, SERVICE_BYTES)?, "value", SERVICE_BYTES)?;
            Ok((read as f64 / 1024.0 / 1024.0, write as f64 / 1024.0))
        }
        [_] => Err(ExtractionError::TooFewEntries {
            field: SERVICE_BYTES,
            found: 1,
            needed: 2,
        }),
    }
}
