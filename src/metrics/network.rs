use crate::error::ExtractionError;

use super::types::{counter, object, RawSnapshot};

/// Cumulative rx/tx bytes of the first interface the runtime lists.
pub fn collect_network_bytes(snapshot: &RawSnapshot) -> Result<(u64, u64), ExtractionError> {
    let section = snapshot
        .section("networks")
        .ok_or(ExtractionError::MissingField("networks"))?;
    let interfaces = object(section, "networks")?;

    let (_, first) = interfaces
        .iter()
        .next()
        .ok_or(ExtractionError::TooFewEntries {
            field: "networks",
            found: 0,
            needed: 1,
        })?;
    let iface = object(first, "networks.<iface>")?;

    Ok((
        counter(iface, "rx_bytes", "networks.<iface>.rx_bytes")?,
        counter(iface, "tx_bytes", "networks.<iface>.tx_bytes")?,
    ))
}
