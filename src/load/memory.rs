use log::info;
use tokio::sync::Mutex;
use tokio::task;

use crate::error::JobError;

use super::jobs::JobSummary;

pub const MIB: usize = 1024 * 1024;

/// Blocks held on purpose for the lifetime of the load generator.
///
/// Append-only: nothing is ever released, so resident memory grows by one
/// block per cycle.
#[derive(Default)]
pub struct MemoryArena {
    blocks: Mutex<Vec<Vec<u8>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldBlock {
    pub index: usize,
    pub bytes: usize,
}

impl MemoryArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn hold(&self, block: Vec<u8>) -> HeldBlock {
        let bytes = block.len();
        let mut blocks = self.blocks.lock().await;
        blocks.push(block);
        HeldBlock {
            index: blocks.len() - 1,
            bytes,
        }
    }

    pub async fn block_count(&self) -> usize {
        self.blocks.lock().await.len()
    }

    pub async fn total_bytes(&self) -> usize {
        self.blocks.lock().await.iter().map(Vec::len).sum()
    }
}

/// Allocate `size_mb` MiB with every page written.
pub fn allocate_block(size_mb: u64) -> Result<Vec<u8>, JobError> {
    let bytes = usize::try_from(size_mb)
        .ok()
        .and_then(|mb| mb.checked_mul(MIB))
        .ok_or(JobError::SizeOverflow { size_mb })?;

    let mut block = Vec::new();
    block
        .try_reserve_exact(bytes)
        .map_err(|_| JobError::Allocation { bytes })?;
    block.resize(bytes, b'X');
    Ok(block)
}

pub async fn hold_memory(arena: &MemoryArena, size_mb: u64) -> Result<JobSummary, JobError> {
    info!("[RAM] Allocating {} MB...", size_mb);
    let block = task::spawn_blocking(move || allocate_block(size_mb))
        .await
        .map_err(|err| JobError::Panicked(err.to_string()))??;

    let held = arena.hold(block).await;
    let total_held = arena.total_bytes().await;
    info!(
        "[RAM] Holding block #{} ({} MB total)",
        held.index,
        total_held / MIB
    );
    Ok(JobSummary::MemoryHeld {
        bytes: held.bytes,
        total_held,
    })
}
