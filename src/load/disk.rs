use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::error::JobError;

use super::jobs::JobSummary;
use super::memory::MIB;

pub const SCRATCH_PREFIX: &str = "billing_sim_";

/// A scratch file that is removed when dropped, whatever happened to it.
struct ScratchFile {
    path: PathBuf,
    created: bool,
}

impl ScratchFile {
    /// Name derived from the current time, with a random suffix so that
    /// overlapping cycles never share a file.
    fn unique_in(dir: &Path) -> Self {
        let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let name = format!(
            "{}{}_{}.bin",
            SCRATCH_PREFIX,
            stamp,
            uuid::Uuid::new_v4().simple()
        );
        ScratchFile {
            path: dir.join(name),
            created: false,
        }
    }

    fn create(&mut self) -> io::Result<File> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)?;
        self.created = true;
        Ok(file)
    }

    fn remove(mut self) -> io::Result<()> {
        self.created = false;
        fs::remove_file(&self.path)
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.created {
            return;
        }
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!("[DISK] Could not remove {}: {}", self.path.display(), err);
            }
        }
    }
}

/// Write `size_mb` MiB (synced chunk by chunk), read it back, delete it.
pub fn churn_disk(
    dir: &Path,
    size_mb: u64,
    cancel: &CancellationToken,
) -> Result<JobSummary, JobError> {
    info!("[DISK] Writing {} MB to disk...", size_mb);
    let mut scratch = ScratchFile::unique_in(dir);
    let path = scratch.path.clone();
    let io_err = |source: io::Error| JobError::Io {
        path: path.clone(),
        source,
    };

    let chunk = vec![b'X'; MIB];
    let mut written = 0u64;
    let mut file = scratch.create().map_err(io_err)?;
    for _ in 0..size_mb {
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        file.write_all(&chunk).map_err(io_err)?;
        file.sync_data().map_err(io_err)?;
        written += chunk.len() as u64;
    }
    drop(file);

    let mut file = File::open(&scratch.path).map_err(io_err)?;
    let mut buf = vec![0u8; MIB];
    let mut read = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        let n = file.read(&mut buf).map_err(io_err)?;
        if n == 0 {
            break;
        }
        read += n as u64;
    }
    drop(file);

    scratch.remove().map_err(io_err)?;
    Ok(JobSummary::DiskChurned { written, read })
}
