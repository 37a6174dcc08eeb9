use std::f64::consts::PI;
use std::hint::black_box;
use std::time::{Duration, Instant};

use log::info;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;

use super::jobs::JobSummary;

const BATCH: u64 = 10_000;

/// Keep one core busy with transcendental math for at least `duration`.
pub fn burn_cpu(duration: Duration, cancel: &CancellationToken) -> Result<JobSummary, JobError> {
    info!(
        "[CPU] Starting CPU-intensive work for {} seconds...",
        duration.as_secs()
    );
    let started = Instant::now();
    let mut iterations = 0u64;

    while started.elapsed() < duration {
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        for i in 0..BATCH {
            let x = i as f64;
            black_box((x * PI).sqrt());
            black_box((x * 0.1).sin());
            black_box((x * 0.1).cos());
        }
        iterations += BATCH;
    }

    Ok(JobSummary::CpuBurned { iterations })
}
