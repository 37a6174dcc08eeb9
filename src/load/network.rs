use std::hint::black_box;
use std::time::{Duration, Instant};

use futures::StreamExt;
use log::{info, warn};
use tokio::select;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::error::JobError;

use super::jobs::JobSummary;
use super::memory::MIB;

/// Settings shared by every request of a network pull.
#[derive(Debug, Clone)]
pub struct PullSettings {
    pub request_timeout: Duration,
    pub retry_pause: Duration,
}

/// Download `url` over and over until `duration` has passed since the job
/// started. A failed request is logged and retried after a pause; only the
/// deadline (or cancellation) ends the loop.
pub async fn pull_bandwidth(
    client: &reqwest::Client,
    url: &str,
    duration: Duration,
    settings: &PullSettings,
    cancel: &CancellationToken,
) -> Result<JobSummary, JobError> {
    info!(
        "[NET] Downloading from {} for {} seconds...",
        url,
        duration.as_secs()
    );
    let started = Instant::now();
    let mut bytes = 0u64;
    let mut requests_ok = 0u64;
    let mut requests_failed = 0u64;

    while started.elapsed() < duration {
        match download_once(client, url, settings.request_timeout, cancel).await {
            Ok(n) => {
                bytes += n;
                requests_ok += 1;
            }
            Err(JobError::Cancelled) => return Err(JobError::Cancelled),
            Err(err) => {
                requests_failed += 1;
                warn!("[NET] Error downloading: {}", err);
                select! {
                    _ = cancel.cancelled() => return Err(JobError::Cancelled),
                    _ = sleep(settings.retry_pause) => {}
                }
            }
        }
    }

    info!(
        "[NET] Downloaded {:.2} MB",
        bytes as f64 / (1024.0 * 1024.0)
    );
    Ok(JobSummary::NetworkPulled {
        bytes,
        requests_ok,
        requests_failed,
    })
}

/// One streaming GET. The body is consumed in 1 MiB pieces, each decoded
/// as lossy UTF-8 and thrown away.
async fn download_once(
    client: &reqwest::Client,
    url: &str,
    request_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<u64, JobError> {
    let response = select! {
        _ = cancel.cancelled() => return Err(JobError::Cancelled),
        sent = timeout(request_timeout, client.get(url).send()) => {
            sent.map_err(|_| JobError::TimedOut(request_timeout))??
        }
    };
    let mut body = response.error_for_status()?.bytes_stream();

    let mut pending: Vec<u8> = Vec::with_capacity(MIB);
    let mut total = 0u64;
    loop {
        let next = select! {
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
            next = timeout(request_timeout, body.next()) => {
                next.map_err(|_| JobError::TimedOut(request_timeout))?
            }
        };
        let Some(chunk) = next else { break };
        let chunk = chunk?;
        total += chunk.len() as u64;
        pending.extend_from_slice(&chunk);

        while pending.len() >= MIB {
            black_box(String::from_utf8_lossy(&pending[..MIB]).len());
            pending.drain(..MIB);
        }
    }
    if !pending.is_empty() {
        black_box(String::from_utf8_lossy(&pending).len());
    }

    Ok(total)
}
