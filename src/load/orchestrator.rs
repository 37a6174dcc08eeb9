use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use log::{info, warn};
use tokio::task;
use tokio_util::sync::CancellationToken;

use crate::config::{LoadConfig, LoadProfile};
use crate::error::JobError;
use crate::ops::JobRegistry;

use super::cpu::burn_cpu;
use super::disk::churn_disk;
use super::driver::CycleRunner;
use super::jobs::{CycleReport, JobOutcome, JobReport, JobSummary, ResourceJob};
use super::memory::{hold_memory, MemoryArena};
use super::network::{pull_bandwidth, PullSettings};

/// Runs the four resource jobs of a cycle side by side and waits for all.
pub struct ResourceOrchestrator {
    profile: LoadProfile,
    net_url: String,
    scratch_dir: PathBuf,
    pull: PullSettings,
    client: reqwest::Client,
    arena: Arc<MemoryArena>,
    registry: JobRegistry,
}

impl ResourceOrchestrator {
    pub fn new(config: &LoadConfig) -> Result<Self, JobError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .build()?;

        Ok(ResourceOrchestrator {
            profile: config.profile,
            net_url: config.net_url.clone(),
            scratch_dir: config.scratch_dir.clone(),
            pull: PullSettings {
                request_timeout: config.request_timeout(),
                retry_pause: config.network_retry(),
            },
            client,
            arena: Arc::new(MemoryArena::new()),
            registry: JobRegistry::new(),
        })
    }

    pub fn profile(&self) -> &LoadProfile {
        &self.profile
    }

    pub fn arena(&self) -> &MemoryArena {
        &self.arena
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Fan out one job per dimension and join them. Never fails: a job that
    /// errors or panics is reported as failed and its siblings carry on.
    pub async fn consume_all(
        &self,
        cycle: u64,
        profile: &LoadProfile,
        cancel: &CancellationToken,
    ) -> CycleReport {
        info!("[ALL] Starting comprehensive resource consumption...");
        let started_at = Utc::now();
        let started = Instant::now();

        let mut running = Vec::with_capacity(4);
        for job in ResourceJob::plan(profile, &self.net_url) {
            let kind = job.kind();
            let (id, token) = self.registry.register(kind, cycle, cancel);
            let worker = JobWorker {
                arena: Arc::clone(&self.arena),
                client: self.client.clone(),
                scratch_dir: self.scratch_dir.clone(),
                pull: self.pull.clone(),
            };
            running.push((kind, id, tokio::spawn(worker.run(job, token))));
        }

        let joined = join_all(
            running
                .into_iter()
                .map(|(kind, id, handle)| async move { (kind, id, handle.await) }),
        )
        .await;

        let mut jobs = Vec::with_capacity(joined.len());
        for (kind, id, result) in joined {
            let report = result.unwrap_or_else(|join_err| JobReport {
                kind,
                outcome: JobOutcome::Failed(JobError::Panicked(join_err.to_string()).to_string()),
                elapsed: started.elapsed(),
            });
            self.registry.finish(&id, &report.outcome);
            match &report.outcome {
                JobOutcome::Failed(reason) => warn!("[{}] job failed: {}", kind, reason),
                JobOutcome::Cancelled => info!("[{}] job cancelled", kind),
                JobOutcome::Skipped => info!("[{}] skipped", kind),
                JobOutcome::Completed(_) => {}
            }
            jobs.push(report);
        }

        info!("[ALL] Resource consumption cycle completed");
        CycleReport {
            cycle,
            started_at,
            elapsed: started.elapsed(),
            jobs,
        }
    }
}

#[async_trait]
impl CycleRunner for ResourceOrchestrator {
    async fn run_cycle(
        &self,
        cycle: u64,
        cancel: &CancellationToken,
    ) -> anyhow::Result<CycleReport> {
        Ok(self.consume_all(cycle, &self.profile, cancel).await)
    }
}

/// Everything a single job needs, owned so it can move onto its own task.
struct JobWorker {
    arena: Arc<MemoryArena>,
    client: reqwest::Client,
    scratch_dir: PathBuf,
    pull: PullSettings,
}

impl JobWorker {
    async fn run(self, job: ResourceJob, cancel: CancellationToken) -> JobReport {
        let kind = job.kind();
        let started = Instant::now();

        let result = if job.is_noop() {
            None
        } else {
            Some(self.execute(job, cancel).await)
        };

        let outcome = match result {
            None => JobOutcome::Skipped,
            Some(Ok(summary)) => JobOutcome::Completed(summary),
            Some(Err(JobError::Cancelled)) => JobOutcome::Cancelled,
            Some(Err(err)) => JobOutcome::Failed(err.to_string()),
        };

        JobReport {
            kind,
            outcome,
            elapsed: started.elapsed(),
        }
    }

    async fn execute(
        self,
        job: ResourceJob,
        cancel: CancellationToken,
    ) -> Result<JobSummary, JobError> {
        match job {
            ResourceJob::MemoryHold { size_mb } => hold_memory(&self.arena, size_mb).await,
            ResourceJob::CpuBurn { duration } => {
                task::spawn_blocking(move || burn_cpu(duration, &cancel))
                    .await
                    .map_err(|err| JobError::Panicked(err.to_string()))?
            }
            ResourceJob::DiskChurn { size_mb } => {
                let dir = self.scratch_dir;
                task::spawn_blocking(move || {
                    // Scratch volume problems stay local to the disk job.
                    fs::create_dir_all(&dir).map_err(|source| JobError::Io {
                        path: dir.clone(),
                        source,
                    })?;
                    churn_disk(&dir, size_mb, &cancel)
                })
                    .await
                    .map_err(|err| JobError::Panicked(err.to_string()))?
            }
            ResourceJob::NetworkPull { url, duration } => {
                pull_bandwidth(&self.client, &url, duration, &self.pull, &cancel).await
            }
        }
    }
}
