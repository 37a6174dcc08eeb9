use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::load::{JobKind, JobOutcome};

pub type JobId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Completed,
    Skipped,
    Canceled,
    Failed,
}

impl From<&JobOutcome> for JobStatus {
    fn from(outcome: &JobOutcome) -> Self {
        match outcome {
            JobOutcome::Completed(_) => JobStatus::Completed,
            JobOutcome::Skipped => JobStatus::Skipped,
            JobOutcome::Cancelled => JobStatus::Canceled,
            JobOutcome::Failed(_) => JobStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    pub id: JobId,
    pub kind: JobKind,
    pub cycle: u64,
    pub started_at_ms: u128,
    pub status: JobStatus,
}

/// Jobs currently in flight, each with its own cancellation token.
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<DashMap<JobId, (JobState, CancellationToken)>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The returned token is a child of `parent`: cancelling the cycle
    /// cancels the job, cancelling the job leaves its siblings running.
    pub fn register(
        &self,
        kind: JobKind,
        cycle: u64,
        parent: &CancellationToken,
    ) -> (JobId, CancellationToken) {
        let id = uuid::Uuid::new_v4().to_string();
        let token = parent.child_token();
        let state = JobState {
            id: id.clone(),
            kind,
            cycle,
            started_at_ms: now_ms(),
            status: JobStatus::Running,
        };
        self.inner.insert(id.clone(), (state, token.clone()));
        (id, token)
    }

    pub fn get(&self, id: &str) -> Option<JobState> {
        self.inner.get(id).map(|e| e.0.clone())
    }

    pub fn in_flight(&self) -> Vec<JobState> {
        let mut jobs: Vec<JobState> = self.inner.iter().map(|e| e.0.clone()).collect();
        jobs.sort_by_key(|job| job.started_at_ms);
        jobs
    }

    pub fn cancel(&self, id: &str) -> bool {
        if let Some(entry) = self.inner.get(id) {
            entry.1.cancel();
            true
        } else {
            false
        }
    }

    pub fn cancel_all(&self) -> usize {
        let mut count = 0;
        for entry in self.inner.iter() {
            entry.1.cancel();
            count += 1;
        }
        count
    }

    /// Record the final status and forget the job. Returns the final state.
    pub fn finish(&self, id: &str, outcome: &JobOutcome) -> Option<JobState> {
        let (_, (mut state, _)) = self.inner.remove(id)?;
        state.status = JobStatus::from(outcome);
        Some(state)
    }
}

fn now_ms() -> u128 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}
