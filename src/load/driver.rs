use std::time::Duration;

use async_trait::async_trait;
use log::{error, info};
use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::config::LoadConfig;

use super::jobs::CycleReport;

/// Source of pauses between cycles. Swapped out in tests so nothing
/// actually waits 60 seconds.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// One full resource cycle. An `Err` means the cycle as a whole could not
/// run; individual job failures live inside the report.
#[async_trait]
pub trait CycleRunner: Send + Sync {
    async fn run_cycle(
        &self,
        cycle: u64,
        cancel: &CancellationToken,
    ) -> anyhow::Result<CycleReport>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub success_pause: Duration,
    pub failure_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            success_pause: Duration::from_secs(5),
            failure_pause: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &LoadConfig) -> Self {
        RetryPolicy {
            success_pause: Duration::from_secs(config.success_pause_secs),
            failure_pause: Duration::from_secs(config.failure_pause_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleState {
    pub completed: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverExit {
    Interrupted,
    CycleLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSummary {
    pub state: CycleState,
    pub exit: DriverExit,
}

/// Repeats cycles until cancelled or until `cycle_limit` cycles succeeded.
pub struct CycleDriver<R, C> {
    runner: R,
    clock: C,
    policy: RetryPolicy,
    cycle_limit: Option<u64>,
}

impl<R: CycleRunner> CycleDriver<R, TokioClock> {
    pub fn new(runner: R, policy: RetryPolicy) -> Self {
        Self::with_clock(runner, TokioClock, policy)
    }
}

impl<R: CycleRunner, C: Clock> CycleDriver<R, C> {
    pub fn with_clock(runner: R, clock: C, policy: RetryPolicy) -> Self {
        CycleDriver {
            runner,
            clock,
            policy,
            cycle_limit: None,
        }
    }

    pub fn with_cycle_limit(mut self, limit: Option<u64>) -> Self {
        self.cycle_limit = limit;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub async fn run(&self, cancel: &CancellationToken) -> DriverSummary {
        let mut state = CycleState::default();
        info!("Starting continuous resource consumption...");

        loop {
            if self.limit_reached(&state) {
                return self.finish(state, DriverExit::CycleLimit);
            }
            let cycle = state.completed + 1;
            info!("=== Cycle {} ===", cycle);

            let outcome = select! {
                biased;
                _ = cancel.cancelled() => return self.finish(state, DriverExit::Interrupted),
                outcome = self.runner.run_cycle(cycle, cancel) => outcome,
            };

            let pause = match outcome {
                Ok(report) => {
                    if cancel.is_cancelled() {
                        return self.finish(state, DriverExit::Interrupted);
                    }
                    state.completed += 1;
                    info!(
                        "Cycle {} finished in {:.1}s with {} failed job(s)",
                        report.cycle,
                        report.elapsed.as_secs_f64(),
                        report.failures()
                    );
                    if self.limit_reached(&state) {
                        continue;
                    }
                    info!(
                        "Waiting {} seconds before next cycle...",
                        self.policy.success_pause.as_secs()
                    );
                    self.policy.success_pause
                }
                Err(err) => {
                    state.failures += 1;
                    error!("Error in main loop: {:#}", err);
                    self.policy.failure_pause
                }
            };

            select! {
                biased;
                _ = cancel.cancelled() => return self.finish(state, DriverExit::Interrupted),
                _ = self.clock.sleep(pause) => {}
            }
        }
    }

    fn limit_reached(&self, state: &CycleState) -> bool {
        self.cycle_limit.is_some_and(|limit| state.completed >= limit)
    }

    fn finish(&self, state: CycleState, exit: DriverExit) -> DriverSummary {
        match exit {
            DriverExit::Interrupted => info!("Stopping resource consumption"),
            DriverExit::CycleLimit => info!("Cycle limit reached after {} cycle(s)", state.completed),
        }
        DriverSummary { state, exit }
    }
}
