mod cpu;
mod disk;
pub mod driver;
mod jobs;
mod memory;
mod network;
mod orchestrator;

pub use cpu::burn_cpu;
pub use disk::{churn_disk, SCRATCH_PREFIX};
pub use driver::{
    Clock, CycleDriver, CycleRunner, CycleState, DriverExit, DriverSummary, RetryPolicy,
    TokioClock,
};
pub use jobs::{CycleReport, JobKind, JobOutcome, JobReport, JobSummary, ResourceJob};
pub use memory::{allocate_block, hold_memory, HeldBlock, MemoryArena, MIB};
pub use network::{pull_bandwidth, PullSettings};
pub use orchestrator::ResourceOrchestrator;
