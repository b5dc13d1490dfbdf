pub mod cycle;
pub mod scheduler;

pub use cycle::{CycleOutcome, CyclePhase, PollController, PollSettings, MAX_FILES_PER_CYCLE};
pub use scheduler::{Scheduler, SchedulerHandle, Timer, TokioTimer};
