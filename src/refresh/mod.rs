pub mod job;
pub mod scheduler;

pub use job::{RefreshJob, RefreshOutcome};
pub use scheduler::{ScheduledJob, Scheduler, REFRESH_JOB};
