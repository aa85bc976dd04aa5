use super::job::RefreshJob;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Job name the ranked-list refresh is registered under.
pub const REFRESH_JOB: &str = "recirc_refresh";

/// Work the scheduler can run on a recurring interval.
#[async_trait::async_trait]
pub trait ScheduledJob: Send + Sync + 'static {
    async fn run(&self);
}

#[async_trait::async_trait]
impl ScheduledJob for RefreshJob {
    async fn run(&self) {
        self.run_once().await;
    }
}

/// A registered task and the switch that asks it to stop.
struct Registration {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Registration {
    /// Ask the task to stop at its next tick. A run already in progress is
    /// left to finish.
    fn stop(self) {
        let _ = self.stop.send(true);
    }
}

/// Recurring background jobs keyed by name. At most one task per name.
#[derive(Default)]
pub struct Scheduler {
    jobs: Mutex<HashMap<String, Registration>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `job` to run now and then every `period`. An existing task with
    /// the same name is stopped first. Returns whether one was replaced.
    pub fn schedule<J: ScheduledJob>(&self, name: &str, period: Duration, job: Arc<J>) -> bool {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let replaced = match jobs.remove(name) {
            Some(previous) => {
                previous.stop();
                true
            }
            None => false,
        };

        let (stop, stopped) = watch::channel(false);
        let job_name = name.to_string();
        let handle = tokio::spawn(async move {
            run_every(job_name, period, job, stopped).await;
        });
        jobs.insert(name.to_string(), Registration { stop, handle });

        tracing::info!(job = name, period_secs = period.as_secs(), replaced, "job scheduled");
        replaced
    }

    /// Stop the task registered under `name`. Returns whether one existed.
    pub fn cancel(&self, name: &str) -> bool {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        match jobs.remove(name) {
            Some(registration) => {
                registration.stop();
                tracing::info!(job = name, "job cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, name: &str) -> bool {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.get(name).is_some_and(|r| !r.handle.is_finished())
    }

    /// Stop every registered task.
    pub fn shutdown(&self) {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        for (name, registration) in jobs.drain() {
            registration.stop();
            tracing::debug!(job = %name, "job stopped");
        }
    }
}

async fn run_every<J: ScheduledJob>(
    name: String,
    period: Duration,
    job: Arc<J>,
    mut stopped: watch::Receiver<bool>,
) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // Stop requests are only observed between runs
        tokio::select! {
            biased;
            _ = stopped.changed() => break,
            _ = interval.tick() => {}
        }
        if *stopped.borrow() {
            break;
        }
        tracing::debug!(job = %name, "running scheduled job");
        job.run().await;
    }
    tracing::debug!(job = %name, "job loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingJob {
        runs: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ScheduledJob for CountingJob {
        async fn run(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_every_period() {
        let scheduler = Scheduler::new();
        let job = Arc::new(CountingJob::default());
        scheduler.schedule("count", Duration::from_secs(3600), job.clone());

        tokio::task::yield_now().await;
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 2);
        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_same_name_replaces_task() {
        let scheduler = Scheduler::new();
        let first = Arc::new(CountingJob::default());
        let second = Arc::new(CountingJob::default());

        assert!(!scheduler.schedule("refresh", Duration::from_secs(60), first.clone()));
        time::sleep(Duration::from_millis(10)).await;
        assert!(scheduler.schedule("refresh", Duration::from_secs(60), second.clone()));

        time::sleep(Duration::from_secs(600)).await;
        // The first task stopped after its initial run
        assert_eq!(first.runs.load(Ordering::SeqCst), 1);
        assert!(second.runs.load(Ordering::SeqCst) >= 10);
        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_job() {
        let scheduler = Scheduler::new();
        let job = Arc::new(CountingJob::default());
        scheduler.schedule("refresh", Duration::from_secs(60), job.clone());
        time::sleep(Duration::from_millis(10)).await;
        assert!(scheduler.is_scheduled("refresh"));

        assert!(scheduler.cancel("refresh"));
        assert!(!scheduler.cancel("refresh"));
        assert!(!scheduler.is_scheduled("refresh"));

        let runs = job.runs.load(Ordering::SeqCst);
        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), runs);
    }

    #[derive(Default)]
    struct SlowJob {
        started: AtomicUsize,
        completed: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ScheduledJob for SlowJob {
        async fn run(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
            time::sleep(Duration::from_secs(5)).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_lets_in_flight_run_finish() {
        let scheduler = Scheduler::new();
        let job = Arc::new(SlowJob::default());
        scheduler.schedule("refresh", Duration::from_secs(60), job.clone());

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(job.started.load(Ordering::SeqCst), 1);
        assert_eq!(job.completed.load(Ordering::SeqCst), 0);

        assert!(scheduler.cancel("refresh"));
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(job.completed.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(job.started.load(Ordering::SeqCst), 1);
        assert_eq!(job.completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_during_run_does_not_interrupt_it() {
        let scheduler = Scheduler::new();
        let slow = Arc::new(SlowJob::default());
        let next = Arc::new(CountingJob::default());
        scheduler.schedule("refresh", Duration::from_secs(60), slow.clone());

        time::sleep(Duration::from_secs(1)).await;
        assert!(scheduler.schedule("refresh", Duration::from_secs(60), next.clone()));

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(slow.completed.load(Ordering::SeqCst), 1);
        assert_eq!(next.runs.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_scheduled("refresh"));
        scheduler.shutdown();
    }
}
