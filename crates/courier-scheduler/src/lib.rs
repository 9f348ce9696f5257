// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background job scheduling.
//!
//! Runs named jobs on a fixed repeating interval or once after a delay.
//! A repeating job's runs never overlap: each tick awaits the job to
//! completion before the next tick is taken, and a slow run delays the
//! following tick rather than bursting to catch up.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use courier_core::CourierError;

/// A unit of background work invoked by the scheduler.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Stable name used in logs.
    fn name(&self) -> &str;

    async fn run(&self) -> Result<(), CourierError>;
}

/// Spawns and owns background job tasks until shutdown.
pub struct Scheduler {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Runs the job every `interval`, starting one interval from now. Job
    /// errors are logged and do not stop the schedule.
    pub fn schedule_repeating(&self, job: Arc<dyn Job>, interval: Duration) {
        let cancel = self.cancel.child_token();
        self.tracker.spawn(async move {
            let name = job.name().to_string();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval's first tick completes immediately; consume it so the
            // first run happens one interval from scheduling.
            ticker.tick().await;
            info!(job = %name, interval_ms = interval.as_millis() as u64, "repeating job scheduled");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(job = %name, "repeating job stopped");
                        return;
                    }
                    _ = ticker.tick() => {}
                }
                // Awaiting here is what guarantees no two runs overlap.
                if let Err(e) = job.run().await {
                    warn!(job = %name, error = %e, "job run failed");
                }
            }
        });
    }

    /// Runs the job once after `delay`, unless shut down first.
    pub fn schedule_delayed(&self, job: Arc<dyn Job>, delay: Duration) {
        let cancel = self.cancel.child_token();
        self.tracker.spawn(async move {
            let name = job.name().to_string();
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(job = %name, "delayed job cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            if let Err(e) = job.run().await {
                warn!(job = %name, error = %e, "delayed job failed");
            }
        });
    }

    /// Stops all jobs and waits for in-progress runs to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("scheduler shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingJob {
        runs: AtomicUsize,
        concurrent: AtomicUsize,
        overlapped: AtomicUsize,
        run_for: Duration,
    }

    impl CountingJob {
        fn new(run_for: Duration) -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
                concurrent: AtomicUsize::new(0),
                overlapped: AtomicUsize::new(0),
                run_for,
            })
        }
    }

    #[async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run(&self) -> Result<(), CourierError> {
            if self.concurrent.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlapped.fetch_add(1, Ordering::SeqCst);
            }
            if !self.run_for.is_zero() {
                tokio::time::sleep(self.run_for).await;
            }
            self.concurrent.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn repeating_job_runs_repeatedly() {
        let scheduler = Scheduler::new();
        let job = CountingJob::new(Duration::ZERO);
        scheduler.schedule_repeating(job.clone(), Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(40)).await;
        scheduler.shutdown().await;
        assert!(job.runs.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn slow_runs_never_overlap() {
        let scheduler = Scheduler::new();
        // Runs take four times the tick interval.
        let job = CountingJob::new(Duration::from_millis(20));
        scheduler.schedule_repeating(job.clone(), Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(80)).await;
        scheduler.shutdown().await;
        assert!(job.runs.load(Ordering::SeqCst) >= 2);
        assert_eq!(job.overlapped.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn delayed_job_runs_once() {
        let scheduler = Scheduler::new();
        let job = CountingJob::new(Duration::ZERO);
        scheduler.schedule_delayed(job.clone(), Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_cancels_pending_delayed_jobs() {
        let scheduler = Scheduler::new();
        let job = CountingJob::new(Duration::ZERO);
        scheduler.schedule_delayed(job.clone(), Duration::from_secs(60));

        scheduler.shutdown().await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_job_keeps_its_schedule() {
        struct Flaky {
            runs: Mutex<usize>,
        }

        #[async_trait]
        impl Job for Flaky {
            fn name(&self) -> &str {
                "flaky"
            }

            async fn run(&self) -> Result<(), CourierError> {
                let mut runs = self.runs.lock().unwrap();
                *runs += 1;
                Err(CourierError::Internal("boom".into()))
            }
        }

        let scheduler = Scheduler::new();
        let job = Arc::new(Flaky {
            runs: Mutex::new(0),
        });
        scheduler.schedule_repeating(job.clone(), Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(30)).await;
        scheduler.shutdown().await;
        assert!(*job.runs.lock().unwrap() >= 2);
    }
}
