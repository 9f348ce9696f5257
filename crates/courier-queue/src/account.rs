// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-account send queue worker.
//!
//! One `AccountQueue` owns the backlog for a single account and enforces
//! priority-then-FIFO ordering, an in-flight concurrency ceiling, a minimum
//! inter-send interval, and bounded retry with exponential backoff. All of
//! this is per account; queues for different accounts are fully independent.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{Notify, Semaphore, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use courier_config::QueueConfig;
use courier_core::types::{AccountId, SendJob, SendResult};
use courier_core::CourierError;

use crate::backoff::backoff_delay;
use crate::{QueueStats, SendExecutor};

/// A backlog entry awaiting dispatch. Ordered by priority descending, then
/// by enqueue sequence ascending (FIFO within equal priority).
struct PendingSend {
    seq: u64,
    priority: i32,
    job: SendJob,
    reply: oneshot::Sender<SendResult>,
}

impl PartialEq for PendingSend {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for PendingSend {}

impl PartialOrd for PendingSend {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingSend {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: greater means dispatched first.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Ordered, rate-limited send queue for one account.
pub struct AccountQueue {
    account_id: AccountId,
    config: QueueConfig,
    executor: Arc<dyn SendExecutor>,
    backlog: Mutex<BinaryHeap<PendingSend>>,
    /// Claimed or executing entries; together with the backlog this defines
    /// "work remaining" for `drain`.
    in_flight: AtomicUsize,
    dispatch_permits: Arc<Semaphore>,
    work_notify: Notify,
    idle_notify: Notify,
    paused: AtomicBool,
    next_seq: AtomicU64,
    cancel: CancellationToken,
    processed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

impl AccountQueue {
    /// Creates the queue and spawns its worker loop on the current runtime.
    pub fn spawn(
        account_id: AccountId,
        config: QueueConfig,
        executor: Arc<dyn SendExecutor>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let concurrency = config.concurrency.max(1);
        let queue = Arc::new(Self {
            account_id,
            config,
            executor,
            backlog: Mutex::new(BinaryHeap::new()),
            in_flight: AtomicUsize::new(0),
            dispatch_permits: Arc::new(Semaphore::new(concurrency)),
            work_notify: Notify::new(),
            idle_notify: Notify::new(),
            paused: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
            cancel,
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            retried: AtomicU64::new(0),
        });
        tokio::spawn(Arc::clone(&queue).run());
        queue
    }

    /// Enqueues a send at the default priority and suspends until it is
    /// processed. Fails immediately with a retryable "queue full" result
    /// when the backlog is at capacity.
    pub async fn enqueue(&self, job: SendJob) -> SendResult {
        self.enqueue_with_priority(job, 0).await
    }

    /// Enqueues at the configured urgent priority.
    pub async fn enqueue_urgent(&self, job: SendJob) -> SendResult {
        self.enqueue_with_priority(job, self.config.urgent_priority)
            .await
    }

    /// Enqueues at an explicit priority. Higher values dispatch first;
    /// within equal priority, FIFO by enqueue order.
    pub async fn enqueue_with_priority(&self, job: SendJob, priority: i32) -> SendResult {
        // The worker is gone once cancelled; nothing would ever reply.
        if self.cancel.is_cancelled() {
            return SendResult::failure(
                CourierError::Cancelled("queue shut down".into()).to_string(),
                false,
            );
        }
        let (reply, result) = oneshot::channel();
        {
            let mut backlog = self.backlog.lock().expect("queue lock poisoned");
            if backlog.len() >= self.config.capacity {
                let err = CourierError::QueueFull {
                    account: self.account_id.clone(),
                    capacity: self.config.capacity,
                };
                warn!(account = %self.account_id, capacity = self.config.capacity,
                    "send rejected, queue full");
                return SendResult::failure(err.to_string(), true);
            }
            let seq = self.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
            backlog.push(PendingSend {
                seq,
                priority,
                job,
                reply,
            });
        }
        self.work_notify.notify_one();
        match result.await {
            Ok(outcome) => outcome,
            // The worker dropped the entry without replying; only possible
            // on shutdown.
            Err(_) => SendResult::failure(
                CourierError::Cancelled("queue shut down".into()).to_string(),
                false,
            ),
        }
    }

    /// Stops starting new executions. Queued entries are kept.
    pub fn pause(&self) {
        self.paused.store(true, AtomicOrdering::SeqCst);
        debug!(account = %self.account_id, "queue paused");
    }

    /// Resumes dispatching queued entries.
    pub fn resume(&self) {
        self.paused.store(false, AtomicOrdering::SeqCst);
        self.work_notify.notify_one();
        debug!(account = %self.account_id, "queue resumed");
    }

    /// Rejects every not-yet-started entry with a cancellation error and
    /// empties the backlog. In-flight sends are not interrupted; their
    /// outcome is unknown to the canceller, not failed. Returns the number
    /// of entries cancelled.
    pub fn clear(&self) -> usize {
        let drained: Vec<PendingSend> = {
            let mut backlog = self.backlog.lock().expect("queue lock poisoned");
            backlog.drain().collect()
        };
        let cancelled = CourierError::Cancelled("queue cleared".into()).to_string();
        for entry in &drained {
            debug!(account = %self.account_id, seq = entry.seq, "pending send cancelled");
        }
        let count = drained.len();
        for entry in drained {
            let _ = entry.reply.send(SendResult::failure(cancelled.clone(), false));
        }
        self.signal_if_idle();
        count
    }

    /// Suspends until the queue has no pending or in-flight work.
    pub async fn drain(&self) {
        loop {
            let notified = self.idle_notify.notified();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.backlog.lock().expect("queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.len(),
            in_flight: self.in_flight.load(AtomicOrdering::SeqCst),
            processed: self.processed.load(AtomicOrdering::Relaxed),
            failed: self.failed.load(AtomicOrdering::Relaxed),
            retried: self.retried.load(AtomicOrdering::Relaxed),
            paused: self.paused.load(AtomicOrdering::SeqCst),
        }
    }

    fn is_idle(&self) -> bool {
        self.in_flight.load(AtomicOrdering::SeqCst) == 0 && self.is_empty()
    }

    fn signal_if_idle(&self) {
        if self.is_idle() {
            self.idle_notify.notify_waiters();
        }
    }

    fn has_claimable_work(&self) -> bool {
        !self.paused.load(AtomicOrdering::SeqCst) && !self.is_empty()
    }

    /// Pops the highest-priority entry and claims it as in-flight, under
    /// one lock so `drain` never observes a gap between the two.
    fn claim_next(&self) -> Option<PendingSend> {
        if self.paused.load(AtomicOrdering::SeqCst) {
            return None;
        }
        let mut backlog = self.backlog.lock().expect("queue lock poisoned");
        let entry = backlog.pop()?;
        self.in_flight.fetch_add(1, AtomicOrdering::SeqCst);
        Some(entry)
    }

    async fn run(self: Arc<Self>) {
        let min_interval = Duration::from_millis(self.config.min_send_interval_ms);
        let mut last_dispatch: Option<Instant> = None;
        loop {
            loop {
                if self.cancel.is_cancelled() {
                    self.reject_remaining();
                    return;
                }
                if self.has_claimable_work() {
                    break;
                }
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        self.reject_remaining();
                        return;
                    }
                    _ = self.work_notify.notified() => {}
                }
            }

            // Rate-limit and permit waits happen before anything is popped:
            // an urgent entry enqueued while the worker waits here still
            // dispatches first, and `clear` can reject any entry that has
            // not started executing.
            if let Some(previous) = last_dispatch {
                let elapsed = previous.elapsed();
                if elapsed < min_interval {
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            self.reject_remaining();
                            return;
                        }
                        _ = tokio::time::sleep(min_interval - elapsed) => {}
                    }
                }
            }
            let permit = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.reject_remaining();
                    return;
                }
                acquired = Arc::clone(&self.dispatch_permits).acquire_owned() => {
                    match acquired {
                        Ok(permit) => permit,
                        Err(_) => return,
                    }
                }
            };

            // The backlog may have been cleared or paused while waiting.
            let Some(entry) = self.claim_next() else {
                drop(permit);
                continue;
            };
            last_dispatch = Some(Instant::now());

            let queue = Arc::clone(&self);
            tokio::spawn(async move {
                let result = queue.execute_with_retry(&entry.job).await;
                if result.success {
                    queue.processed.fetch_add(1, AtomicOrdering::Relaxed);
                } else {
                    queue.failed.fetch_add(1, AtomicOrdering::Relaxed);
                }
                let _ = entry.reply.send(result);
                drop(permit);
                queue.in_flight.fetch_sub(1, AtomicOrdering::SeqCst);
                queue.signal_if_idle();
            });
        }
    }

    /// Bounded retry loop: the initial attempt plus up to `max_retries`
    /// retries on retryable failures, with exponential backoff between
    /// attempts. After exhaustion the last failure is returned terminal.
    async fn execute_with_retry(&self, job: &SendJob) -> SendResult {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result = match self.executor.execute(job).await {
                Ok(result) => result,
                // Executor errors have unknown cause; treat as retryable.
                Err(err) => SendResult::failure(err.to_string(), true),
            };
            if result.success {
                return result;
            }
            if !result.retryable || attempt > self.config.max_retries {
                if attempt > self.config.max_retries {
                    warn!(
                        account = %self.account_id,
                        attempts = attempt,
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "send failed, retries exhausted"
                    );
                }
                return SendResult {
                    retryable: false,
                    ..result
                };
            }
            self.retried.fetch_add(1, AtomicOrdering::Relaxed);
            let delay = backoff_delay(attempt, self.config.retry_base_ms, self.config.retry_max_ms);
            debug!(
                account = %self.account_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "send failed, backing off before retry"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return SendResult {
                        retryable: false,
                        ..result
                    };
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn reject_remaining(&self) {
        let cancelled = self.clear();
        if cancelled > 0 {
            debug!(account = %self.account_id, cancelled, "queue worker stopped with backlog");
        }
    }
}
