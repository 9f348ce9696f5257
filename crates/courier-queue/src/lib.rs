// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-account ordered, rate-limited send queues.
//!
//! Every account gets its own [`AccountQueue`] worker created on first use.
//! Within one account, sends execute in priority-then-FIFO order under a
//! concurrency ceiling and a minimum inter-send interval; across accounts,
//! queues are fully independent. Retryable failures are retried with
//! exponential backoff before being surfaced as terminal.

mod account;
mod backoff;

pub use account::AccountQueue;
pub use backoff::backoff_delay;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use courier_config::QueueConfig;
use courier_core::types::{AccountId, SendJob, SendResult};
use courier_core::CourierError;

/// The operation a queue invokes to actually perform a send. Implemented by
/// the channel router; queues never talk to adapters directly.
#[async_trait]
pub trait SendExecutor: Send + Sync + 'static {
    async fn execute(&self, job: &SendJob) -> Result<SendResult, CourierError>;
}

/// Point-in-time counters for one account queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub in_flight: usize,
    pub processed: u64,
    pub failed: u64,
    pub retried: u64,
    pub paused: bool,
}

/// Registry of per-account send queues, created lazily on first enqueue.
pub struct SendQueues {
    config: QueueConfig,
    executor: Arc<dyn SendExecutor>,
    queues: DashMap<AccountId, Arc<AccountQueue>>,
    cancel: CancellationToken,
}

impl SendQueues {
    pub fn new(config: QueueConfig, executor: Arc<dyn SendExecutor>) -> Self {
        Self {
            config,
            executor,
            queues: DashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// The queue for an account, spawning its worker on first use.
    pub fn queue(&self, account_id: &AccountId) -> Arc<AccountQueue> {
        self.queues
            .entry(account_id.clone())
            .or_insert_with(|| {
                debug!(account = %account_id, "spawning send queue worker");
                AccountQueue::spawn(
                    account_id.clone(),
                    self.config.clone(),
                    Arc::clone(&self.executor),
                    self.cancel.child_token(),
                )
            })
            .clone()
    }

    /// Enqueues on the owning account's queue at the default priority.
    pub async fn enqueue(&self, job: SendJob) -> SendResult {
        self.queue(job.account_id()).enqueue(job).await
    }

    /// Enqueues at an explicit priority.
    pub async fn enqueue_with_priority(&self, job: SendJob, priority: i32) -> SendResult {
        self.queue(job.account_id())
            .enqueue_with_priority(job, priority)
            .await
    }

    /// Enqueues at the configured urgent priority.
    pub async fn enqueue_urgent(&self, job: SendJob) -> SendResult {
        self.queue(job.account_id()).enqueue_urgent(job).await
    }

    /// Suspends until every queue has no pending or in-flight work.
    pub async fn drain_all(&self) {
        let queues: Vec<Arc<AccountQueue>> =
            self.queues.iter().map(|entry| entry.value().clone()).collect();
        for queue in queues {
            queue.drain().await;
        }
    }

    /// Drains in-flight work, then stops every worker and rejects whatever
    /// is still pending with a cancellation error.
    pub async fn shutdown(&self) {
        self.drain_all().await;
        self.cancel.cancel();
        self.queues.clear();
        info!("send queues shut down");
    }

    /// Snapshot of per-account queue counters.
    pub fn stats(&self) -> HashMap<AccountId, QueueStats> {
        self.queues
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use courier_core::types::{MessageId, SendParams};
    use courier_core::ChannelType;

    fn job(account: &str, text: &str) -> SendJob {
        SendJob::Message(SendParams {
            account_id: account.into(),
            channel_type: ChannelType::Telegram,
            recipient: "chat-1".into(),
            text: text.into(),
            validity_seconds: None,
            metadata: None,
        })
    }

    fn text_of(job: &SendJob) -> String {
        match job {
            SendJob::Message(p) => p.text.clone(),
            SendJob::Media(p) => p.media_url.clone(),
        }
    }

    /// Records execution order; optionally fails the first N attempts per
    /// message as retryable.
    struct RecordingExecutor {
        order: Mutex<Vec<String>>,
        fail_first: usize,
        attempts: AtomicUsize,
        concurrent: AtomicUsize,
        max_concurrent: AtomicUsize,
        delay: Duration,
    }

    impl RecordingExecutor {
        fn new() -> Arc<Self> {
            Self::with_failures(0)
        }

        fn with_failures(fail_first: usize) -> Arc<Self> {
            Arc::new(Self {
                order: Mutex::new(Vec::new()),
                fail_first,
                attempts: AtomicUsize::new(0),
                concurrent: AtomicUsize::new(0),
                max_concurrent: AtomicUsize::new(0),
                delay: Duration::from_millis(0),
            })
        }

        fn order(&self) -> Vec<String> {
            self.order.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SendExecutor for RecordingExecutor {
        async fn execute(&self, job: &SendJob) -> Result<SendResult, CourierError> {
            let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.order.lock().unwrap().push(text_of(job));
            self.concurrent.fetch_sub(1, Ordering::SeqCst);
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.fail_first {
                return Ok(SendResult::failure("transient channel error", true));
            }
            Ok(SendResult::ok(MessageId(format!("sent-{attempt}"))))
        }
    }

    fn fast_config() -> QueueConfig {
        QueueConfig {
            capacity: 8,
            concurrency: 1,
            min_send_interval_ms: 0,
            max_retries: 3,
            retry_base_ms: 1,
            retry_max_ms: 10,
            urgent_priority: 100,
        }
    }

    #[tokio::test]
    async fn urgent_send_dispatches_before_default_priority() {
        let executor = RecordingExecutor::new();
        let queues = SendQueues::new(fast_config(), executor.clone());
        let queue = queues.queue(&"acct1".into());

        // Hold the worker so both entries are in the backlog before any
        // dispatch decision is made.
        queue.pause();
        let normal = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue_with_priority(job("acct1", "normal"), 0).await }
        });
        let urgent = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue_with_priority(job("acct1", "urgent"), 100).await }
        });
        while queue.len() < 2 {
            tokio::task::yield_now().await;
        }
        queue.resume();

        assert!(normal.await.unwrap().success);
        assert!(urgent.await.unwrap().success);
        assert_eq!(executor.order(), vec!["urgent".to_string(), "normal".to_string()]);
    }

    #[tokio::test]
    async fn urgent_enqueued_mid_send_overtakes_older_backlog() {
        let executor = Arc::new(RecordingExecutor {
            order: Mutex::new(Vec::new()),
            fail_first: 0,
            attempts: AtomicUsize::new(0),
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
            delay: Duration::from_millis(100),
        });
        let queues = SendQueues::new(fast_config(), executor.clone());
        let queue = queues.queue(&"acct1".into());

        let slow = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(job("acct1", "slow")).await }
        });
        while executor.concurrent.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        // Both land in the backlog while "slow" is still executing; the
        // urgent one arrives later but must dispatch first.
        let normal = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(job("acct1", "normal")).await }
        });
        while queue.len() < 1 {
            tokio::task::yield_now().await;
        }
        let urgent = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue_urgent(job("acct1", "urgent")).await }
        });
        while queue.len() < 2 {
            tokio::task::yield_now().await;
        }

        assert!(slow.await.unwrap().success);
        assert!(urgent.await.unwrap().success);
        assert!(normal.await.unwrap().success);
        assert_eq!(
            executor.order(),
            vec!["slow".to_string(), "urgent".to_string(), "normal".to_string()]
        );
    }

    #[tokio::test]
    async fn equal_priority_is_fifo() {
        let executor = RecordingExecutor::new();
        let queues = SendQueues::new(fast_config(), executor.clone());
        let queue = queues.queue(&"acct1".into());

        queue.pause();
        let mut handles = Vec::new();
        for name in ["first", "second", "third"] {
            let task_queue = queue.clone();
            handles.push(tokio::spawn(async move {
                task_queue.enqueue(job("acct1", name)).await
            }));
            while queue.len() < handles.len() {
                tokio::task::yield_now().await;
            }
        }
        queue.resume();
        for handle in handles {
            assert!(handle.await.unwrap().success);
        }
        assert_eq!(
            executor.order(),
            vec!["first".to_string(), "second".to_string(), "third".to_string()]
        );
    }

    #[tokio::test]
    async fn full_queue_rejects_immediately() {
        let executor = RecordingExecutor::new();
        let config = QueueConfig {
            capacity: 1,
            ..fast_config()
        };
        let queues = SendQueues::new(config, executor);
        let queue = queues.queue(&"acct1".into());

        queue.pause();
        let held = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(job("acct1", "held")).await }
        });
        while queue.len() < 1 {
            tokio::task::yield_now().await;
        }

        let rejected = queue.enqueue(job("acct1", "overflow")).await;
        assert!(!rejected.success);
        assert!(rejected.retryable);
        assert!(rejected.error.unwrap().contains("queue full"));

        queue.resume();
        assert!(held.await.unwrap().success);
    }

    #[tokio::test]
    async fn retryable_failures_retry_then_succeed() {
        let executor = RecordingExecutor::with_failures(2);
        let queues = SendQueues::new(fast_config(), executor.clone());

        let result = queues.enqueue(job("acct1", "retry-me")).await;
        assert!(result.success);
        assert_eq!(executor.attempts.load(Ordering::SeqCst), 3);

        let stats = queues.stats();
        let stats = stats.get(&"acct1".into()).unwrap();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.retried, 2);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_terminal_failure() {
        // Fails more times than the initial attempt plus max_retries allows.
        let executor = RecordingExecutor::with_failures(10);
        let queues = SendQueues::new(fast_config(), executor.clone());

        let result = queues.enqueue(job("acct1", "doomed")).await;
        assert!(!result.success);
        assert!(!result.retryable);
        assert_eq!(result.error.as_deref(), Some("transient channel error"));
        // 1 initial + 3 retries.
        assert_eq!(executor.attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn non_retryable_failure_is_not_retried() {
        struct HardFail;
        #[async_trait]
        impl SendExecutor for HardFail {
            async fn execute(&self, _job: &SendJob) -> Result<SendResult, CourierError> {
                Ok(SendResult::failure("recipient blocked", false))
            }
        }

        let queues = SendQueues::new(fast_config(), Arc::new(HardFail));
        let result = queues.enqueue(job("acct1", "blocked")).await;
        assert!(!result.success);
        assert!(!result.retryable);
        assert_eq!(result.error.as_deref(), Some("recipient blocked"));
    }

    #[tokio::test]
    async fn clear_rejects_pending_with_cancellation() {
        let executor = RecordingExecutor::new();
        let queues = SendQueues::new(fast_config(), executor.clone());
        let queue = queues.queue(&"acct1".into());

        queue.pause();
        let pending = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(job("acct1", "never-sent")).await }
        });
        while queue.len() < 1 {
            tokio::task::yield_now().await;
        }

        assert_eq!(queue.clear(), 1);
        let result = pending.await.unwrap();
        assert!(!result.success);
        assert!(!result.retryable);
        assert!(result.error.unwrap().contains("cancelled"));
        assert!(executor.order().is_empty());
    }

    #[tokio::test]
    async fn concurrency_ceiling_is_respected() {
        let executor = Arc::new(RecordingExecutor {
            order: Mutex::new(Vec::new()),
            fail_first: 0,
            attempts: AtomicUsize::new(0),
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
            delay: Duration::from_millis(20),
        });
        let config = QueueConfig {
            concurrency: 2,
            ..fast_config()
        };
        let queues = SendQueues::new(config, executor.clone());
        let queue = queues.queue(&"acct1".into());

        let mut handles = Vec::new();
        for i in 0..6 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                queue.enqueue(job("acct1", &format!("m{i}"))).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().success);
        }
        assert!(executor.max_concurrent.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn min_send_interval_spaces_dispatches() {
        let executor = RecordingExecutor::new();
        let config = QueueConfig {
            min_send_interval_ms: 30,
            ..fast_config()
        };
        let queues = SendQueues::new(config, executor);
        let queue = queues.queue(&"acct1".into());

        let start = Instant::now();
        queue.enqueue(job("acct1", "a")).await;
        queue.enqueue(job("acct1", "b")).await;
        queue.enqueue(job("acct1", "c")).await;
        // Three sends, two enforced gaps.
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn drain_waits_for_backlog_and_in_flight() {
        let executor = Arc::new(RecordingExecutor {
            order: Mutex::new(Vec::new()),
            fail_first: 0,
            attempts: AtomicUsize::new(0),
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
            delay: Duration::from_millis(10),
        });
        let queues = SendQueues::new(fast_config(), executor.clone());
        let queue = queues.queue(&"acct1".into());

        queue.pause();
        let mut handles = Vec::new();
        for i in 0..4 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                queue.enqueue(job("acct1", &format!("m{i}"))).await
            }));
        }
        while queue.len() < 4 {
            tokio::task::yield_now().await;
        }
        queue.resume();
        queues.drain_all().await;

        assert_eq!(queue.stats().pending, 0);
        assert_eq!(queue.stats().in_flight, 0);
        assert_eq!(executor.order().len(), 4);
        for handle in handles {
            assert!(handle.await.unwrap().success);
        }
    }

    #[tokio::test]
    async fn accounts_get_independent_queues() {
        let executor = RecordingExecutor::new();
        let queues = SendQueues::new(fast_config(), executor.clone());

        let a = queues.enqueue(job("acct1", "from-a")).await;
        let b = queues.enqueue(job("acct2", "from-b")).await;
        assert!(a.success && b.success);
        assert_eq!(queues.stats().len(), 2);
    }
}
