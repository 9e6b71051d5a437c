//! Queue runner: pulls jobs and applies the retry policy.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{Envelope, JobError, JobHandler, JobQueue, JobReceiver, RetryPolicy};
use crate::config::QueueConfig;

/// A job that will not be attempted again.
#[derive(Debug, Clone)]
pub struct DeadLetter<J> {
    pub job: J,
    /// Attempts made before giving up.
    pub attempts: u32,
    /// The last failure.
    pub error: JobError,
    pub failed_at: DateTime<Utc>,
}

/// Shared counters and the dead-letter list of a runner.
///
/// Only the most recent dead letters are kept, up to the configured capacity.
pub struct QueueMonitor<J> {
    completed: Arc<AtomicU64>,
    retried: Arc<AtomicU64>,
    dead_lettered: Arc<AtomicU64>,
    capacity: Arc<AtomicUsize>,
    dead_letters: Arc<Mutex<VecDeque<DeadLetter<J>>>>,
}

impl<J> Clone for QueueMonitor<J> {
    fn clone(&self) -> Self {
        Self {
            completed: self.completed.clone(),
            retried: self.retried.clone(),
            dead_lettered: self.dead_lettered.clone(),
            capacity: self.capacity.clone(),
            dead_letters: self.dead_letters.clone(),
        }
    }
}

impl<J: Clone> QueueMonitor<J> {
    fn new(capacity: usize) -> Self {
        Self {
            completed: Arc::new(AtomicU64::new(0)),
            retried: Arc::new(AtomicU64::new(0)),
            dead_lettered: Arc::new(AtomicU64::new(0)),
            capacity: Arc::new(AtomicUsize::new(capacity)),
            dead_letters: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    async fn push_dead_letter(&self, letter: DeadLetter<J>) {
        let capacity = self.capacity.load(Ordering::SeqCst);
        let mut letters = self.dead_letters.lock().await;
        while !letters.is_empty() && letters.len() >= capacity {
            letters.pop_front();
        }
        if capacity > 0 {
            letters.push_back(letter);
        }
        self.dead_lettered.fetch_add(1, Ordering::SeqCst);
    }

    /// Jobs that finished successfully.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Retries scheduled so far.
    pub fn retried(&self) -> u64 {
        self.retried.load(Ordering::SeqCst)
    }

    /// Jobs given up on so far, including ones no longer retained.
    pub fn dead_lettered(&self) -> u64 {
        self.dead_lettered.load(Ordering::SeqCst)
    }

    /// Snapshot of the retained dead letters, oldest first.
    pub async fn dead_letters(&self) -> Vec<DeadLetter<J>> {
        self.dead_letters.lock().await.iter().cloned().collect()
    }

    pub async fn dead_letter_count(&self) -> usize {
        self.dead_letters.lock().await.len()
    }
}

/// Consumes a [`JobQueue`] with a [`JobHandler`].
pub struct QueueRunner<J, H> {
    receiver: JobReceiver<J>,
    queue: JobQueue<J>,
    handler: Arc<H>,
    policy: RetryPolicy,
    concurrency: usize,
    job_timeout: Duration,
    monitor: QueueMonitor<J>,
}

impl<J, H> QueueRunner<J, H>
where
    J: Clone + Debug + Send + Sync + 'static,
    H: JobHandler<J>,
{
    /// Create a runner. `queue` is used to put retries back.
    pub fn new(queue: JobQueue<J>, receiver: JobReceiver<J>, handler: H) -> Self {
        let defaults = QueueConfig::default();
        Self {
            receiver,
            queue,
            handler: Arc::new(handler),
            policy: RetryPolicy::from_config(&defaults),
            concurrency: defaults.concurrency,
            job_timeout: defaults.job_timeout(),
            monitor: QueueMonitor::new(defaults.dead_letter_capacity),
        }
    }

    /// Apply the `[queue]` config section.
    pub fn with_config(mut self, config: &QueueConfig) -> Self {
        self.policy = RetryPolicy::from_config(config);
        self.concurrency = config.concurrency.max(1);
        self.job_timeout = config.job_timeout();
        self.monitor
            .capacity
            .store(config.dead_letter_capacity, Ordering::SeqCst);
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Handle for counters and dead letters.
    pub fn monitor(&self) -> QueueMonitor<J> {
        self.monitor.clone()
    }

    /// Run until every producer handle, including the runner's own, is gone.
    ///
    /// In practice this runs for the life of the process; abort the task to stop it.
    pub async fn run(mut self) {
        info!(
            "{} runner started (concurrency: {}, max attempts: {})",
            self.handler.name(),
            self.concurrency,
            self.policy.max_attempts
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        while let Some(envelope) = self.receiver.recv().await {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            let attempt = Attempt {
                handler: self.handler.clone(),
                queue: self.queue.clone(),
                policy: self.policy,
                job_timeout: self.job_timeout,
                monitor: self.monitor.clone(),
            };
            tokio::spawn(async move {
                attempt.execute(envelope).await;
                drop(permit);
            });
        }

        info!("{} runner stopped", self.handler.name());
    }

    /// Spawn [`run`](Self::run) on the tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

struct Attempt<J, H> {
    handler: Arc<H>,
    queue: JobQueue<J>,
    policy: RetryPolicy,
    job_timeout: Duration,
    monitor: QueueMonitor<J>,
}

impl<J, H> Attempt<J, H>
where
    J: Clone + Debug + Send + Sync + 'static,
    H: JobHandler<J>,
{
    async fn execute(self, envelope: Envelope<J>) {
        let attempts = envelope.attempts + 1;
        let name = self.handler.name();

        let outcome =
            match tokio::time::timeout(self.job_timeout, self.handler.handle(&envelope.job)).await
            {
                Ok(result) => result,
                Err(_) => Err(JobError::Retryable(format!(
                    "attempt timed out after {}s",
                    self.job_timeout.as_secs_f64()
                ))),
            };

        match outcome {
            Ok(()) => {
                self.monitor.completed.fetch_add(1, Ordering::SeqCst);
                debug!("{} {:?} completed (attempt {})", name, envelope.job, attempts);
            }
            Err(JobError::Retryable(reason)) if self.policy.should_retry(attempts) => {
                let delay = self.policy.backoff(attempts);
                warn!(
                    "{} {:?} failed (attempt {}/{}): {}; retrying in {:?}",
                    name, envelope.job, attempts, self.policy.max_attempts, reason, delay
                );
                self.monitor.retried.fetch_add(1, Ordering::SeqCst);

                let queue = self.queue;
                let job = envelope.job;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if queue.send(Envelope { job, attempts }).is_err() {
                        error!("{} retry dropped: queue closed", name);
                    }
                });
            }
            Err(err) => {
                error!(
                    "{} {:?} dead-lettered after {} attempt(s): {}",
                    name, envelope.job, attempts, err
                );
                self.monitor
                    .push_dead_letter(DeadLetter {
                        job: envelope.job,
                        attempts,
                        error: err,
                        failed_at: Utc::now(),
                    })
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    /// Fails with the given error until `succeed_on` attempts have been made.
    struct Flaky {
        calls: Arc<AtomicU32>,
        succeed_on: u32,
        error: JobError,
    }

    #[async_trait]
    impl JobHandler<u32> for Flaky {
        async fn handle(&self, _job: &u32) -> Result<(), JobError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.succeed_on {
                Ok(())
            } else {
                Err(self.error.clone())
            }
        }
    }

    struct Slow;

    #[async_trait]
    impl JobHandler<u32> for Slow {
        async fn handle(&self, _job: &u32) -> Result<(), JobError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(5))
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..500 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let (queue, receiver) = JobQueue::channel();
        let runner = QueueRunner::new(
            queue.clone(),
            receiver,
            Flaky {
                calls: calls.clone(),
                succeed_on: 1,
                error: JobError::Retryable("x".into()),
            },
        )
        .with_policy(fast_policy(3));
        let monitor = runner.monitor();
        let handle = runner.spawn();

        queue.enqueue(1).unwrap();
        wait_until(|| monitor.completed() == 1).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.retried(), 0);
        handle.abort();
    }

    #[tokio::test]
    async fn test_retryable_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let (queue, receiver) = JobQueue::channel();
        let runner = QueueRunner::new(
            queue.clone(),
            receiver,
            Flaky {
                calls: calls.clone(),
                succeed_on: 3,
                error: JobError::Retryable("not yet".into()),
            },
        )
        .with_policy(fast_policy(5));
        let monitor = runner.monitor();
        let handle = runner.spawn();

        queue.enqueue(7).unwrap();
        wait_until(|| monitor.completed() == 1).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(monitor.retried(), 2);
        assert_eq!(monitor.dead_letter_count().await, 0);
        handle.abort();
    }

    #[tokio::test]
    async fn test_retries_exhausted_dead_letter() {
        let calls = Arc::new(AtomicU32::new(0));
        let (queue, receiver) = JobQueue::channel();
        let runner = QueueRunner::new(
            queue.clone(),
            receiver,
            Flaky {
                calls: calls.clone(),
                succeed_on: u32::MAX,
                error: JobError::Retryable("always".into()),
            },
        )
        .with_policy(fast_policy(3));
        let monitor = runner.monitor();
        let handle = runner.spawn();

        queue.enqueue(9).unwrap();
        for _ in 0..500 {
            if monitor.dead_letter_count().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let dead = monitor.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].job, 9);
        assert_eq!(dead[0].attempts, 3);
        assert_eq!(dead[0].error, JobError::Retryable("always".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(monitor.completed(), 0);
        handle.abort();
    }

    #[tokio::test]
    async fn test_fatal_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let (queue, receiver) = JobQueue::channel();
        let runner = QueueRunner::new(
            queue.clone(),
            receiver,
            Flaky {
                calls: calls.clone(),
                succeed_on: u32::MAX,
                error: JobError::Fatal("bad job".into()),
            },
        )
        .with_policy(fast_policy(5));
        let monitor = runner.monitor();
        let handle = runner.spawn();

        queue.enqueue(1).unwrap();
        for _ in 0..500 {
            if monitor.dead_letter_count().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let dead = monitor.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.retried(), 0);
        handle.abort();
    }

    #[tokio::test]
    async fn test_dead_letters_capped() {
        let (queue, receiver) = JobQueue::channel();
        let config = QueueConfig {
            max_attempts: 1,
            concurrency: 1,
            dead_letter_capacity: 2,
            ..QueueConfig::default()
        };
        let runner = QueueRunner::new(
            queue.clone(),
            receiver,
            Flaky {
                calls: Arc::new(AtomicU32::new(0)),
                succeed_on: u32::MAX,
                error: JobError::Fatal("bad job".into()),
            },
        )
        .with_config(&config);
        let monitor = runner.monitor();
        let handle = runner.spawn();

        for job in 1..=5u32 {
            queue.enqueue(job).unwrap();
        }
        wait_until(|| monitor.dead_lettered() == 5).await;

        // One job at a time, so the two newest are kept
        let kept: Vec<u32> = monitor.dead_letters().await.iter().map(|d| d.job).collect();
        assert_eq!(kept, vec![4, 5]);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_retryable() {
        let (queue, receiver) = JobQueue::channel();
        let runner = QueueRunner::new(queue.clone(), receiver, Slow)
            .with_policy(fast_policy(2))
            .with_job_timeout(Duration::from_secs(1));
        let monitor = runner.monitor();
        let handle = runner.spawn();

        queue.enqueue(1).unwrap();
        for _ in 0..100 {
            if monitor.dead_letter_count().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        let dead = monitor.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, 2);
        assert!(matches!(dead[0].error, JobError::Retryable(_)));
        assert_eq!(monitor.retried(), 1);
        handle.abort();
    }
}
