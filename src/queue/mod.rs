//! In-process job queue for filevault.
//!
//! Producers push jobs onto a [`JobQueue`]; a [`QueueRunner`] pulls them
//! and hands them to a [`JobHandler`] with bounded concurrency, a per-attempt
//! timeout, exponential backoff for retryable failures and a dead-letter
//! list for jobs that cannot succeed. Delivery is at-least-once for the
//! lifetime of the process.

mod retry;
mod runner;

pub use retry::RetryPolicy;
pub use runner::{DeadLetter, QueueMonitor, QueueRunner};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Failure reported by a job handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Transient failure; the job is attempted again after a backoff.
    #[error("retryable: {0}")]
    Retryable(String),

    /// The job can never succeed; it goes straight to the dead-letter list.
    #[error("fatal: {0}")]
    Fatal(String),
}

/// Queue-level errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    /// The runner side of the queue has been dropped.
    #[error("job queue is closed")]
    Closed,
}

/// Consumer of jobs of type `J`.
#[async_trait]
pub trait JobHandler<J>: Send + Sync + 'static {
    /// Process one delivery of `job`.
    ///
    /// May be called more than once for the same job.
    async fn handle(&self, job: &J) -> Result<(), JobError>;

    /// Name used in log lines.
    fn name(&self) -> &'static str {
        "job"
    }
}

/// A job together with the number of attempts already made.
#[derive(Debug)]
pub(crate) struct Envelope<J> {
    pub(crate) job: J,
    pub(crate) attempts: u32,
}

/// Producer handle of the queue. Cheap to clone.
pub struct JobQueue<J> {
    tx: mpsc::UnboundedSender<Envelope<J>>,
}

impl<J> Clone for JobQueue<J> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

/// Consumer half of the queue, handed to a [`QueueRunner`].
pub struct JobReceiver<J> {
    rx: mpsc::UnboundedReceiver<Envelope<J>>,
}

impl<J: Send + 'static> JobQueue<J> {
    /// Create a queue and its receiving half.
    pub fn channel() -> (Self, JobReceiver<J>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, JobReceiver { rx })
    }

    /// Add a job. Never blocks.
    pub fn enqueue(&self, job: J) -> Result<(), QueueError> {
        self.send(Envelope { job, attempts: 0 })
    }

    pub(crate) fn send(&self, envelope: Envelope<J>) -> Result<(), QueueError> {
        self.tx.send(envelope).map_err(|_| QueueError::Closed)
    }
}

impl<J> JobReceiver<J> {
    pub(crate) async fn recv(&mut self) -> Option<Envelope<J>> {
        self.rx.recv().await
    }
}
