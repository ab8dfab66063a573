//! Background metric flush queue
//!
//! Producers enqueue [`MetricRecord`]s into a bounded channel; one consumer
//! task batches them into a [`TrackingStore`]. The bound applies
//! backpressure to producers that outrun the store.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{MetricRecord, TrackingStore};
use crate::{Error, Result};

/// Maximum number of metric points waiting in the channel.
pub const MAX_PENDING_METRICS: usize = 1024;

/// Buffered points are written once this many have accumulated.
const WRITE_BATCH_SIZE: usize = 100;

enum Command {
    Metric(MetricRecord),
    Flush(oneshot::Sender<Result<()>>),
}

/// Bounded asynchronous metric writer.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use trueno_eval::tracking::{MemoryTrackingStore, MetricQueue, MetricRecord, TrackingStore};
///
/// # #[tokio::main]
/// # async fn main() -> trueno_eval::Result<()> {
/// let store = Arc::new(MemoryTrackingStore::new()?);
/// let run_id = store.start_run()?;
/// let queue = MetricQueue::spawn(store.clone());
/// for step in 0..10 {
///     queue.enqueue(MetricRecord::new(&run_id, "loss", step, 1.0 / (step as f64 + 1.0))).await?;
/// }
/// queue.shutdown().await?;
/// assert_eq!(store.metric_history(&run_id, "loss")?.len(), 10);
/// # Ok(())
/// # }
/// ```
pub struct MetricQueue {
    sender: mpsc::Sender<Command>,
    worker: JoinHandle<Result<()>>,
}

impl MetricQueue {
    /// Start the consumer task on the current tokio runtime.
    #[must_use]
    pub fn spawn(store: Arc<dyn TrackingStore>) -> Self {
        let (sender, receiver) = mpsc::channel(MAX_PENDING_METRICS);
        let worker = tokio::spawn(consume(store, receiver));
        Self { sender, worker }
    }

    /// Enqueue one metric point, waiting while the channel is full.
    ///
    /// # Errors
    ///
    /// Returns `QueueClosed` if the consumer task has stopped.
    pub async fn enqueue(&self, record: MetricRecord) -> Result<()> {
        self.sender
            .send(Command::Metric(record))
            .await
            .map_err(|_| Error::QueueClosed)
    }

    /// Wait until every point enqueued so far has been written.
    ///
    /// # Errors
    ///
    /// Returns `QueueClosed` if the consumer task has stopped, or the first
    /// store error since the previous flush.
    pub async fn flush(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.sender
            .send(Command::Flush(reply))
            .await
            .map_err(|_| Error::QueueClosed)?;
        done.await.map_err(|_| Error::QueueClosed)?
    }

    /// Close the queue, write what is pending and stop the consumer.
    ///
    /// # Errors
    ///
    /// Returns the first unreported store error, or `Other` if the consumer
    /// task panicked.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.sender);
        self.worker
            .await
            .map_err(|e| Error::Other(format!("Metric queue consumer failed: {e}")))?
    }
}

async fn consume(store: Arc<dyn TrackingStore>, mut receiver: mpsc::Receiver<Command>) -> Result<()> {
    let mut pending: Vec<MetricRecord> = Vec::with_capacity(WRITE_BATCH_SIZE);
    let mut failure: Option<Error> = None;

    let write = |pending: &mut Vec<MetricRecord>, failure: &mut Option<Error>| {
        if pending.is_empty() {
            return;
        }
        let batch = std::mem::take(pending);
        debug!(count = batch.len(), "Writing metric batch");
        if let Err(e) = store.log_metrics(batch) {
            warn!(error = %e, "Metric batch write failed");
            failure.get_or_insert(e);
        }
    };

    while let Some(command) = receiver.recv().await {
        match command {
            Command::Metric(record) => {
                pending.push(record);
                if pending.len() >= WRITE_BATCH_SIZE {
                    write(&mut pending, &mut failure);
                }
            }
            Command::Flush(reply) => {
                write(&mut pending, &mut failure);
                let _ = reply.send(failure.take().map_or(Ok(()), Err));
            }
        }
    }
    write(&mut pending, &mut failure);
    failure.map_or(Ok(()), Err)
}
