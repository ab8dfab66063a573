//! Stream metrics through the bounded metric queue
//!
//! Several producer tasks log a training curve concurrently; the queue
//! batches the writes into the tracking store.
//!
//! Run with: RUST_LOG=trueno_eval=debug cargo run --example metric_queue

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;
use trueno_eval::tracking::{MemoryTrackingStore, MetricQueue, MetricRecord, RunStatus, TrackingStore};

const STEPS: u64 = 2_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== trueno-eval: Metric Queue ===\n");

    let store = Arc::new(MemoryTrackingStore::new()?);
    let run_id = store.start_run()?;
    let queue = Arc::new(MetricQueue::spawn(store.clone()));

    let mut producers = Vec::new();
    for (key, decay) in [("train_loss", 0.002), ("val_loss", 0.0015)] {
        let queue = Arc::clone(&queue);
        let run_id = run_id.clone();
        producers.push(tokio::spawn(async move {
            for step in 0..STEPS {
                #[allow(clippy::cast_precision_loss)]
                let value = (-decay * step as f64).exp();
                queue.enqueue(MetricRecord::new(&run_id, key, step, value)).await?;
            }
            Ok::<_, trueno_eval::Error>(())
        }));
    }
    for producer in producers {
        producer.await??;
    }

    queue.flush().await?;
    info!(run_id = %run_id, "Producers finished");

    for key in ["train_loss", "val_loss"] {
        let history = store.metric_history(&run_id, key)?;
        let last = history.last().map_or(f64::NAN, MetricRecord::value);
        println!("  {key:<12} {} points, final {last:.4}", history.len());
    }

    let queue = Arc::try_unwrap(queue).map_err(|_| anyhow::anyhow!("queue still shared"))?;
    queue.shutdown().await?;
    store.end_run(&run_id, RunStatus::Success)?;
    Ok(())
}
