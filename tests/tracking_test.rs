//! Tracking store and metric queue tests.

use std::fs;
use std::sync::Arc;

use image::{DynamicImage, RgbImage};
use trueno_eval::artifacts::local_path_from_uri;
use trueno_eval::tracking::{MemoryTrackingStore, MetricRecord, RunStatus, TrackingStore};
use trueno_eval::Error;

// ============================================================================
// Runs
// ============================================================================

#[test]
fn test_run_lifecycle() {
    let store = MemoryTrackingStore::new().unwrap();
    let run_id = store.start_run().unwrap();
    assert_eq!(store.active_run_id().as_deref(), Some(run_id.as_str()));
    assert!(matches!(store.start_run(), Err(Error::StorageError(_))));

    store.end_run(&run_id, RunStatus::Success).unwrap();
    let run = store.get_run(&run_id).unwrap();
    assert_eq!(run.info.status(), RunStatus::Success);
    assert!(run.info.ended_at().is_some());
    assert!(store.active_run_id().is_none());
}

#[test]
fn test_metric_history_and_latest_value() {
    let store = MemoryTrackingStore::new().unwrap();
    let run_id = store.start_run().unwrap();
    store
        .log_metrics(vec![
            MetricRecord::new(&run_id, "loss", 1, 0.5),
            MetricRecord::new(&run_id, "loss", 0, 0.9),
            MetricRecord::new(&run_id, "loss", 2, 0.25),
        ])
        .unwrap();

    let history = store.metric_history(&run_id, "loss").unwrap();
    let steps: Vec<u64> = history.iter().map(MetricRecord::step).collect();
    assert_eq!(steps, vec![0, 1, 2]);
    assert_eq!(store.get_run(&run_id).unwrap().metrics["loss"], 0.25);
}

// ============================================================================
// Artifacts
// ============================================================================

#[test]
fn test_log_text_and_image() {
    let store = MemoryTrackingStore::new().unwrap();
    let run_id = store.start_run().unwrap();

    let text_uri = store.log_text(&run_id, "hello", "notes/readme.txt").unwrap();
    assert!(text_uri.starts_with("file://"));
    let text_path = local_path_from_uri(&text_uri).unwrap();
    assert_eq!(fs::read_to_string(text_path).unwrap(), "hello");

    let image = DynamicImage::ImageRgb8(RgbImage::new(2, 2));
    let image_uri = store.log_image(&run_id, &image, "plot.png").unwrap();
    assert!(local_path_from_uri(&image_uri).unwrap().exists());

    let records = store.list_artifacts(&run_id).unwrap();
    let paths: Vec<&str> = records.iter().map(|r| r.path()).collect();
    assert_eq!(paths, vec!["notes/readme.txt", "plot.png"]);
    assert!(records[0].cas_hash().starts_with("sha256:"));
    assert_eq!(records[0].size_bytes(), 5);
}

#[test]
fn test_artifact_root_is_used() {
    let root = tempfile::tempdir().unwrap();
    let store = MemoryTrackingStore::with_artifact_root(root.path());
    let run_id = store.start_run().unwrap();
    let uri = store.log_text(&run_id, "x", "a.txt").unwrap();
    assert!(local_path_from_uri(&uri).unwrap().starts_with(root.path()));
}

#[test]
fn test_concurrent_metric_writers() {
    let store = Arc::new(MemoryTrackingStore::new().unwrap());
    let run_id = store.start_run().unwrap();

    let handles: Vec<_> = (0..4_u64)
        .map(|worker| {
            let store = Arc::clone(&store);
            let run_id = run_id.clone();
            std::thread::spawn(move || {
                for step in 0..25 {
                    store
                        .log_metric(MetricRecord::new(&run_id, format!("m{worker}"), step, 1.0))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for worker in 0..4 {
        let history = store.metric_history(&run_id, &format!("m{worker}")).unwrap();
        assert_eq!(history.len(), 25);
    }
}

// ============================================================================
// Metric queue
// ============================================================================

#[cfg(feature = "tokio")]
mod queue {
    use super::*;
    use trueno_eval::tracking::{MetricQueue, MAX_PENDING_METRICS};

    #[tokio::test]
    async fn test_queue_drains_more_than_channel_capacity() {
        let store = Arc::new(MemoryTrackingStore::new().unwrap());
        let run_id = store.start_run().unwrap();
        let queue = MetricQueue::spawn(store.clone());

        let total = MAX_PENDING_METRICS as u64 + 50;
        for step in 0..total {
            queue
                .enqueue(MetricRecord::new(&run_id, "throughput", step, 1.0))
                .await
                .unwrap();
        }
        queue.flush().await.unwrap();
        assert_eq!(
            store.metric_history(&run_id, "throughput").unwrap().len() as u64,
            total
        );
        queue.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_run_surfaces_on_shutdown() {
        let store = Arc::new(MemoryTrackingStore::new().unwrap());
        let queue = MetricQueue::spawn(store);
        queue
            .enqueue(MetricRecord::new("no-such-run", "loss", 0, 1.0))
            .await
            .unwrap();
        assert!(matches!(queue.shutdown().await, Err(Error::StorageError(_))));
    }
}
