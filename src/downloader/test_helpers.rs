//! Shared test helpers for creating VideoDownloader instances in tests.

use crate::config::Config;
use crate::downloader::VideoDownloader;
use crate::types::{Status, Task, TaskId};
use std::time::Duration;
use tempfile::tempdir;

/// Build a config rooted in a fresh temp directory, with fast retries so
/// tests don't sit out real backoff delays.
pub(crate) fn test_config(max_concurrent: usize) -> (Config, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();

    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("test.db");
    config.download.download_dir = temp_dir.path().join("downloads");
    config.download.max_concurrent_downloads = max_concurrent;
    config.download.segment_retry_delay = Duration::from_millis(10);

    (config, temp_dir)
}

/// Create a test engine with the default concurrency bound of 3.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader() -> (VideoDownloader, tempfile::TempDir) {
    let (config, temp_dir) = test_config(3);
    let downloader = VideoDownloader::new(config).await.unwrap();
    (downloader, temp_dir)
}

/// Create a test engine that never dispatches anything: the concurrency
/// bound is zero, so tasks stay exactly in the state control ops put them
/// in. Used for deterministic state-machine tests.
pub(crate) async fn create_idle_downloader() -> (VideoDownloader, tempfile::TempDir) {
    let (config, temp_dir) = test_config(0);
    let downloader = VideoDownloader::new(config).await.unwrap();
    (downloader, temp_dir)
}

/// Directly seed a task into the engine's table and catalog, bypassing
/// `add()`. Lets tests stage arbitrary states (Paused at 50%, restored
/// rows, ...) without racing a live runner.
pub(crate) async fn seed_task(downloader: &VideoDownloader, task: Task) {
    {
        let mut tasks = downloader.tasks.lock();
        tasks.insert(task.id.clone(), task.clone());
    }
    downloader.db.upsert(&task).await.unwrap();
}

/// Wait until the task reaches the wanted status or the timeout elapses.
/// Panics with the task's last seen state on timeout.
pub(crate) async fn wait_for_status(
    downloader: &VideoDownloader,
    id: &TaskId,
    wanted: Status,
    timeout: Duration,
) -> Task {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let task = downloader.get(id);
        if let Some(task) = &task
            && task.status == wanted
        {
            return task.clone();
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {wanted:?}; last state: {task:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
