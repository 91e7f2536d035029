//! Task run context — shared state and status helpers for a single run.

use crate::types::{Status, Task, TaskId};
use std::path::PathBuf;

use super::super::VideoDownloader;

/// Shared context for a single task run, reducing parameter passing between
/// the orchestrator and the MP4/HLS paths.
///
/// The context owns the task's cancellation handle for this run; pause and
/// cancel operations fire it from the scheduler side.
pub(crate) struct TaskContext {
    pub(crate) id: TaskId,
    /// Sequence of the concurrency slot this run holds; identifies the run
    /// so a superseded run cannot release its successor's slot
    pub(crate) run_seq: u64,
    pub(crate) cancel_token: tokio_util::sync::CancellationToken,
    pub(crate) downloader: VideoDownloader,
}

impl TaskContext {
    /// Current snapshot of the task, `None` once it has been cancelled.
    pub(crate) fn snapshot(&self) -> Option<Task> {
        self.downloader.get(&self.id)
    }

    /// Mutate the task and broadcast the new snapshot.
    pub(crate) fn update<F>(&self, mutate: F) -> Option<Task>
    where
        F: FnOnce(&mut Task),
    {
        self.downloader.update_task(&self.id, mutate)
    }

    /// Mark the task as failed with an error message, persist, and emit.
    pub(crate) async fn mark_failed(&self, error: &str) {
        let snapshot = self.update(|task| {
            task.status = Status::Failed;
            task.error = Some(error.to_string());
        });
        if let Some(task) = snapshot {
            self.downloader.persist(&task).await;
        }
    }

    /// Path of the final artifact.
    pub(crate) fn artifact_path(&self) -> PathBuf {
        self.downloader.artifact_path(&self.id)
    }

    /// Path of the intermediate segment directory.
    pub(crate) fn temp_dir(&self) -> PathBuf {
        self.downloader.temp_dir_path(&self.id)
    }

    /// Release this run's concurrency slot and let the scheduler refill it.
    pub(crate) async fn finish(&self) {
        self.downloader.release_slot(&self.id, self.run_seq);
        self.downloader.pump().await;
    }
}
