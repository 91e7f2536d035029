//! Task lifecycle control — add, pause, resume, cancel, queries.

use crate::error::{DownloadError, Error, Result};
use crate::types::{Status, Task, TaskId, TaskOptions};

use super::VideoDownloader;

impl VideoDownloader {
    /// Add a new download task
    ///
    /// Classifies the URL (a lowercased `.m3u8` anywhere in it means HLS,
    /// anything else is progressive MP4), mints an id, persists the task,
    /// appends it to the backlog, and nudges the scheduler. The task starts
    /// as soon as a concurrency slot is free.
    ///
    /// # Arguments
    ///
    /// * `url` - Source URL of the media
    /// * `title` - User-visible title
    /// * `options` - Optional AES key material for encrypted HLS streams
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] when the engine is shutting down.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use video_dl::*;
    /// # async fn example(downloader: VideoDownloader) -> Result<()> {
    /// let id = downloader
    ///     .add("http://example.com/movie.mp4", "Movie", TaskOptions::default())
    ///     .await?;
    /// println!("queued as {id}");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn add(&self, url: &str, title: &str, options: TaskOptions) -> Result<TaskId> {
        if !self
            .queue_state
            .accepting_new
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(Error::ShuttingDown);
        }

        let id = self.mint_task_id();
        let task = Task::new(id.clone(), url, title, options.key, options.iv);

        {
            let mut tasks = self.tasks.lock();
            tasks.insert(id.clone(), task.clone());
        }

        self.persist(&task).await;
        self.enqueue(&id);
        self.emit_task(&task);

        tracing::info!(task_id = %id, url, title, kind = ?task.kind, "Task added");

        self.pump().await;

        Ok(id)
    }

    /// Pause a task
    ///
    /// A downloading task has its cancellation handle fired; the in-flight
    /// fetch returns promptly and partial files stay on disk so a later
    /// resume can continue. A task still waiting in the backlog is simply
    /// taken out of it.
    ///
    /// Pausing an already-paused task is a no-op. Pausing a completed,
    /// failed, or cancelled task is an invalid state transition.
    pub async fn pause(&self, id: &TaskId) -> Result<()> {
        let current = self
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        match current.status {
            Status::Paused => return Ok(()),
            Status::Completed | Status::Failed | Status::Cancelled => {
                return Err(Error::Download(DownloadError::InvalidState {
                    id: id.to_string(),
                    operation: "pause".to_string(),
                    current_state: format!("{:?}", current.status),
                }));
            }
            Status::Pending | Status::Downloading => {}
        }

        // Set the final status first: a runner observing the cancelled fetch
        // must already see Paused and exit without touching it.
        let snapshot = self.update_task(id, |task| task.status = Status::Paused);

        self.remove_from_backlog(id);
        if let Some(token) = self.take_active_token(id) {
            token.cancel();
        }

        if let Some(task) = snapshot {
            self.persist(&task).await;
        }

        tracing::info!(task_id = %id, "Task paused");

        // A slot may have been freed
        self.pump().await;

        Ok(())
    }

    /// Resume a paused or failed task
    ///
    /// The task returns to Pending at the backlog tail; completed work is
    /// retained (byte offset for MP4, finished segments for HLS) and the
    /// runner continues from it. Resuming a task that is already pending or
    /// downloading is a no-op.
    pub async fn resume(&self, id: &TaskId) -> Result<()> {
        let current = self
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        match current.status {
            Status::Paused | Status::Failed => {}
            Status::Pending | Status::Downloading => return Ok(()),
            Status::Completed | Status::Cancelled => {
                return Err(Error::Download(DownloadError::InvalidState {
                    id: id.to_string(),
                    operation: "resume".to_string(),
                    current_state: format!("{:?}", current.status),
                }));
            }
        }

        let snapshot = self.update_task(id, |task| {
            task.status = Status::Pending;
            task.error = None;
        });

        if let Some(task) = snapshot {
            self.persist(&task).await;
        }

        self.enqueue(id);

        tracing::info!(task_id = %id, "Task resumed");

        self.pump().await;

        Ok(())
    }

    /// Cancel a task and delete its files
    ///
    /// Valid from any non-terminal state. Stops the task if it is running,
    /// removes it from the catalog and the task table, and deletes the
    /// final artifact and any intermediate segment directory. A final
    /// snapshot with status Cancelled is broadcast; afterwards
    /// [`get`](Self::get) returns `None`.
    pub async fn cancel(&self, id: &TaskId) -> Result<()> {
        let current = self
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if current.status.is_terminal() {
            return Err(Error::Download(DownloadError::InvalidState {
                id: id.to_string(),
                operation: "cancel".to_string(),
                current_state: format!("{:?}", current.status),
            }));
        }

        self.remove_from_backlog(id);
        if let Some(token) = self.take_active_token(id) {
            token.cancel();
        }

        // Remove from the table before deleting files: a cancelled task is
        // gone from every listing immediately.
        let removed = {
            let mut tasks = self.tasks.lock();
            tasks.remove(id)
        };
        if let Some(mut task) = removed {
            task.status = Status::Cancelled;
            self.emit_task(&task);
        }

        if let Err(e) = self.db.delete(id).await {
            tracing::error!(task_id = %id, error = %e, "Failed to delete task row");
        }

        self.delete_artifacts(id).await;

        tracing::info!(task_id = %id, "Task cancelled");

        self.pump().await;

        Ok(())
    }

    /// Get a snapshot of one task
    ///
    /// Returns `None` for unknown or cancelled ids.
    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.tasks.lock().get(id).cloned()
    }

    /// List snapshots of all tasks, newest first
    pub fn list(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.lock().values().cloned().collect();
        tasks.sort_by(|a, b| {
            b.id.sort_key()
                .cmp(&a.id.sort_key())
                .then_with(|| b.id.as_str().cmp(a.id.as_str()))
        });
        tasks
    }

    /// Pause all pending and downloading tasks
    ///
    /// Tasks in other states are left alone; per-task failures are logged
    /// and do not stop the sweep.
    pub async fn pause_all(&self) -> Result<()> {
        let mut paused_count = 0;

        for task in self.list() {
            match task.status {
                Status::Pending | Status::Downloading => {
                    if let Err(e) = self.pause(&task.id).await {
                        tracing::warn!(
                            task_id = %task.id,
                            error = %e,
                            "Failed to pause task during pause_all"
                        );
                    } else {
                        paused_count += 1;
                    }
                }
                Status::Paused | Status::Completed | Status::Failed | Status::Cancelled => {}
            }
        }

        tracing::info!(paused_count, "Paused all active tasks");
        Ok(())
    }

    /// Resume all paused tasks
    ///
    /// Failed tasks are not swept up; resume them individually.
    pub async fn resume_all(&self) -> Result<()> {
        let mut resumed_count = 0;

        for task in self.list() {
            if task.status == Status::Paused {
                if let Err(e) = self.resume(&task.id).await {
                    tracing::warn!(
                        task_id = %task.id,
                        error = %e,
                        "Failed to resume task during resume_all"
                    );
                } else {
                    resumed_count += 1;
                }
            }
        }

        tracing::info!(resumed_count, "Resumed all paused tasks");
        Ok(())
    }
}
