//! Startup restore and graceful shutdown coordination.

use crate::error::Result;
use crate::types::{Status, Task};
use std::collections::VecDeque;

use super::VideoDownloader;

impl VideoDownloader {
    /// Rebuild the in-memory task table from the catalog.
    ///
    /// Rows arrive in no particular order and are sorted by id (insertion
    /// order). A task persisted as Downloading was interrupted by a crash or
    /// shutdown; it is coerced to Paused and never auto-resumed. Pending
    /// rows return to the backlog in insertion order.
    pub(crate) async fn restore_catalog(&self) -> Result<()> {
        let mut restored = self.db.load_all().await?;
        restored.sort_by_key(|task| task.id.sort_key());

        let mut backlog = VecDeque::new();
        let mut max_id = 0i64;
        let mut interrupted = 0usize;

        for mut task in restored {
            max_id = max_id.max(task.id.sort_key());

            if task.status == Status::Downloading {
                task.status = Status::Paused;
                self.persist(&task).await;
                interrupted += 1;
            }

            if task.status == Status::Pending {
                backlog.push_back(task.id.clone());
            }

            {
                let mut tasks = self.tasks.lock();
                tasks.insert(task.id.clone(), task);
            }
        }

        self.next_task_id
            .store(max_id.max(0), std::sync::atomic::Ordering::SeqCst);

        let restored_count = {
            let mut queue = self.queue_state.inner.lock();
            queue.backlog = backlog;
            queue.backlog.len()
        };

        if interrupted > 0 {
            tracing::info!(
                interrupted,
                "Coerced interrupted task(s) from Downloading to Paused"
            );
        }
        tracing::info!(
            total = self.tasks.lock().len(),
            pending = restored_count,
            "Task catalog restored"
        );

        Ok(())
    }

    /// Gracefully shut down the engine
    ///
    /// Shutdown sequence:
    /// 1. Stop accepting new tasks ([`add`](Self::add) returns
    ///    [`ShuttingDown`](crate::Error::ShuttingDown))
    /// 2. Fire the cancellation handle of every active task
    /// 3. Wait for the active set to drain, bounded by a 30 second timeout
    /// 4. Coerce any task still marked Downloading to Paused and persist it,
    ///    so the next start resumes cleanly
    ///
    /// The method completes as much of the sequence as possible even when
    /// individual steps fail.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.queue_state
            .accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);

        // Signal every active runner
        let tokens: Vec<_> = {
            let queue = self.queue_state.inner.lock();
            queue.active.values().map(|run| run.token.clone()).collect()
        };
        tracing::debug!(active_count = tokens.len(), "Signaling active tasks");
        for token in &tokens {
            token.cancel();
        }

        let shutdown_timeout = std::time::Duration::from_secs(30);
        if tokio::time::timeout(shutdown_timeout, self.wait_for_active_drain())
            .await
            .is_err()
        {
            tracing::warn!("Timeout waiting for active tasks to stop, proceeding with shutdown");
        }

        // Anything still Downloading was interrupted mid-flight
        let interrupted: Vec<Task> = {
            let mut tasks = self.tasks.lock();
            tasks
                .values_mut()
                .filter(|task| task.status == Status::Downloading)
                .map(|task| {
                    task.status = Status::Paused;
                    task.clone()
                })
                .collect()
        };
        for task in &interrupted {
            self.emit_task(task);
            self.persist(task).await;
        }
        if !interrupted.is_empty() {
            tracing::info!(
                count = interrupted.len(),
                "Marked interrupted task(s) as Paused for resume on restart"
            );
        }

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Wait for the active set to become empty.
    async fn wait_for_active_drain(&self) {
        loop {
            if self.active_count() == 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}
