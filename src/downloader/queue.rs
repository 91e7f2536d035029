//! Backlog management and the pump scheduling primitive.

use crate::types::{Status, TaskId};
use tokio_util::sync::CancellationToken;

use super::VideoDownloader;
use super::download_task::{TaskContext, run_download_task};

impl VideoDownloader {
    /// Drain the backlog into free concurrency slots.
    ///
    /// While a slot is free and the backlog is non-empty, pop the head; if
    /// its status is still Pending, transition it to Downloading and spawn a
    /// runner. Called after every state change that could free a slot or
    /// enqueue work, and safe to call concurrently: a slot is reserved under
    /// the queue lock before the task is inspected, so the bound holds even
    /// when several pumps race.
    pub(crate) fn pump(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
        loop {
            let Some((id, run_seq, cancel_token)) = self.claim_slot() else {
                return;
            };

            // Only Pending tasks dispatch. Anything else went stale in the
            // backlog (paused or cancelled since being enqueued) and just
            // gives its slot back.
            let dispatched = {
                let mut tasks = self.tasks.lock();
                match tasks.get_mut(&id) {
                    Some(task) if task.status == Status::Pending => {
                        task.status = Status::Downloading;
                        Some(task.clone())
                    }
                    _ => None,
                }
            };

            match dispatched {
                Some(snapshot) => {
                    self.emit_task(&snapshot);
                    self.persist(&snapshot).await;
                    tracing::debug!(task_id = %id, "Dispatching task to runner");
                    let ctx = TaskContext {
                        id: id.clone(),
                        run_seq,
                        cancel_token,
                        downloader: self.clone(),
                    };
                    tokio::spawn(run_download_task(ctx));
                }
                None => {
                    self.release_slot(&id, run_seq);
                }
            }
        }
        })
    }

    /// Reserve one concurrency slot for the backlog head, atomically.
    fn claim_slot(&self) -> Option<(TaskId, u64, CancellationToken)> {
        // No new dispatches once shutdown has begun
        if !self
            .queue_state
            .accepting_new
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return None;
        }
        let mut queue = self.queue_state.inner.lock();
        if queue.active.len() >= self.config.download.max_concurrent_downloads {
            return None;
        }
        let id = queue.backlog.pop_front()?;
        let token = CancellationToken::new();
        let seq = queue.next_run_seq;
        queue.next_run_seq += 1;
        queue.active.insert(
            id.clone(),
            super::ActiveRun {
                seq,
                token: token.clone(),
            },
        );
        Some((id, seq, token))
    }

    /// Release a concurrency slot, but only if it is still held by the run
    /// that is releasing it. A paused run winding down after its task was
    /// already re-dispatched must not evict the replacement.
    pub(crate) fn release_slot(&self, id: &TaskId, run_seq: u64) {
        let mut queue = self.queue_state.inner.lock();
        if queue.active.get(id).is_some_and(|run| run.seq == run_seq) {
            queue.active.remove(id);
        }
    }

    /// Append a task id at the backlog tail.
    pub(crate) fn enqueue(&self, id: &TaskId) {
        let mut queue = self.queue_state.inner.lock();
        queue.backlog.push_back(id.clone());
    }

    /// Drop a task id from the backlog, if present.
    pub(crate) fn remove_from_backlog(&self, id: &TaskId) {
        let mut queue = self.queue_state.inner.lock();
        queue.backlog.retain(|queued| queued != id);
    }

    /// Remove a task from the active set, handing back its cancellation
    /// token so the caller can fire it.
    pub(crate) fn take_active_token(&self, id: &TaskId) -> Option<CancellationToken> {
        let mut queue = self.queue_state.inner.lock();
        queue.active.remove(id).map(|run| run.token)
    }

    /// Number of tasks currently holding a concurrency slot.
    pub(crate) fn active_count(&self) -> usize {
        self.queue_state.inner.lock().active.len()
    }

    /// Number of tasks waiting in the backlog.
    pub(crate) fn backlog_len(&self) -> usize {
        self.queue_state.inner.lock().backlog.len()
    }
}
