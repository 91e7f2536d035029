//! Task run orchestration — top-level lifecycle for a single task.

use crate::types::{Status, TaskKind};

use super::context::TaskContext;
use super::{hls, mp4};

/// Drive one task to a terminal state.
///
/// Phases:
/// 1. Snapshot the task (it may already have been cancelled)
/// 2. Dispatch to the MP4 or HLS path
/// 3. Map the outcome: success → Completed, cancellation → leave the status
///    the control operation set, anything else → Failed
/// 4. Release the concurrency slot and pump the scheduler
pub(crate) async fn run_download_task(ctx: TaskContext) {
    let Some(task) = ctx.snapshot() else {
        // Cancelled between dispatch and start
        ctx.finish().await;
        return;
    };

    tracing::info!(task_id = %ctx.id, kind = ?task.kind, url = %task.url, "Task run started");

    let result = match task.kind {
        TaskKind::Mp4 => mp4::run(&ctx).await,
        TaskKind::Hls => hls::run(&ctx).await,
    };

    match result {
        Ok(()) => {
            let snapshot = ctx.update(|task| {
                task.status = Status::Completed;
                task.progress = 1.0;
                task.error = None;
            });
            if let Some(task) = snapshot {
                ctx.downloader.persist(&task).await;
                tracing::info!(
                    task_id = %ctx.id,
                    save_path = ?task.save_path,
                    "Task completed"
                );
            }
        }
        Err(e) if e.is_cancellation() => {
            // pause()/cancel()/shutdown() already chose the final status; do
            // not transition to Failed. Persist the latest counters so a
            // resume picks up exactly where the run stopped.
            match ctx.snapshot() {
                Some(task) => ctx.downloader.persist(&task).await,
                // The task is gone from the table: it was cancelled, and any
                // files written after the control-side sweep must go too.
                None => ctx.downloader.delete_artifacts(&ctx.id).await,
            }
            tracing::debug!(task_id = %ctx.id, "Task run ended by cancellation");
        }
        Err(e) => {
            tracing::error!(task_id = %ctx.id, error = %e, "Task failed");
            ctx.mark_failed(&e.to_string()).await;
        }
    }

    ctx.finish().await;
}
