//! Progressive MP4 download path with byte-range resume.

use crate::error::Result;
use crate::fetcher;
use crate::progress::ProgressGate;

use super::context::TaskContext;

/// Download a single-file progressive resource.
///
/// An existing partial file sets the resume offset; the fetcher continues
/// from it with a range request (or restarts cleanly if the server ignores
/// ranges). Progress events are rate-limited by the configured delta.
pub(super) async fn run(ctx: &TaskContext) -> Result<()> {
    let save_path = ctx.artifact_path();
    if let Some(parent) = save_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let range_from = match tokio::fs::metadata(&save_path).await {
        Ok(meta) => meta.len(),
        Err(_) => 0,
    };

    // save_path is recorded before the first byte is written
    let snapshot = ctx.update(|task| {
        task.save_path = Some(save_path.clone());
        task.downloaded_units = range_from;
    });
    let url = match snapshot {
        Some(task) => {
            ctx.downloader.persist(&task).await;
            task.url
        }
        None => return Err(crate::error::Error::Cancelled),
    };

    if range_from > 0 {
        tracing::info!(task_id = %ctx.id, range_from, "Resuming partial download");
    }

    let mut gate = ProgressGate::new(ctx.downloader.config.download.progress_emit_delta);
    let outcome = fetcher::fetch_to_path(
        &ctx.downloader.client,
        &url,
        &save_path,
        range_from,
        &ctx.cancel_token,
        |downloaded, total| {
            let progress = total
                .filter(|t| *t > 0)
                .map(|t| (downloaded as f64 / t as f64).min(1.0))
                .unwrap_or(0.0);
            if gate.should_emit(progress) {
                ctx.update(|task| {
                    task.downloaded_units = downloaded;
                    if let Some(total) = total {
                        task.total_units = total;
                    }
                    task.progress = progress;
                });
            }
        },
    )
    .await?;

    // Final accounting; the orchestrator flips status and progress
    ctx.update(|task| {
        task.downloaded_units = outcome.downloaded;
        task.total_units = outcome.total.unwrap_or(outcome.downloaded);
    });

    Ok(())
}
