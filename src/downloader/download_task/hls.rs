//! HLS download path — manifest resolution, sequential segment loop with
//! retry, optional AES decryption, and final merge.

use crate::error::{DownloadError, Error, FetchErrorKind, Result};
use crate::fetcher;
use crate::hls::decrypt;
use crate::hls::resolver::{ResolvedManifest, resolve_manifest};
use crate::progress::ProgressGate;
use crate::retry::IsRetryable;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use super::context::TaskContext;

/// Download an HLS stream into a single local artifact.
///
/// Segments are fetched strictly in play order; parallelism lives across
/// tasks, not within one. Already-present non-empty segment files are
/// treated as done, which is what makes resume work.
pub(super) async fn run(ctx: &TaskContext) -> Result<()> {
    let temp_dir = ctx.temp_dir();
    tokio::fs::create_dir_all(&temp_dir).await?;

    let segments = resolve_segments(ctx).await?;
    let segment_count = segments.len();

    let save_path = ctx.artifact_path();
    let snapshot = ctx.update(|task| {
        task.total_units = segment_count as u64;
        task.save_path = Some(save_path.clone());
    });
    let (key, iv) = match snapshot {
        Some(task) => {
            ctx.downloader.persist(&task).await;
            (task.key, task.iv)
        }
        None => return Err(Error::Cancelled),
    };

    let mut gate = ProgressGate::new(ctx.downloader.config.download.progress_emit_delta);

    for (index, segment_url) in segments.iter().enumerate() {
        if ctx.cancel_token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let segment_path = temp_dir.join(format!("segment_{index}.ts"));
        let already_done = matches!(
            tokio::fs::metadata(&segment_path).await,
            Ok(meta) if meta.len() > 0
        );

        if !already_done {
            fetch_segment(ctx, &mut gate, index, segment_count, segment_url, &segment_path)
                .await?;

            if let Some(key) = &key {
                decrypt::decrypt_segment_file(
                    &segment_path,
                    key,
                    iv.as_deref(),
                    index as u64,
                )
                .await
                .map_err(|e| DownloadError::DecryptionFailed {
                    index,
                    reason: e.to_string(),
                })?;
            }
        }

        let progress = (index + 1) as f64 / segment_count as f64;
        gate.mark(progress);
        let snapshot = ctx.update(|task| {
            task.downloaded_units = (index + 1) as u64;
            task.progress = progress;
        });
        if let Some(task) = snapshot {
            ctx.downloader.persist(&task).await;
        }
    }

    merge_segments(&temp_dir, segment_count, &save_path).await?;

    if let Err(e) = tokio::fs::remove_dir_all(&temp_dir).await {
        tracing::warn!(
            task_id = %ctx.id,
            path = ?temp_dir,
            error = %e,
            "Failed to delete segment temp directory after merge"
        );
    }

    Ok(())
}

/// Resolve the task URL down to a media playlist's segment list.
///
/// A master playlist replaces the task URL in place with its best variant
/// (highest BANDWIDTH) and resolution recurses. At most the configured
/// number of manifests is fetched; a redirect chain still pointing at a
/// master playlist after that fails with `TooManyRedirects`.
async fn resolve_segments(ctx: &TaskContext) -> Result<Vec<String>> {
    let limit = ctx.downloader.config.download.max_manifest_redirects;
    let mut url = ctx.snapshot().ok_or(Error::Cancelled)?.url;

    for _ in 0..limit {
        match resolve_manifest(&ctx.downloader.client, &url, &ctx.cancel_token).await? {
            ResolvedManifest::Segments(segments) => return Ok(segments),
            ResolvedManifest::Variant(variant) => {
                tracing::info!(
                    task_id = %ctx.id,
                    from = %url,
                    to = %variant,
                    "Master playlist replaced by chosen variant"
                );
                url = variant.clone();
                let snapshot = ctx.update(|task| task.url = variant);
                match snapshot {
                    Some(task) => ctx.downloader.persist(&task).await,
                    None => return Err(Error::Cancelled),
                }
            }
        }
    }

    Err(crate::error::ResolveError::TooManyRedirects { limit }.into())
}

/// Fetch one segment, retrying transient failures with a fixed backoff.
///
/// A 404 is never retried: a missing segment will not appear on a later
/// attempt. Intra-segment progress is reported as `(index + fraction) / n`,
/// rate-limited by the shared gate.
async fn fetch_segment(
    ctx: &TaskContext,
    gate: &mut ProgressGate,
    index: usize,
    segment_count: usize,
    url: &str,
    segment_path: &Path,
) -> Result<()> {
    let retry_limit = ctx.downloader.config.download.segment_retry_limit.max(1);
    let retry_delay = ctx.downloader.config.download.segment_retry_delay;

    let mut attempt = 1u32;
    loop {
        let result = fetcher::fetch_to_path(
            &ctx.downloader.client,
            url,
            segment_path,
            0,
            &ctx.cancel_token,
            |downloaded, total| {
                if let Some(total) = total.filter(|t| *t > 0) {
                    let fraction = (downloaded as f64 / total as f64).min(1.0);
                    let progress = (index as f64 + fraction) / segment_count as f64;
                    if gate.should_emit(progress) {
                        ctx.update(|task| task.progress = progress);
                    }
                }
            },
        )
        .await;

        match result {
            Ok(_) => return Ok(()),
            Err(e) if e.kind == FetchErrorKind::Cancelled => return Err(e.into()),
            Err(e) if e.is_retryable() && attempt < retry_limit => {
                tracing::warn!(
                    task_id = %ctx.id,
                    segment = index,
                    attempt,
                    error = %e,
                    "Segment fetch failed, retrying"
                );
                attempt += 1;
                tokio::select! {
                    _ = ctx.cancel_token.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(retry_delay) => {}
                }
            }
            Err(e) => {
                return Err(DownloadError::SegmentFailed {
                    index,
                    attempts: attempt,
                    last_error: e.to_string(),
                }
                .into());
            }
        }
    }
}

/// Concatenate segment files in index order into the final artifact.
///
/// TS segments are self-synchronizing, so a raw byte append is all the
/// "muxing" this needs.
async fn merge_segments(temp_dir: &Path, segment_count: usize, dest: &Path) -> Result<()> {
    let mut out = tokio::fs::File::create(dest).await?;
    for index in 0..segment_count {
        let segment_path = temp_dir.join(format!("segment_{index}.ts"));
        let mut segment = tokio::fs::File::open(&segment_path).await?;
        tokio::io::copy(&mut segment, &mut out).await?;
    }
    out.flush().await?;
    Ok(())
}
