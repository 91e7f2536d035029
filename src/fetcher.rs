//! Single-resource HTTP fetcher
//!
//! Downloads one remote resource (a whole MP4 or one TS segment) to a local
//! path, streaming chunks straight to disk. Supports byte-range resumption,
//! prompt cancellation, and absolute progress reporting. Retry policy lives
//! in the task runner, not here — the fetcher only classifies failures.

use crate::error::{FetchError, FetchErrorKind};
use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::RANGE;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Result of a successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Total bytes now on disk for this resource (including any resumed
    /// prefix).
    pub downloaded: u64,

    /// Expected total size including the resumed prefix, when the server
    /// sent a Content-Length.
    pub total: Option<u64>,

    /// The byte offset the transfer actually continued from. Zero when the
    /// fetch started fresh, including when the server ignored a requested
    /// range and replied 200 with the full body.
    pub resumed_from: u64,
}

/// Fetch `url` to `dest`, streaming the body to disk.
///
/// With `range_from > 0` a `Range: bytes=N-` header is sent and the local
/// file is appended to. A server that ignores the range and answers 200
/// causes the local file to be truncated and the transfer restarted from
/// zero, so on-disk state always matches the reported accounting.
///
/// `on_progress` receives absolute `(downloaded, total)` pairs; `total` is
/// `None` until (and unless) the server provides a length.
///
/// On cancellation the partial file is closed and left on disk so a later
/// resume can continue from it.
pub async fn fetch_to_path<F>(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    range_from: u64,
    token: &CancellationToken,
    mut on_progress: F,
) -> Result<FetchOutcome, FetchError>
where
    F: FnMut(u64, Option<u64>),
{
    let mut request = client.get(url);
    if range_from > 0 {
        request = request.header(RANGE, format!("bytes={range_from}-"));
    }

    let had_partial = range_from > 0;

    let response = tokio::select! {
        _ = token.cancelled() => return Err(FetchError::cancelled(had_partial)),
        response = request.send() => {
            response.map_err(|e| FetchError::from_reqwest(&e, had_partial))?
        }
    };

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::http_status(status.as_u16(), had_partial));
    }

    // A 200 after a range request means the server sent the full body; the
    // local prefix must be discarded or it would be duplicated.
    let base = if range_from > 0 && status == StatusCode::PARTIAL_CONTENT {
        range_from
    } else {
        if range_from > 0 {
            tracing::debug!(
                url,
                range_from,
                "Server ignored range request, restarting from zero"
            );
        }
        0
    };

    let total = response.content_length().map(|len| len + base);

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(base == 0)
        .append(base > 0)
        .open(dest)
        .await
        .map_err(|e| FetchError::io(&e, had_partial))?;

    let mut downloaded = base;
    on_progress(downloaded, total);

    let mut stream = response.bytes_stream();
    loop {
        let chunk = tokio::select! {
            _ = token.cancelled() => {
                // Leave the partial file for a later resume
                let _ = file.flush().await;
                return Err(FetchError::cancelled(true));
            }
            chunk = stream.next() => chunk,
        };

        match chunk {
            None => break,
            Some(Ok(bytes)) => {
                file.write_all(&bytes)
                    .await
                    .map_err(|e| FetchError::io(&e, true))?;
                downloaded += bytes.len() as u64;
                on_progress(downloaded, total);
            }
            Some(Err(e)) => return Err(FetchError::from_reqwest(&e, true)),
        }
    }

    file.flush().await.map_err(|e| FetchError::io(&e, true))?;

    Ok(FetchOutcome {
        downloaded,
        total,
        resumed_from: base,
    })
}

/// Convenience check used by callers that only care about cancellation.
pub fn is_cancelled(error: &FetchError) -> bool {
    error.kind == FetchErrorKind::Cancelled
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> reqwest::Client {
        reqwest::Client::new()
    }

    #[tokio::test]
    async fn fetch_writes_full_body_and_reports_progress() {
        let server = MockServer::start().await;
        let body = vec![0xabu8; 64 * 1024];
        Mock::given(method("GET"))
            .and(path("/video.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.mp4");
        let token = CancellationToken::new();

        let mut last = (0u64, None);
        let outcome = fetch_to_path(
            &client(),
            &format!("{}/video.mp4", server.uri()),
            &dest,
            0,
            &token,
            |downloaded, total| last = (downloaded, total),
        )
        .await
        .unwrap();

        assert_eq!(outcome.downloaded, body.len() as u64);
        assert_eq!(outcome.total, Some(body.len() as u64));
        assert_eq!(outcome.resumed_from, 0);
        assert_eq!(last.0, body.len() as u64);
        assert_eq!(last.1, Some(body.len() as u64));
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[tokio::test]
    async fn fetch_resumes_with_range_request() {
        let server = MockServer::start().await;
        let full: Vec<u8> = (0..255u8).cycle().take(10_000).collect();
        let split = 4_000usize;

        Mock::given(method("GET"))
            .and(path("/video.mp4"))
            .and(header("Range", format!("bytes={split}-")))
            .respond_with(
                ResponseTemplate::new(206).set_body_bytes(full[split..].to_vec()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.mp4");
        std::fs::write(&dest, &full[..split]).unwrap();

        let token = CancellationToken::new();
        let outcome = fetch_to_path(
            &client(),
            &format!("{}/video.mp4", server.uri()),
            &dest,
            split as u64,
            &token,
            |_, _| {},
        )
        .await
        .unwrap();

        assert_eq!(outcome.resumed_from, split as u64);
        assert_eq!(outcome.downloaded, full.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), full);
    }

    #[tokio::test]
    async fn fetch_restarts_when_server_ignores_range() {
        let server = MockServer::start().await;
        let full = vec![7u8; 5_000];

        // 200 with the whole body, despite the range request
        Mock::given(method("GET"))
            .and(path("/video.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(full.clone()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.mp4");
        std::fs::write(&dest, vec![9u8; 2_000]).unwrap(); // stale prefix

        let token = CancellationToken::new();
        let outcome = fetch_to_path(
            &client(),
            &format!("{}/video.mp4", server.uri()),
            &dest,
            2_000,
            &token,
            |_, _| {},
        )
        .await
        .unwrap();

        assert_eq!(outcome.resumed_from, 0, "stale prefix must be discarded");
        assert_eq!(outcome.downloaded, full.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), full);
    }

    #[tokio::test]
    async fn fetch_surfaces_http_status_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.ts"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("seg.ts");
        let token = CancellationToken::new();

        let err = fetch_to_path(
            &client(),
            &format!("{}/missing.ts", server.uri()),
            &dest,
            0,
            &token,
            |_, _| {},
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind, FetchErrorKind::HttpStatus(404));
        assert!(!dest.exists(), "no file should be created on a status error");
    }

    #[tokio::test]
    async fn cancellation_aborts_promptly_and_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow.mp4"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![1u8; 1024])
                    .set_delay(std::time::Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.mp4");
        let token = CancellationToken::new();

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let started = std::time::Instant::now();
        let err = fetch_to_path(
            &client(),
            &format!("{}/slow.mp4", server.uri()),
            &dest,
            0,
            &token,
            |_, _| {},
        )
        .await
        .unwrap_err();

        assert!(is_cancelled(&err));
        assert!(
            started.elapsed() < std::time::Duration::from_secs(5),
            "cancellation must not wait out the server delay"
        );
    }
}
