//! HLS manifest resolver
//!
//! Fetches manifest text and reduces it to either a replacement URL (master
//! playlist case) or an ordered list of absolute segment URLs (media
//! playlist case). The resolver is stateless and has no side effects other
//! than the HTTP request; following a master → media redirect is the
//! runner's job.

use crate::error::{FetchError, ResolveError};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Token that marks a manifest as a master playlist.
const MASTER_PLAYLIST_TOKEN: &str = "#EXT-X-STREAM-INF";

/// Outcome of resolving one manifest URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedManifest {
    /// The manifest was a master playlist; this is the absolute URL of the
    /// variant with the highest advertised BANDWIDTH (first occurrence wins
    /// ties). The caller should replace the task URL and resolve again.
    Variant(String),

    /// The manifest was a media playlist; these are its segment URLs in
    /// play order.
    Segments(Vec<String>),
}

/// Fetch and parse the manifest at `url`.
///
/// Cancellation propagates promptly: a fired token aborts the in-flight
/// request and surfaces as a cancelled fetch error.
pub async fn resolve_manifest(
    client: &reqwest::Client,
    url: &str,
    token: &CancellationToken,
) -> Result<ResolvedManifest, ResolveError> {
    let base = Url::parse(url).map_err(|e| ResolveError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let response = tokio::select! {
        _ = token.cancelled() => return Err(FetchError::cancelled(false).into()),
        response = client.get(url).send() => {
            response.map_err(|e| FetchError::from_reqwest(&e, false))?
        }
    };

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::http_status(status.as_u16(), false).into());
    }

    let body = tokio::select! {
        _ = token.cancelled() => return Err(FetchError::cancelled(false).into()),
        body = response.text() => body.map_err(|e| FetchError::from_reqwest(&e, false))?,
    };

    parse_manifest(&body, &base)
}

/// Parse manifest text against its base URL.
pub(crate) fn parse_manifest(body: &str, base: &Url) -> Result<ResolvedManifest, ResolveError> {
    if body.contains(MASTER_PLAYLIST_TOKEN) {
        parse_master(body, base)
    } else {
        parse_media(body, base)
    }
}

/// Master playlist: pick the variant with the highest BANDWIDTH.
fn parse_master(body: &str, base: &Url) -> Result<ResolvedManifest, ResolveError> {
    let lines: Vec<&str> = body.lines().map(str::trim).collect();

    let mut best: Option<(u64, String)> = None;

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        i += 1;

        if !line.starts_with(MASTER_PLAYLIST_TOKEN) {
            continue;
        }

        let bandwidth = parse_bandwidth(line);

        // The variant URI is the next non-comment, non-empty line; a
        // following stream-inf tag means this variant has no URI at all.
        let mut uri = None;
        let mut j = i;
        while j < lines.len() {
            let candidate = lines[j];
            if candidate.starts_with(MASTER_PLAYLIST_TOKEN) {
                break;
            }
            if !candidate.is_empty() && !candidate.starts_with('#') {
                uri = Some(candidate);
                break;
            }
            j += 1;
        }

        if let Some(uri) = uri {
            let resolved = resolve_uri(base, uri)?;
            // Strictly-greater keeps the first occurrence on ties
            if best.as_ref().is_none_or(|(bw, _)| bandwidth > *bw) {
                best = Some((bandwidth, resolved));
            }
        }
    }

    match best {
        Some((_, url)) => Ok(ResolvedManifest::Variant(url)),
        None => Err(ResolveError::EmptyManifest),
    }
}

/// Media playlist: every non-empty line not starting with `#` is a segment
/// URI, in play order.
fn parse_media(body: &str, base: &Url) -> Result<ResolvedManifest, ResolveError> {
    let mut segments = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        segments.push(resolve_uri(base, line)?);
    }

    if segments.is_empty() {
        return Err(ResolveError::EmptyManifest);
    }
    Ok(ResolvedManifest::Segments(segments))
}

/// Parse `BANDWIDTH=<integer>` from a stream-inf attribute list.
///
/// The attribute key must match exactly; AVERAGE-BANDWIDTH is a different
/// attribute. A missing or malformed value counts as 0.
fn parse_bandwidth(line: &str) -> u64 {
    let Some(attributes) = line.split_once(':').map(|(_, rest)| rest) else {
        return 0;
    };
    for attribute in attributes.split(',') {
        if let Some((key, value)) = attribute.split_once('=')
            && key.trim() == "BANDWIDTH"
        {
            return value.trim().parse().unwrap_or(0);
        }
    }
    0
}

/// Resolve a possibly-relative URI against the manifest URL.
fn resolve_uri(base: &Url, uri: &str) -> Result<String, ResolveError> {
    base.join(uri)
        .map(|u| u.to_string())
        .map_err(|e| ResolveError::InvalidUrl {
            url: uri.to_string(),
            reason: e.to_string(),
        })
}
