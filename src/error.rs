//! Error types for video-dl
//!
//! This module provides the error handling surface for the library:
//! - A top-level [`Error`] enum with a [`Result`] alias
//! - Domain-specific error types (database, fetch, manifest resolution,
//!   download orchestration, decryption)
//! - Structured fetch failure classification so the runner can decide
//!   between retrying a segment and failing the task

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for video-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for video-dl
///
/// This is the primary error type used throughout the library. Each variant
/// includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Download orchestration error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// HLS manifest resolution error
    #[error("manifest error: {0}")]
    Resolve(#[from] ResolveError),

    /// HTTP fetch error
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to construct the shared HTTP client
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Task not found
    #[error("task not found: {0}")]
    NotFound(String),

    /// The active cancellation handle fired
    #[error("operation cancelled")]
    Cancelled,

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,
}

impl Error {
    /// Returns true if this error is the result of the task's cancellation
    /// handle firing (pause, cancel, or shutdown) rather than a failure.
    ///
    /// The runner uses this to exit cleanly without transitioning to Failed.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::Fetch(e) => e.kind == FetchErrorKind::Cancelled,
            Error::Resolve(ResolveError::Fetch(e)) => e.kind == FetchErrorKind::Cancelled,
            _ => false,
        }
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Classification of a fetch failure
///
/// The runner maps these onto its retry policy: timeouts, resets, and most
/// HTTP status codes are transient for HLS segments, while a 404 on a
/// segment fails the task immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchErrorKind {
    /// The connect or receive timeout elapsed
    #[error("request timed out")]
    Timeout,

    /// The connection was refused, reset, or dropped mid-transfer
    #[error("connection reset")]
    ConnectionReset,

    /// The server answered with a non-success status code
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// The fetch was cancelled through its cancellation handle
    #[error("cancelled")]
    Cancelled,

    /// Any other transport or I/O failure
    #[error("{0}")]
    Other(String),
}

/// A failed fetch of a single resource (whole MP4 or one segment)
///
/// Besides the failure [`kind`](FetchErrorKind), the error records whether a
/// partial file was left on disk, so resumption accounting stays truthful.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct FetchError {
    /// What went wrong
    pub kind: FetchErrorKind,
    /// Whether a partial file was preserved at the destination path
    pub partial_preserved: bool,
}

impl FetchError {
    /// Fetch aborted by the cancellation handle. The partial file is never
    /// deleted on cancellation so that a later resume can continue.
    pub(crate) fn cancelled(partial_preserved: bool) -> Self {
        Self {
            kind: FetchErrorKind::Cancelled,
            partial_preserved,
        }
    }

    /// Non-success HTTP status from the server.
    pub(crate) fn http_status(code: u16, partial_preserved: bool) -> Self {
        Self {
            kind: FetchErrorKind::HttpStatus(code),
            partial_preserved,
        }
    }

    /// Disk write failure while streaming the response body.
    pub(crate) fn io(error: &std::io::Error, partial_preserved: bool) -> Self {
        Self {
            kind: FetchErrorKind::Other(format!("failed to write to disk: {error}")),
            partial_preserved,
        }
    }

    /// Classify a transport-level reqwest error.
    pub(crate) fn from_reqwest(error: &reqwest::Error, partial_preserved: bool) -> Self {
        let kind = if error.is_timeout() {
            FetchErrorKind::Timeout
        } else if error.is_connect() || io_source_is_reset(error) {
            FetchErrorKind::ConnectionReset
        } else {
            FetchErrorKind::Other(error.to_string())
        };
        Self {
            kind,
            partial_preserved,
        }
    }
}

/// Walk the source chain looking for an I/O error that indicates the peer
/// dropped the connection.
fn io_source_is_reset(error: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected
            );
        }
        source = inner.source();
    }
    false
}

/// HLS manifest resolution errors
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The manifest parsed to zero variants (master) or zero segments (media)
    #[error("manifest contains no usable entries")]
    EmptyManifest,

    /// Master playlists kept pointing at further master playlists
    #[error("too many master playlist redirects (limit {limit})")]
    TooManyRedirects {
        /// The redirect bound that was exceeded
        limit: usize,
    },

    /// The manifest URL could not be parsed as a base for relative URIs
    #[error("invalid manifest URL {url}: {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Why it could not be used
        reason: String,
    },

    /// Fetching the manifest text failed
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Download orchestration errors raised by the task runner
#[derive(Debug, Error)]
pub enum DownloadError {
    /// A segment exhausted its retry budget (or hit a non-retryable status)
    #[error("segment {index} failed after {attempts} attempt(s): {last_error}")]
    SegmentFailed {
        /// Zero-based index of the failed segment
        index: usize,
        /// How many fetch attempts were made
        attempts: u32,
        /// The final fetch error, rendered
        last_error: String,
    },

    /// AES decryption of a downloaded segment failed
    #[error("failed to decrypt segment {index}: {reason}")]
    DecryptionFailed {
        /// Zero-based index of the segment
        index: usize,
        /// Why decryption failed
        reason: String,
    },

    /// Cannot perform the requested operation in the task's current state
    #[error("cannot {operation} task {id} in state {current_state}")]
    InvalidState {
        /// The task the operation was attempted on
        id: String,
        /// The operation that was attempted (e.g. "pause", "resume")
        operation: String,
        /// The state that prevents the operation
        current_state: String,
    },
}

/// Errors from the AES-128-CBC segment decryption primitive
#[derive(Debug, Error)]
pub enum DecryptError {
    /// The key material was not 16 raw bytes or 32 hex characters
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// The IV was not 32 hex characters
    #[error("invalid IV material: {0}")]
    InvalidIv(String),

    /// The cipher rejected the data (typically bad padding from a wrong key)
    #[error("decryption failed: {0}")]
    Cipher(String),

    /// Reading or rewriting the segment file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The segment file being decrypted
        path: PathBuf,
        /// The underlying I/O error
        source: std::io::Error,
    },
}
