//! # video-dl
//!
//! Persistent, concurrent backend library for video download applications.
//!
//! Fetches two families of remote resources (single-file progressive media
//! and HLS manifests decomposed into ordered segment sequences), reassembles
//! them into a single local artifact, and exposes live progress through an
//! event stream.
//!
//! ## Design Philosophy
//!
//! video-dl is designed to be:
//! - **Restart-safe** - The task catalog is persisted; interrupted work
//!   resumes without losing completed bytes or segments
//! - **Bounded** - At most a configured number of tasks download at once;
//!   the rest wait in a FIFO backlog
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to task snapshots, no polling
//!   required
//!
//! ## Quick Start
//!
//! ```no_run
//! use video_dl::{Config, TaskOptions, VideoDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = VideoDownloader::new(Config::default()).await?;
//!
//!     // Subscribe to progress events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(task) = events.recv().await {
//!             println!("{}: {:?} {:.1}%", task.id, task.status, task.progress * 100.0);
//!         }
//!     });
//!
//!     let id = downloader
//!         .add("http://example.com/live/index.m3u8", "Live recording", TaskOptions::default())
//!         .await?;
//!     println!("queued {id}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Core download engine (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Single-resource HTTP fetcher
pub mod fetcher;
/// HLS manifest resolution and segment decryption
pub mod hls;
/// Progress emission rate-limiting
pub mod progress;
/// Transient-failure classification
pub mod retry;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, NetworkConfig, PersistenceConfig};
pub use db::Database;
pub use downloader::VideoDownloader;
pub use error::{
    DatabaseError, DecryptError, DownloadError, Error, FetchError, FetchErrorKind, ResolveError,
    Result,
};
pub use fetcher::FetchOutcome;
pub use hls::ResolvedManifest;
pub use types::{Status, Task, TaskId, TaskKind, TaskOptions};

/// Run the downloader until a termination signal arrives, then shut it
/// down gracefully.
///
/// On SIGTERM or Ctrl+C (SIGINT) this fires every active task's
/// cancellation handle via [`VideoDownloader::shutdown`], waits for the
/// active set to drain, and parks interrupted tasks as Paused so the next
/// start can resume them. On non-unix platforms only Ctrl+C is watched.
///
/// # Example
///
/// ```no_run
/// use video_dl::{Config, VideoDownloader, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = VideoDownloader::new(Config::default()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: VideoDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments; the SIGTERM arm
    // then parks forever and Ctrl+C remains the only trigger.
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| {
            tracing::warn!(error = %e, "SIGTERM handler unavailable, watching Ctrl+C only");
        })
        .ok();

    tokio::select! {
        _ = async {
            match sigterm.as_mut() {
                Some(sigterm) => {
                    sigterm.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        } => {
            tracing::info!("Termination signal received, shutting down");
        }
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => tracing::info!("Ctrl+C received, shutting down"),
            // With no working signal source, shutting down immediately
            // beats running unstoppably
            Err(e) => tracing::error!(error = %e, "No shutdown signal source available"),
        },
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "No shutdown signal source available");
    } else {
        tracing::info!("Ctrl+C received, shutting down");
    }
}
