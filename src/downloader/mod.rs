//! Core download engine split into focused submodules.
//!
//! The `VideoDownloader` struct and its methods are organized by domain:
//! - [`control`] - Task lifecycle control (add/pause/resume/cancel/list)
//! - [`queue`] - FIFO backlog, active set, and the pump scheduling primitive
//! - [`lifecycle`] - Startup restore and graceful shutdown
//! - [`download_task`] - Per-task download execution (MP4 and HLS paths)

mod control;
pub(crate) mod download_task;
mod lifecycle;
mod queue;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::{Task, TaskId};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

/// One occupied concurrency slot.
///
/// The sequence number distinguishes runs of the same task: a paused run
/// winding down must not release the slot of the run that replaced it.
pub(crate) struct ActiveRun {
    pub(crate) seq: u64,
    pub(crate) token: tokio_util::sync::CancellationToken,
}

/// Backlog and active-set state, guarded by a single lock so the concurrency
/// bound and the "a task is in at most one of backlog/active" exclusivity
/// hold atomically.
pub(crate) struct QueueInner {
    /// FIFO backlog of task ids awaiting a concurrency slot
    pub(crate) backlog: VecDeque<TaskId>,
    /// Active tasks mapped to their current run (for pause/cancel)
    pub(crate) active: HashMap<TaskId, ActiveRun>,
    /// Sequence source for [`ActiveRun::seq`]
    pub(crate) next_run_seq: u64,
}

/// Queue and task scheduling state
#[derive(Clone)]
pub(crate) struct QueueState {
    /// Backlog + active set under one lock; never held across an await
    pub(crate) inner: Arc<parking_lot::Mutex<QueueInner>>,
    /// Flag to indicate whether new tasks are accepted (false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

/// Main download engine (cloneable - all fields are Arc-wrapped)
///
/// One instance owns the task table, the FIFO backlog, the bounded active
/// set, the progress event stream, and the persistent catalog. Prefer
/// passing a clone to collaborators over a process-wide global; tests
/// instantiate isolated engines.
#[derive(Clone)]
pub struct VideoDownloader {
    /// Database instance for persistence (wrapped in Arc for sharing across tasks)
    /// Public for integration tests to query the catalog
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Task>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Shared HTTP client; permits concurrent in-flight requests
    pub(crate) client: reqwest::Client,
    /// In-memory task table. Authoritative for the current session; the
    /// catalog is a durable mirror of it.
    pub(crate) tasks: Arc<parking_lot::Mutex<HashMap<TaskId, Task>>>,
    /// Queue and scheduling state
    pub(crate) queue_state: QueueState,
    /// Last minted task id, for monotonic id generation
    pub(crate) next_task_id: Arc<AtomicI64>,
}

impl VideoDownloader {
    /// Create a new VideoDownloader instance
    ///
    /// This initializes all core components:
    /// - Ensures the download directory exists
    /// - Opens/creates the SQLite catalog and runs migrations
    /// - Builds the shared HTTP client with connect/receive timeouts
    /// - Restores the persisted task table, coercing any task left in
    ///   Downloading by a previous process to Paused (never auto-resumed)
    /// - Starts the scheduling pump
    pub async fn new(config: Config) -> Result<Self> {
        tokio::fs::create_dir_all(&config.download.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.download.download_dir.display(),
                        e
                    ),
                ))
            })?;

        let db = Database::new(&config.persistence.database_path).await?;

        // Broadcast channel for task snapshots. Multiple subscribers are
        // supported; a subscriber that lags past the buffer misses the
        // oldest snapshots instead of blocking producers.
        let (event_tx, _rx) = tokio::sync::broadcast::channel(config.event_buffer_size.max(1));

        let client = reqwest::Client::builder()
            .connect_timeout(config.network.connect_timeout)
            .read_timeout(config.network.receive_timeout)
            .build()
            .map_err(|e| Error::HttpClient(e.to_string()))?;

        let queue_state = QueueState {
            inner: Arc::new(parking_lot::Mutex::new(QueueInner {
                backlog: VecDeque::new(),
                active: HashMap::new(),
                next_run_seq: 0,
            })),
            accepting_new: Arc::new(AtomicBool::new(true)),
        };

        let downloader = Self {
            db: Arc::new(db),
            event_tx,
            config: Arc::new(config),
            client,
            tasks: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            queue_state,
            next_task_id: Arc::new(AtomicI64::new(0)),
        };

        // Restore any persisted tasks from a previous session
        downloader.restore_catalog().await?;
        downloader.pump().await;

        Ok(downloader)
    }

    /// Subscribe to task events
    ///
    /// Every mutation that changes a task's status, progress, counters,
    /// error, or save path emits one full snapshot. Multiple subscribers
    /// are supported and receive all events independently. Events are
    /// buffered; a subscriber that falls behind by more than the configured
    /// buffer receives a `RecvError::Lagged` and misses the oldest
    /// snapshots; producers never block on slow consumers.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use video_dl::{Config, VideoDownloader};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = VideoDownloader::new(Config::default()).await?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(task) = events.recv().await {
    ///             println!("{}: {:?} {:.1}%", task.id, task.status, task.progress * 100.0);
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Task> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    ///
    /// The configuration is wrapped in an Arc, so this is a cheap clone.
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Emit a task snapshot to all subscribers
    ///
    /// If there are no active subscribers the snapshot is silently dropped;
    /// downloads proceed whether or not anyone is listening.
    pub(crate) fn emit_task(&self, task: &Task) {
        self.event_tx.send(task.clone()).ok();
    }

    /// Mutate a task in the table and broadcast the resulting snapshot.
    ///
    /// Returns `None` when the task no longer exists (cancelled).
    pub(crate) fn update_task<F>(&self, id: &TaskId, mutate: F) -> Option<Task>
    where
        F: FnOnce(&mut Task),
    {
        let snapshot = {
            let mut tasks = self.tasks.lock();
            let task = tasks.get_mut(id)?;
            mutate(task);
            task.clone()
        };
        self.emit_task(&snapshot);
        Some(snapshot)
    }

    /// Write a task snapshot through to the catalog.
    ///
    /// Repository failure is non-fatal: the in-memory table stays
    /// authoritative for the session and the error is logged.
    pub(crate) async fn persist(&self, task: &Task) {
        if let Err(e) = self.db.upsert(task).await {
            tracing::error!(
                task_id = %task.id,
                error = %e,
                "Failed to persist task; in-memory state remains authoritative"
            );
        }
    }

    /// Mint a new unique task id.
    ///
    /// Millisecond wall clock, bumped past the last minted id so that two
    /// adds in the same millisecond still get distinct, ordered ids.
    pub(crate) fn mint_task_id(&self) -> TaskId {
        let now = chrono::Utc::now().timestamp_millis();
        let id = match self.next_task_id.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |last| Some(last.max(now - 1) + 1),
        ) {
            Ok(last) => last.max(now - 1) + 1,
            Err(last) => last + 1, // unreachable: the closure always yields a value
        };
        TaskId::from(id.to_string())
    }

    /// Path of the final artifact for a task.
    pub(crate) fn artifact_path(&self, id: &TaskId) -> PathBuf {
        self.config
            .download
            .download_dir
            .join(format!("{id}.mp4"))
    }

    /// Path of the intermediate segment directory for an HLS task.
    pub(crate) fn temp_dir_path(&self, id: &TaskId) -> PathBuf {
        self.config
            .download
            .download_dir
            .join(format!("{id}_temp"))
    }

    /// Remove a task's on-disk artifacts (final file and temp directory).
    pub(crate) async fn delete_artifacts(&self, id: &TaskId) {
        let artifact = self.artifact_path(id);
        if artifact.exists()
            && let Err(e) = tokio::fs::remove_file(&artifact).await
        {
            tracing::warn!(
                task_id = %id,
                path = ?artifact,
                error = %e,
                "Failed to delete artifact file"
            );
        }

        let temp_dir = self.temp_dir_path(id);
        if temp_dir.exists()
            && let Err(e) = tokio::fs::remove_dir_all(&temp_dir).await
        {
            tracing::warn!(
                task_id = %id,
                path = ?temp_dir,
                error = %e,
                "Failed to delete segment temp directory"
            );
        }
    }
}
