//! Database layer for video-dl
//!
//! Handles SQLite persistence for the task catalog.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`tasks`] — Task catalog CRUD (load-all, upsert, delete)
//!
//! The repository is intentionally narrow: the scheduler loads the whole
//! catalog once at startup and then writes task snapshots through
//! [`Database::upsert`]. Row ordering is not guaranteed; the scheduler
//! sorts on load.

use crate::types::{Status, Task, TaskId, TaskKind};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::path::PathBuf;

mod migrations;
mod tasks;

/// Task row as persisted in the `downloads` table.
///
/// Column names are camelCase and enums are stored as their ordinal index;
/// this is the on-disk catalog format, kept stable for external consumers.
#[derive(Debug, Clone, FromRow)]
#[sqlx(rename_all = "camelCase")]
pub struct TaskRow {
    /// Unique task id (TEXT primary key)
    pub id: String,
    /// Source URL (rewritten for HLS master → variant redirects)
    pub url: String,
    /// User-visible title
    pub title: String,
    /// Kind code: 0 = MP4, 1 = HLS
    #[sqlx(rename = "type")]
    pub kind: i64,
    /// Absolute path of the final artifact, once known
    pub save_path: Option<String>,
    /// Status code: 0=Pending, 1=Downloading, 2=Paused, 3=Completed,
    /// 4=Failed, 5=Cancelled
    pub status: i64,
    /// Progress fraction in `[0.0, 1.0]`
    pub progress: f64,
    /// Bytes for MP4, completed segments for HLS
    pub downloaded_bytes: i64,
    /// Bytes for MP4, segment count for HLS
    pub total_bytes: i64,
    /// Error message when status is Failed
    pub error: Option<String>,
    /// AES-128 key material for encrypted HLS streams
    pub m3u8_key: Option<String>,
    /// AES IV material
    #[sqlx(rename = "m3u8IV")]
    pub m3u8_iv: Option<String>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: TaskId::from(row.id),
            url: row.url,
            title: row.title,
            kind: TaskKind::from_i32(row.kind as i32),
            save_path: row.save_path.map(PathBuf::from),
            status: Status::from_i32(row.status as i32),
            progress: row.progress,
            downloaded_units: row.downloaded_bytes.max(0) as u64,
            total_units: row.total_bytes.max(0) as u64,
            error: row.error,
            key: row.m3u8_key,
            iv: row.m3u8_iv,
        }
    }
}

/// Database handle for video-dl
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
