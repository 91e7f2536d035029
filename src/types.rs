//! Core types for video-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a download task
///
/// Opaque string, minted at creation time from a monotonically increasing
/// millisecond clock so that lexical ordering of equal-length ids matches
/// insertion order. Treat the contents as opaque; only [`TaskId::sort_key`]
/// relies on the numeric form.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create a new TaskId from an existing string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// View the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric sort key for newest-first listings.
    ///
    /// Ids minted by this library always parse; foreign ids sort last.
    pub fn sort_key(&self) -> i64 {
        self.0.parse().unwrap_or(i64::MIN)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for TaskId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for TaskId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <String as sqlx::Encode<'q, sqlx::Sqlite>>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for TaskId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <String as sqlx::Decode<'r, sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Task status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting in the backlog for a concurrency slot
    Pending,
    /// Currently downloading
    Downloading,
    /// Paused by user (or by startup recovery)
    Paused,
    /// Successfully completed; final artifact exists on disk
    Completed,
    /// Failed with an error message
    Failed,
    /// Cancelled by user; row and on-disk artifacts removed
    Cancelled,
}

impl Status {
    /// Convert integer status code to Status enum
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => Status::Pending,
            1 => Status::Downloading,
            2 => Status::Paused,
            3 => Status::Completed,
            4 => Status::Failed,
            5 => Status::Cancelled,
            _ => Status::Failed, // Default to Failed for unknown status
        }
    }

    /// Convert Status enum to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            Status::Pending => 0,
            Status::Downloading => 1,
            Status::Paused => 2,
            Status::Completed => 3,
            Status::Failed => 4,
            Status::Cancelled => 5,
        }
    }

    /// Returns true for states no scheduling operation can leave
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Cancelled)
    }
}

/// What family of remote resource a task downloads
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Single-file progressive media
    Mp4,
    /// HLS manifest decomposed into an ordered segment sequence
    Hls,
}

impl TaskKind {
    /// Classify a URL: anything whose lowercased form contains `.m3u8` is
    /// HLS, everything else is treated as progressive MP4.
    pub fn from_url(url: &str) -> Self {
        if url.to_ascii_lowercase().contains(".m3u8") {
            TaskKind::Hls
        } else {
            TaskKind::Mp4
        }
    }

    /// Convert integer type code to TaskKind enum
    pub fn from_i32(kind: i32) -> Self {
        match kind {
            1 => TaskKind::Hls,
            _ => TaskKind::Mp4,
        }
    }

    /// Convert TaskKind enum to integer type code
    pub fn to_i32(&self) -> i32 {
        match self {
            TaskKind::Mp4 => 0,
            TaskKind::Hls => 1,
        }
    }
}

/// A download task snapshot
///
/// This is the central entity of the engine: the in-memory working state,
/// the persisted catalog row, and the event payload are all this shape.
/// Every mutation that changes an observable field is broadcast to
/// subscribers as a fresh snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier, assigned at creation
    pub id: TaskId,

    /// Source URL. For HLS tasks this is rewritten in place when a master
    /// manifest is replaced by its chosen variant playlist.
    pub url: String,

    /// User-visible title; immutable after creation
    pub title: String,

    /// MP4 or HLS, derived from the URL suffix at creation
    pub kind: TaskKind,

    /// Absolute path of the final artifact; set before bytes are first written
    pub save_path: Option<PathBuf>,

    /// Current lifecycle status
    pub status: Status,

    /// Overall progress in `[0.0, 1.0]`
    pub progress: f64,

    /// Bytes for MP4; completed segment count for HLS
    pub downloaded_units: u64,

    /// Bytes for MP4 (0 until the first response header arrives);
    /// segment count for HLS
    pub total_units: u64,

    /// Error message, populated only when status is Failed
    pub error: Option<String>,

    /// AES-128 key material for encrypted HLS streams (hex or raw)
    pub key: Option<String>,

    /// AES initialisation vector; the segment index is used when absent
    pub iv: Option<String>,
}

impl Task {
    /// Create a new Pending task for the given URL.
    pub(crate) fn new(
        id: TaskId,
        url: impl Into<String>,
        title: impl Into<String>,
        key: Option<String>,
        iv: Option<String>,
    ) -> Self {
        let url = url.into();
        let kind = TaskKind::from_url(&url);
        Self {
            id,
            url,
            title: title.into(),
            kind,
            save_path: None,
            status: Status::Pending,
            progress: 0.0,
            downloaded_units: 0,
            total_units: 0,
            error: None,
            key,
            iv,
        }
    }
}

/// Options for adding a task to the engine
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TaskOptions {
    /// AES-128 key for encrypted HLS segments (hex or 16 raw bytes)
    #[serde(default)]
    pub key: Option<String>,

    /// AES IV as hex; when absent the segment index is used per the HLS spec
    #[serde(default)]
    pub iv: Option<String>,
}
