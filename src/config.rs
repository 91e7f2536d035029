//! Configuration types for video-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Download behavior configuration (directories, concurrency, retry policy)
///
/// Groups settings related to how tasks are fetched and stored.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Download directory for final artifacts and `<id>_temp` segment
    /// directories (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum concurrent downloads (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Maximum fetch attempts per HLS segment before the task fails
    /// (default: 3)
    #[serde(default = "default_segment_retry_limit")]
    pub segment_retry_limit: u32,

    /// Fixed delay between segment fetch attempts (default: 2s)
    #[serde(default = "default_segment_retry_delay")]
    pub segment_retry_delay: Duration,

    /// Minimum progress advance before another progress event is emitted
    /// (default: 0.005). Bounds event-stream traffic independent of network
    /// chunk size.
    #[serde(default = "default_progress_emit_delta")]
    pub progress_emit_delta: f64,

    /// Maximum number of manifests to fetch while following master →
    /// media playlist redirects before giving up (default: 4)
    #[serde(default = "default_max_manifest_redirects")]
    pub max_manifest_redirects: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent_downloads: default_max_concurrent(),
            segment_retry_limit: default_segment_retry_limit(),
            segment_retry_delay: default_segment_retry_delay(),
            progress_emit_delta: default_progress_emit_delta(),
            max_manifest_redirects: default_max_manifest_redirects(),
        }
    }
}

/// Network timeouts for the shared HTTP client
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// TCP connect timeout (default: 30s)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Idle receive timeout between body chunks (default: 5min)
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            receive_timeout: default_receive_timeout(),
        }
    }
}

/// Persistence configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path (default: "./video-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Main configuration for [`VideoDownloader`](crate::VideoDownloader)
///
/// All fields have sensible defaults; `Config::default()` works out of the
/// box with a local `./downloads` directory and `./video-dl.db` catalog.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Network timeout settings
    #[serde(default)]
    pub network: NetworkConfig,

    /// Persistence settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Buffer size of the task event broadcast channel (default: 1000).
    /// Slow subscribers that fall further behind observe a lag error and
    /// miss the oldest snapshots; producers never block.
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_segment_retry_limit() -> u32 {
    3
}

fn default_segment_retry_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_progress_emit_delta() -> f64 {
    0.005
}

fn default_max_manifest_redirects() -> usize {
    4
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_receive_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./video-dl.db")
}

fn default_event_buffer_size() -> usize {
    1000
}
