//! Task catalog CRUD operations.

use crate::error::DatabaseError;
use crate::types::{Task, TaskId};
use crate::{Error, Result};

use super::{Database, TaskRow};

impl Database {
    /// Load the entire task catalog.
    ///
    /// Called once at startup; row order is unspecified and the scheduler
    /// sorts what it needs.
    pub async fn load_all(&self) -> Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT
                id, url, title, type, savePath,
                status, progress, downloadedBytes, totalBytes,
                error, m3u8Key, m3u8IV
            FROM downloads
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to load tasks: {}",
                e
            )))
        })?;

        Ok(rows.into_iter().map(Task::from).collect())
    }

    /// Insert or replace a task snapshot by id.
    pub async fn upsert(&self, task: &Task) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO downloads (
                id, url, title, type, savePath,
                status, progress, downloadedBytes, totalBytes,
                error, m3u8Key, m3u8IV
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.id)
        .bind(&task.url)
        .bind(&task.title)
        .bind(task.kind.to_i32())
        .bind(task.save_path.as_ref().map(|p| p.to_string_lossy().into_owned()))
        .bind(task.status.to_i32())
        .bind(task.progress)
        .bind(task.downloaded_units as i64)
        .bind(task.total_units as i64)
        .bind(&task.error)
        .bind(&task.key)
        .bind(&task.iv)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to upsert task: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Delete a task row by id.
    pub async fn delete(&self, id: &TaskId) -> Result<()> {
        sqlx::query("DELETE FROM downloads WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete task: {}",
                    e
                )))
            })?;

        Ok(())
    }
}
