use crate::db::Database;
use crate::types::{Status, Task, TaskId, TaskKind};
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn sample_task(id: &str) -> Task {
    Task {
        id: TaskId::from(id),
        url: "http://example.com/stream/playlist.m3u8".to_string(),
        title: "Sample".to_string(),
        kind: TaskKind::Hls,
        save_path: Some(PathBuf::from(format!("/downloads/{id}.mp4"))),
        status: Status::Paused,
        progress: 0.4,
        downloaded_units: 2,
        total_units: 5,
        error: None,
        key: Some("00112233445566778899aabbccddeeff".to_string()),
        iv: Some("0x000102030405060708090a0b0c0d0e0f".to_string()),
    }
}

#[tokio::test]
async fn test_upsert_and_load_round_trip() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let task = sample_task("1700000000001");
    db.upsert(&task).await.unwrap();

    let loaded = db.load_all().await.unwrap();
    assert_eq!(loaded.len(), 1);

    let got = &loaded[0];
    assert_eq!(got.id, task.id);
    assert_eq!(got.url, task.url);
    assert_eq!(got.title, task.title);
    assert_eq!(got.kind, task.kind);
    assert_eq!(got.save_path, task.save_path);
    assert_eq!(got.status, task.status);
    assert_eq!(got.progress, task.progress);
    assert_eq!(got.downloaded_units, task.downloaded_units);
    assert_eq!(got.total_units, task.total_units);
    assert_eq!(got.error, task.error);
    assert_eq!(got.key, task.key);
    assert_eq!(got.iv, task.iv);

    db.close().await;
}

#[tokio::test]
async fn test_upsert_replaces_existing_row() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let mut task = sample_task("1700000000002");
    db.upsert(&task).await.unwrap();

    task.status = Status::Failed;
    task.error = Some("segment 3 failed after 3 attempt(s): HTTP status 500".to_string());
    task.progress = 0.6;
    db.upsert(&task).await.unwrap();

    let loaded = db.load_all().await.unwrap();
    assert_eq!(loaded.len(), 1, "upsert must replace, not duplicate");
    assert_eq!(loaded[0].status, Status::Failed);
    assert_eq!(loaded[0].error, task.error);
    assert_eq!(loaded[0].progress, 0.6);

    db.close().await;
}

#[tokio::test]
async fn test_delete_removes_row() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let task = sample_task("1700000000003");
    db.upsert(&task).await.unwrap();
    db.delete(&task.id).await.unwrap();

    let loaded = db.load_all().await.unwrap();
    assert!(loaded.is_empty());

    db.close().await;
}

#[tokio::test]
async fn test_delete_nonexistent_is_a_noop() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    db.delete(&TaskId::from("999")).await.unwrap();

    db.close().await;
}

#[tokio::test]
async fn test_load_all_returns_every_row() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    for i in 0..4 {
        let mut task = sample_task(&format!("170000000000{i}"));
        task.kind = if i % 2 == 0 {
            TaskKind::Mp4
        } else {
            TaskKind::Hls
        };
        db.upsert(&task).await.unwrap();
    }

    let loaded = db.load_all().await.unwrap();
    assert_eq!(loaded.len(), 4);

    db.close().await;
}

#[tokio::test]
async fn test_optional_fields_survive_as_null() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let mut task = sample_task("1700000000009");
    task.save_path = None;
    task.error = None;
    task.key = None;
    task.iv = None;
    db.upsert(&task).await.unwrap();

    let loaded = db.load_all().await.unwrap();
    assert!(loaded[0].save_path.is_none());
    assert!(loaded[0].error.is_none());
    assert!(loaded[0].key.is_none());
    assert!(loaded[0].iv.is_none());

    db.close().await;
}

#[tokio::test]
async fn test_reopening_catalog_is_idempotent() {
    let temp_file = NamedTempFile::new().unwrap();

    {
        let db = Database::new(temp_file.path()).await.unwrap();
        db.upsert(&sample_task("1700000000010")).await.unwrap();
        db.close().await;
    }

    // Second open must not re-run the schema migration destructively
    let db = Database::new(temp_file.path()).await.unwrap();
    let loaded = db.load_all().await.unwrap();
    assert_eq!(loaded.len(), 1);

    db.close().await;
}
