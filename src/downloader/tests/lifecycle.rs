use super::*;
use crate::VideoDownloader;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_restart_coerces_downloading_to_paused() {
    let (config, _temp_dir) = test_config(0);

    let id = {
        let downloader = VideoDownloader::new(config.clone()).await.unwrap();
        let id = downloader
            .add("http://example.com/movie.mp4", "Movie", TaskOptions::default())
            .await
            .unwrap();

        // Simulate a crash mid-download: persist the task as Downloading
        let task = downloader
            .update_task(&id, |t| t.status = Status::Downloading)
            .unwrap();
        downloader.db.upsert(&task).await.unwrap();
        downloader.db.close().await;
        id
    };

    // Reopen the engine on the same catalog
    let downloader = VideoDownloader::new(config).await.unwrap();

    let task = downloader.get(&id).unwrap();
    assert_eq!(
        task.status,
        Status::Paused,
        "interrupted task must restore as Paused, never auto-resume"
    );
    assert_eq!(downloader.backlog_len(), 0);
    assert_eq!(downloader.active_count(), 0);

    // The coercion is persisted, not just in memory
    let rows = downloader.db.load_all().await.unwrap();
    assert_eq!(rows[0].status, Status::Paused);

    // resume() returns it to the queue
    downloader.resume(&id).await.unwrap();
    assert_eq!(downloader.get(&id).unwrap().status, Status::Pending);
    assert_eq!(downloader.backlog_len(), 1);
}

#[tokio::test]
async fn test_restart_requeues_pending_tasks_in_insertion_order() {
    let (config, _temp_dir) = test_config(0);

    let ids = {
        let downloader = VideoDownloader::new(config.clone()).await.unwrap();
        let mut ids = Vec::new();
        for i in 0..3 {
            ids.push(
                downloader
                    .add(
                        &format!("http://example.com/{i}.mp4"),
                        "n",
                        TaskOptions::default(),
                    )
                    .await
                    .unwrap(),
            );
        }
        downloader.db.close().await;
        ids
    };

    let downloader = VideoDownloader::new(config).await.unwrap();

    let backlog: Vec<TaskId> = downloader
        .queue_state
        .inner
        .lock()
        .backlog
        .iter()
        .cloned()
        .collect();
    assert_eq!(backlog, ids, "restored backlog must follow insertion order");
}

#[tokio::test]
async fn test_restart_preserves_terminal_and_paused_states() {
    let (config, _temp_dir) = test_config(0);

    let (completed, paused, failed) = {
        let downloader = VideoDownloader::new(config.clone()).await.unwrap();
        let mut staged = Vec::new();
        for (i, status) in [Status::Completed, Status::Paused, Status::Failed]
            .into_iter()
            .enumerate()
        {
            let id = downloader
                .add(
                    &format!("http://example.com/{i}.mp4"),
                    "n",
                    TaskOptions::default(),
                )
                .await
                .unwrap();
            let task = downloader
                .update_task(&id, |t| {
                    t.status = status;
                    if status == Status::Failed {
                        t.error = Some("HTTP status 500".to_string());
                    }
                })
                .unwrap();
            downloader.db.upsert(&task).await.unwrap();
            staged.push(id);
        }
        downloader.db.close().await;
        (staged[0].clone(), staged[1].clone(), staged[2].clone())
    };

    let downloader = VideoDownloader::new(config).await.unwrap();

    assert_eq!(downloader.get(&completed).unwrap().status, Status::Completed);
    assert_eq!(downloader.get(&paused).unwrap().status, Status::Paused);
    let failed_task = downloader.get(&failed).unwrap();
    assert_eq!(failed_task.status, Status::Failed);
    assert_eq!(failed_task.error.as_deref(), Some("HTTP status 500"));
    assert_eq!(downloader.backlog_len(), 0, "none of these states re-enqueue");
}

#[tokio::test]
async fn test_shutdown_pauses_active_download() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8; 1024])
                .set_delay(std::time::Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let (config, _temp_dir) = test_config(3);
    let downloader = VideoDownloader::new(config).await.unwrap();

    let id = downloader
        .add(
            &format!("{}/slow.mp4", server.uri()),
            "slow",
            TaskOptions::default(),
        )
        .await
        .unwrap();
    wait_for_status(&downloader, &id, Status::Downloading, std::time::Duration::from_secs(5)).await;

    let started = std::time::Instant::now();
    downloader.shutdown().await.unwrap();
    assert!(
        started.elapsed() < std::time::Duration::from_secs(20),
        "shutdown must not wait out the server delay"
    );

    let task = downloader.get(&id).unwrap();
    assert_eq!(task.status, Status::Paused);
    assert_eq!(downloader.active_count(), 0);

    // Persisted as Paused for the next session
    let rows = downloader.db.load_all().await.unwrap();
    assert_eq!(rows[0].status, Status::Paused);
}
