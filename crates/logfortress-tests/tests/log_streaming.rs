//! Integration tests for live log streams.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use logfortress_core::{
    ContainerStatus, RegistryState, RegistryStore, StreamLine, StreamMode, StreamOptions,
    StreamSession,
};
use logfortress_docker::LogStream;
use logfortress_tests::{manager_in_tempdir, FakeContainer, FakeControlPlane, Script};

const DEADLINE: Duration = Duration::from_secs(5);

/// Drain a stream to its end, failing the test if it never ends.
async fn collect(stream: LogStream) -> Vec<StreamLine> {
    tokio::time::timeout(DEADLINE, stream.collect::<Vec<_>>())
        .await
        .expect("stream did not end")
}

fn output(lines: &[&str]) -> Vec<StreamLine> {
    lines
        .iter()
        .map(|line| StreamLine::Output((*line).to_string()))
        .collect()
}

#[tokio::test]
async fn test_native_stream_yields_lines_in_order() -> Result<()> {
    let plane = FakeControlPlane::new(vec![FakeContainer::running("web-1", "nginx:1.27")
        .with_logs(Script::chunks([
            "listening on :80\nGET /hea",
            "lth 200\nGET /api/ord",
            "ers 201\n",
            "shutting down",
        ]))]);
    let (manager, _temp_dir) = manager_in_tempdir(plane.clone()).await?;

    let stream = manager.open_stream("web-1", StreamMode::Native).await?;
    assert_eq!(stream.session(), &StreamSession::native("web-1"));

    let lines = collect(stream).await;
    assert_eq!(
        lines,
        output(&[
            "listening on :80",
            "GET /health 200",
            "GET /api/orders 201",
            "shutting down",
        ])
    );
    assert_eq!(plane.attachments(), 1);
    assert!(plane.wait_released(DEADLINE).await);
    Ok(())
}

#[tokio::test]
async fn test_custom_file_stream_runs_follow_command() -> Result<()> {
    let plane = FakeControlPlane::new(vec![FakeContainer::running("web-1", "nginx:1.27")
        .with_id("feedfacecafe0000")
        .with_exec(Script::chunks(["worker started\r\n", "job 1 done\n"]))]);
    let (mut manager, _temp_dir) = manager_in_tempdir(plane.clone()).await?;
    manager.register("web-1", "/var/log/app.log").await?;

    let stream = manager.open_stream("web-1", StreamMode::CustomFile).await?;
    assert_eq!(
        stream.session(),
        &StreamSession::custom_file("web-1", "/var/log/app.log")
    );

    let lines = collect(stream).await;
    assert_eq!(lines, output(&["worker started", "job 1 done"]));
    assert_eq!(
        plane.exec_commands(),
        vec![(
            "feedfacecafe0000".to_string(),
            vec![
                "tail".to_string(),
                "-f".to_string(),
                "/var/log/app.log".to_string()
            ]
        )]
    );
    Ok(())
}

#[tokio::test]
async fn test_stopped_container_yields_single_notice_without_attaching() -> Result<()> {
    for status in [ContainerStatus::Exited, ContainerStatus::Paused] {
        let plane = FakeControlPlane::new(vec![FakeContainer::with_status(
            "web-1",
            "nginx:1.27",
            status,
        )
        .with_logs(Script::chunks(["should never be read\n"]))]);
        let (manager, _temp_dir) = manager_in_tempdir(plane.clone()).await?;

        let lines = collect(manager.open_stream("web-1", StreamMode::Native).await?).await;

        assert_eq!(
            lines,
            vec![StreamLine::Notice("Container web-1 is not running.".to_string())]
        );
        assert_eq!(plane.attachments(), 0);
    }
    Ok(())
}

#[tokio::test]
async fn test_stopped_container_custom_mode_never_execs() -> Result<()> {
    for status in [ContainerStatus::Exited, ContainerStatus::Paused] {
        let plane = FakeControlPlane::new(vec![FakeContainer::with_status(
            "worker",
            "python:3.12",
            status,
        )
        .with_exec(Script::chunks(["should never be read\n"]))]);
        let (mut manager, _temp_dir) = manager_in_tempdir(plane.clone()).await?;
        manager.register("worker", "/app/worker.log").await?;

        let lines = collect(manager.open_stream("worker", StreamMode::CustomFile).await?).await;

        assert_eq!(
            lines,
            vec![StreamLine::Notice("Container worker is not running.".to_string())]
        );
        assert!(plane.exec_commands().is_empty());
        assert_eq!(plane.attachments(), 0);
    }
    Ok(())
}

#[tokio::test]
async fn test_attach_failure_yields_single_notice() -> Result<()> {
    let plane = FakeControlPlane::new(vec![FakeContainer::running("web-1", "nginx:1.27")
        .failing_attach("500: configured logging driver does not support reading")]);
    let (mut manager, _temp_dir) = manager_in_tempdir(plane.clone()).await?;
    manager.register("web-1", "/var/log/app.log").await?;

    for mode in [StreamMode::Native, StreamMode::CustomFile] {
        let lines = collect(manager.open_stream("web-1", mode).await?).await;

        assert_eq!(lines.len(), 1, "{mode}: {lines:?}");
        assert!(lines[0].is_notice());
        assert!(lines[0].text().starts_with("Error streaming logs:"));
        assert!(lines[0].text().contains("logging driver does not support reading"));
    }
    assert_eq!(plane.exec_commands().len(), 1);
    assert_eq!(plane.attachments(), 0);
    Ok(())
}

#[tokio::test]
async fn test_lookup_failure_yields_single_notice() -> Result<()> {
    let plane = FakeControlPlane::new(vec![FakeContainer::running("web-1", "nginx:1.27")
        .with_logs(Script::chunks(["should never be read\n"]))]);
    plane.set_unreachable(true);

    let stream = LogStream::start(
        plane.clone(),
        StreamSession::native("web-1"),
        &StreamOptions::default(),
    );
    let lines = collect(stream).await;

    assert_eq!(lines.len(), 1);
    assert!(lines[0].is_notice());
    assert!(lines[0].text().starts_with("Error streaming logs:"));
    assert!(lines[0].text().contains("connection refused"));
    assert_eq!(plane.attachments(), 0);
    Ok(())
}

#[tokio::test]
async fn test_unknown_container_yields_single_notice() -> Result<()> {
    let plane = FakeControlPlane::new(Vec::new());
    let (manager, _temp_dir) = manager_in_tempdir(plane.clone()).await?;

    let lines = collect(manager.open_stream("ghost", StreamMode::Native).await?).await;

    assert_eq!(lines.len(), 1);
    assert!(lines[0].is_notice());
    assert!(lines[0].text().contains("ghost"));
    assert_eq!(plane.attachments(), 0);
    Ok(())
}

#[tokio::test]
async fn test_custom_mode_without_registration_yields_notice() -> Result<()> {
    let plane = FakeControlPlane::new(vec![FakeContainer::running("web-1", "nginx:1.27")]);
    let (manager, _temp_dir) = manager_in_tempdir(plane.clone()).await?;

    let lines = collect(manager.open_stream("web-1", StreamMode::CustomFile).await?).await;

    assert_eq!(
        lines,
        vec![StreamLine::Notice(
            "No custom log source registered for container 'web-1'.".to_string()
        )]
    );
    assert_eq!(plane.attachments(), 0);
    Ok(())
}

#[tokio::test]
async fn test_origin_failure_becomes_terminal_notice() -> Result<()> {
    let plane = FakeControlPlane::new(vec![FakeContainer::running("web-1", "nginx:1.27")
        .with_logs(Script::chunks(["first\nsecond, cut sh"]).then_fail("connection reset"))]);
    let (manager, _temp_dir) = manager_in_tempdir(plane.clone()).await?;

    let lines = collect(manager.open_stream("web-1", StreamMode::Native).await?).await;

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[..2], output(&["first", "second, cut sh"])[..]);
    assert!(lines[2].is_notice());
    assert!(lines[2].text().starts_with("Error streaming logs:"));
    assert!(lines[2].text().contains("connection reset"));
    Ok(())
}

#[tokio::test]
async fn test_dropping_stream_releases_idle_origin() -> Result<()> {
    let plane = FakeControlPlane::new(vec![FakeContainer::running("web-1", "nginx:1.27")
        .with_logs(Script::chunks(["booted\n"]).then_idle())]);
    let (manager, _temp_dir) = manager_in_tempdir(plane.clone()).await?;

    let mut stream = manager.open_stream("web-1", StreamMode::Native).await?;
    let first = tokio::time::timeout(DEADLINE, stream.next_line()).await?;
    assert_eq!(first, Some(StreamLine::Output("booted".to_string())));
    assert_eq!(plane.releases(), 0);

    drop(stream);

    assert!(plane.wait_released(DEADLINE).await, "origin was not released");
    assert_eq!(plane.releases(), 1);
    Ok(())
}

#[tokio::test]
async fn test_close_releases_exec_channel() -> Result<()> {
    let plane = FakeControlPlane::new(vec![FakeContainer::running("web-1", "nginx:1.27")
        .with_exec(Script::chunks(Vec::<&str>::new()).then_idle())]);
    let (mut manager, _temp_dir) = manager_in_tempdir(plane.clone()).await?;
    manager.register("web-1", "/var/log/app.log").await?;

    let stream = manager.open_stream("web-1", StreamMode::CustomFile).await?;

    // Let the task attach before closing.
    tokio::time::timeout(DEADLINE, async {
        while plane.attachments() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;
    stream.close();

    assert!(plane.wait_released(DEADLINE).await, "exec channel was not released");
    Ok(())
}

#[tokio::test]
async fn test_slow_consumer_applies_backpressure() -> Result<()> {
    let chunks: Vec<String> = (0..50).map(|i| format!("line {i}\n")).collect();
    let plane = FakeControlPlane::new(vec![
        FakeContainer::running("web-1", "nginx:1.27").with_logs(Script::chunks(&chunks)),
    ]);
    let options = StreamOptions {
        buffer_lines: 2,
        ..StreamOptions::default()
    };

    let mut stream = LogStream::start(plane.clone(), StreamSession::native("web-1"), &options);

    let mut received = Vec::new();
    while let Some(line) = tokio::time::timeout(DEADLINE, stream.next_line()).await? {
        tokio::time::sleep(Duration::from_millis(1)).await;
        received.push(line);
    }

    let expected: Vec<StreamLine> = (0..50)
        .map(|i| StreamLine::Output(format!("line {i}")))
        .collect();
    assert_eq!(received, expected);
    Ok(())
}

#[tokio::test]
async fn test_streams_are_independent() -> Result<()> {
    let plane = FakeControlPlane::new(vec![
        FakeContainer::running("web-1", "nginx:1.27")
            .with_logs(Script::chunks(["web says hi\n"]).then_idle()),
        FakeContainer::running("db", "postgres:16").with_logs(Script::chunks(["db ready\n"])),
    ]);
    let options = StreamOptions::default();
    let control_plane: Arc<FakeControlPlane> = plane.clone();

    let mut web = LogStream::start(control_plane.clone(), StreamSession::native("web-1"), &options);
    let db = LogStream::start(control_plane, StreamSession::native("db"), &options);

    assert_eq!(collect(db).await, output(&["db ready"]));
    assert_eq!(
        tokio::time::timeout(DEADLINE, web.next_line()).await?,
        Some(StreamLine::Output("web says hi".to_string()))
    );
    web.close();
    Ok(())
}

#[tokio::test]
async fn test_shared_manager_opens_concurrent_streams() -> Result<()> {
    let plane = FakeControlPlane::new(vec![
        FakeContainer::running("web-1", "nginx:1.27")
            .with_exec(Script::chunks(["custom line\n"])),
        FakeContainer::running("db", "postgres:16").with_logs(Script::chunks(["db ready\n"])),
    ]);
    let (mut manager, _temp_dir) = manager_in_tempdir(plane.clone()).await?;
    manager.register("web-1", "/var/log/app.log").await?;
    let manager = Arc::new(manager);

    let (web, db) = tokio::join!(
        manager.open_stream("web-1", StreamMode::CustomFile),
        manager.open_stream("db", StreamMode::Native),
    );

    let (web, db) = tokio::join!(collect(web?), collect(db?));
    assert_eq!(web, output(&["custom line"]));
    assert_eq!(db, output(&["db ready"]));
    Ok(())
}

#[tokio::test]
async fn test_custom_stream_uses_current_registry_file() -> Result<()> {
    let plane = FakeControlPlane::new(vec![FakeContainer::running("web-1", "nginx:1.27")
        .with_id("feedfacecafe0000")
        .with_exec(Script::chunks(["rotated\n"]))]);
    let (manager, temp_dir) = manager_in_tempdir(plane.clone()).await?;

    // Registered by another process after this manager started.
    let mut external = RegistryState::new();
    external.upsert("web-1", "/var/log/rotated.log");
    RegistryStore::in_dir(temp_dir.path())?.save(&external)?;

    let lines = collect(manager.open_stream("web-1", StreamMode::CustomFile).await?).await;

    assert_eq!(lines, output(&["rotated"]));
    assert_eq!(
        plane.exec_commands()[0].1.last().map(String::as_str),
        Some("/var/log/rotated.log")
    );
    Ok(())
}
