//! Integration tests for the orchestrator lifecycle.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use logtail_core::config::LogtailConfig;
use logtail_core::pipeline::HealthStatus;
use logtail_daemon::orchestrator::Orchestrator;

const SAMPLE_LINE: &str = r#"172.0.0.12 - - [04/Mar/2018:13:49:52 +0000] http "GET /foo?query=t HTTP/1.0" 200 2133 "-" "KeepAliveClient" "-" 1.005 1.854"#;

fn test_config(path: &Path) -> LogtailConfig {
    let mut config = LogtailConfig::default();
    config.source.path = path.display().to_string();
    config.source.poll_interval_ms = 10;
    config.monitor.enabled = false;
    config.metrics.enabled = false;
    config
}

/// Returns an address nothing is listening on.
fn closed_port_dsn() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}@u@p@db@s")
}

#[test]
fn test_build_rejects_invalid_config() {
    let mut config = LogtailConfig::default();
    config.sink.workers = 0;

    let result = Orchestrator::build_from_config(config);
    let err = result.err().expect("zero sink workers must be rejected");
    assert!(err.to_string().contains("config validation failed"));
}

#[tokio::test]
async fn test_build_from_file_reports_missing_file() {
    let result = Orchestrator::build(Path::new("/nonexistent/logtail.toml")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_build_from_file() {
    let log = tempfile::NamedTempFile::new().unwrap();
    let mut toml = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        toml,
        "[source]\npath = \"{}\"\n\n[monitor]\nenabled = false\n",
        log.path().display()
    )
    .unwrap();

    let orchestrator = Orchestrator::build(toml.path()).await.unwrap();
    assert_eq!(
        orchestrator.config().source.path,
        log.path().display().to_string()
    );
    assert!(orchestrator.health().await.is_unhealthy());
}

#[tokio::test]
async fn test_run_until_shutdown_stops_pipeline() {
    let log = tempfile::NamedTempFile::new().unwrap();
    let mut orchestrator = Orchestrator::build_from_config(test_config(log.path())).unwrap();

    let shutdown = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok::<_, anyhow::Error>("test")
    };
    orchestrator.run_until(shutdown).await.unwrap();

    assert_eq!(orchestrator.pipeline().state_name(), "stopped");
    assert!(matches!(
        orchestrator.health().await,
        HealthStatus::Unhealthy(_)
    ));
}

#[tokio::test]
async fn test_run_fails_when_log_file_missing() {
    let config = test_config(Path::new("/nonexistent/logtail/access.log"));
    let mut orchestrator = Orchestrator::build_from_config(config).unwrap();

    let err = orchestrator
        .run_until(std::future::pending::<anyhow::Result<&'static str>>())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("failed to start log pipeline"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sink_failure_ends_run_with_error() {
    let log = tempfile::NamedTempFile::new().unwrap();
    let mut config = test_config(log.path());
    config.sink.dsn = closed_port_dsn();
    config.sink.timeout_secs = 2;
    let mut orchestrator = Orchestrator::build_from_config(config).unwrap();

    let path = log.path().to_path_buf();
    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        writeln!(file, "{SAMPLE_LINE}").unwrap();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(15),
        orchestrator.run_until(std::future::pending::<anyhow::Result<&'static str>>()),
    )
    .await
    .expect("run should end after the sink fails");

    writer.await.unwrap();
    let err = result.unwrap_err();
    assert!(err.to_string().contains("pipeline failed"));
    assert_eq!(orchestrator.pipeline().state_name(), "stopped");
}
