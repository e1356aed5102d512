use site_uptime_monitor::{MetricsExport, MonitorConfig, MonitorPhase, ProbeStatus, ProjectConfig, ProjectHealthSnapshot, UptimeMonitor};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn site_with_failing_health() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(50)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503).set_delay(Duration::from_millis(80)))
        .mount(&server)
        .await;
    server
}

fn config_for(server: &MockServer, log_dir: &std::path::Path) -> MonitorConfig {
    MonitorConfig {
        projects: vec![ProjectConfig::new(
            "site",
            "Dealership Website",
            server.uri(),
            1,
            vec!["/".to_string(), "/health".to_string()],
        )],
        check_interval: Duration::from_millis(200),
        request_timeout: Duration::from_secs(5),
        log_dir: log_dir.to_path_buf(),
        dashboard_every_rounds: 0,
        ..MonitorConfig::default()
    }
}

#[tokio::test]
async fn failing_health_path_marks_round_down() {
    let server = site_with_failing_health().await;
    let dir = tempfile::tempdir().unwrap();
    let monitor = UptimeMonitor::new(config_for(&server, dir.path())).unwrap();

    let snapshots = monitor.run_round().await;
    let snapshot = &snapshots[0];

    assert!(!snapshot.overall_health);
    assert_eq!(snapshot.results[0].path, "/");
    assert_eq!(snapshot.results[1].path, "/health");
    assert_eq!(snapshot.results[1].result.status, ProbeStatus::Code(503));
    assert!(snapshot.avg_response_time_ms >= 65.0);
    assert!(snapshot.avg_response_time_ms < 1000.0);

    let state = monitor.store().state("site").unwrap();
    let state = state.read().await;
    assert_eq!(state.down_count(), 1);
    assert_eq!(state.up_count(), 0);
    assert_eq!(state.errors().len(), 1);
    assert_eq!(state.errors()[0].failed_results[0].path, "/health");
}

#[tokio::test]
async fn unresponsive_endpoint_times_out_without_blocking_siblings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(&server, dir.path());
    config.request_timeout = Duration::from_millis(300);
    let monitor = UptimeMonitor::new(config).unwrap();

    let snapshot = monitor.run_round().await.remove(0);

    assert!(snapshot.results[0].result.success);
    assert_eq!(snapshot.results[1].result.status, ProbeStatus::Timeout);
    assert_eq!(snapshot.results[1].result.latency_ms, 300);
    assert!(!snapshot.overall_health);
}

#[tokio::test]
async fn scheduled_rounds_log_and_export_on_shutdown() {
    let server = site_with_failing_health().await;
    let dir = tempfile::tempdir().unwrap();
    let monitor = Arc::new(UptimeMonitor::new(config_for(&server, dir.path())).unwrap());

    let handle = monitor.spawn();
    tokio::time::sleep(Duration::from_millis(500)).await;
    let export = monitor.interrupt(handle).await.unwrap();
    assert_eq!(monitor.phase().await, MonitorPhase::Terminated);

    let rounds = monitor.rounds_completed();
    assert!(rounds >= 1);

    let log = std::fs::read_to_string(dir.path().join("health-checks.log")).unwrap();
    let lines: Vec<ProjectHealthSnapshot> = log
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len() as u64, rounds);
    assert!(lines.iter().all(|s| s.results.len() == 2));

    let written: MetricsExport =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("metrics-export.json")).unwrap())
            .unwrap();
    let site = &written.projects["site"];
    assert_eq!(site.total_checks, rounds);
    assert_eq!(site.uptime_percent, 0.0);
    assert_eq!(site.error_count as u64, rounds);
    assert_eq!(written.projects, export.projects);
}
