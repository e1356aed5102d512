//! Scheduler loop driving health-check rounds across all projects

use crate::config::MonitorConfig;
use crate::errors::{MonitorError, Result};
use crate::health::{ProjectHealthChecker, ProjectHealthSnapshot};
use crate::metrics::{MetricsStore, ProjectSummary};
use crate::probe::{HttpProber, Probe};
use crate::report::{MetricsExport, Reporter, render_dashboard};

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Where the monitor currently is in its round cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    Idle,
    Probing,
    Aggregating,
    Logging,
    Interrupted,
    ShuttingDown,
    Terminated,
}

/// Periodically probes every configured project and folds results into metrics
pub struct UptimeMonitor {
    config: MonitorConfig,
    checker: ProjectHealthChecker,
    store: Arc<MetricsStore>,
    reporter: Arc<Reporter>,
    phase: RwLock<MonitorPhase>,
    rounds: AtomicU64,
}

impl UptimeMonitor {
    /// Create a monitor probing over HTTP
    pub fn new(config: MonitorConfig) -> Result<Self> {
        let prober = HttpProber::new(config.request_timeout)?;
        Self::with_prober(config, Arc::new(prober))
    }

    /// Create a monitor with a custom prober
    pub fn with_prober(config: MonitorConfig, prober: Arc<dyn Probe>) -> Result<Self> {
        config.ensure_valid()?;

        let store = Arc::new(MetricsStore::new(&config.projects, config.history_capacity));
        let reporter = Arc::new(Reporter::from_config(&config));

        Ok(Self {
            checker: ProjectHealthChecker::new(prober),
            store,
            reporter,
            phase: RwLock::new(MonitorPhase::Idle),
            rounds: AtomicU64::new(0),
            config,
        })
    }

    pub fn store(&self) -> &Arc<MetricsStore> {
        &self.store
    }

    pub fn reporter(&self) -> &Arc<Reporter> {
        &self.reporter
    }

    pub async fn phase(&self) -> MonitorPhase {
        *self.phase.read().await
    }

    pub fn rounds_completed(&self) -> u64 {
        self.rounds.load(Ordering::SeqCst)
    }

    async fn set_phase(&self, phase: MonitorPhase) {
        let mut current = self.phase.write().await;
        // A round finishing after an interrupt must not pull the monitor back into the cycle.
        if current.is_stopping() && !phase.is_stopping() {
            return;
        }
        *current = phase;
        debug!("Monitor phase: {:?}", phase);
    }

    /// Run one complete round: probe, aggregate, log
    pub async fn run_round(&self) -> Vec<ProjectHealthSnapshot> {
        let snapshots = self.probe_all(Uuid::new_v4()).await;
        self.record_round(&snapshots).await;
        snapshots
    }

    /// Check every project concurrently and wait for all of them
    #[instrument(skip(self))]
    pub async fn probe_all(&self, round_id: Uuid) -> Vec<ProjectHealthSnapshot> {
        self.set_phase(MonitorPhase::Probing).await;

        let checks = self
            .config
            .projects
            .iter()
            .map(|project| self.checker.check(project, round_id));

        join_all(checks).await
    }

    /// Fold a round's snapshots into the store and report them
    pub async fn record_round(&self, snapshots: &[ProjectHealthSnapshot]) -> Vec<ProjectSummary> {
        self.set_phase(MonitorPhase::Aggregating).await;

        let mut recorded = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            match self.store.record(snapshot).await {
                Ok(summary) => recorded.push((snapshot, summary)),
                Err(e) => error!("Failed to record round for {}: {}", snapshot.project_key, e),
            }
        }

        self.set_phase(MonitorPhase::Logging).await;

        for (snapshot, summary) in &recorded {
            self.reporter.log_round(snapshot, summary);

            if let Err(e) = self.reporter.append_snapshot(snapshot).await {
                error!("Failed to append health check log: {}", e);
            }
        }

        let summaries: Vec<ProjectSummary> =
            recorded.into_iter().map(|(_, summary)| summary).collect();

        let threshold = self.config.alert_threshold_percent;
        for summary in below_alert_threshold(&summaries, threshold) {
            warn!(
                "Uptime for {} is {:.2}%, below alert threshold of {:.2}%",
                summary.key, summary.uptime_percent, threshold
            );
        }

        let rounds = self.rounds.fetch_add(1, Ordering::SeqCst) + 1;
        if dashboard_due(rounds, self.config.dashboard_every_rounds) {
            println!("{}", self.dashboard().await);
        }

        self.set_phase(MonitorPhase::Idle).await;

        summaries
    }

    /// Current dashboard text
    pub async fn dashboard(&self) -> String {
        render_dashboard(&self.store.summaries().await, self.store.runtime())
    }

    /// Start the ticking round task; the first round runs immediately
    pub fn spawn(self: &Arc<Self>) -> MonitorHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let monitor = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut ticker = interval(monitor.config.check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }

                let round_id = Uuid::new_v4();
                let snapshots = tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        info!("Round {} interrupted while probing", round_id);
                        break;
                    }
                    snapshots = monitor.probe_all(round_id) => snapshots,
                };

                monitor.record_round(&snapshots).await;
            }

            monitor.set_phase(MonitorPhase::Idle).await;
            debug!("Round task stopped");
        });

        MonitorHandle { shutdown_tx, task }
    }

    /// Run until Ctrl-C, then shut down cleanly
    pub async fn start(self: Arc<Self>) -> Result<()> {
        info!(
            "Starting uptime monitor for {} projects, interval {}ms, timeout {}ms",
            self.config.projects.len(),
            self.config.check_interval.as_millis(),
            self.config.request_timeout.as_millis()
        );

        let handle = self.spawn();

        tokio::signal::ctrl_c().await.map_err(|e| {
            MonitorError::Other(format!("Failed to wait for shutdown signal: {}", e))
        })?;

        info!("Interrupt received, stopping uptime monitor");
        self.interrupt(handle).await?;
        Ok(())
    }

    /// Stop the round task and run the shutdown sequence
    pub async fn interrupt(&self, handle: MonitorHandle) -> Result<MetricsExport> {
        self.set_phase(MonitorPhase::Interrupted).await;
        handle.stop().await?;
        Ok(self.shutdown().await)
    }

    /// Print the final dashboard and write the metrics export.
    /// A failed export write is logged; shutdown still completes.
    pub async fn shutdown(&self) -> MetricsExport {
        self.set_phase(MonitorPhase::ShuttingDown).await;

        let summaries = self.store.summaries().await;
        println!("{}", render_dashboard(&summaries, self.store.runtime()));

        let export = MetricsExport::new(&summaries, Utc::now());
        if let Err(e) = self.reporter.write_export(&export).await {
            error!(
                "Failed to write metrics export to {}: {}",
                self.reporter.export_path().display(),
                e
            );
        }

        self.set_phase(MonitorPhase::Terminated).await;
        info!("Uptime monitor shutdown complete");
        export
    }
}

impl MonitorPhase {
    fn is_stopping(&self) -> bool {
        matches!(
            self,
            MonitorPhase::Interrupted | MonitorPhase::ShuttingDown | MonitorPhase::Terminated
        )
    }
}

/// Projects whose uptime has fallen below the alert threshold
pub fn below_alert_threshold(summaries: &[ProjectSummary], threshold: f64) -> Vec<&ProjectSummary> {
    summaries
        .iter()
        .filter(|s| s.uptime_percent < threshold)
        .collect()
}

/// Whether the periodic dashboard is printed after this round; 0 disables it
pub fn dashboard_due(rounds: u64, every: u64) -> bool {
    every > 0 && rounds % every == 0
}

/// Handle owning the round task and its shutdown signal
#[derive(Debug)]
pub struct MonitorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Signal the round task and wait for it to finish
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        self.task
            .await
            .map_err(|e| MonitorError::Other(format!("Round task failed: {}", e)))
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use crate::probe::ProbeResult;
    use crate::probe::stub::StaticProbe;
    use std::time::Duration;

    fn config(dir: &std::path::Path) -> MonitorConfig {
        MonitorConfig {
            projects: vec![
                ProjectConfig::new("main", "Main", "http://main.test", 1, vec!["/".into(), "/health".into()]),
                ProjectConfig::new("docs", "Docs", "http://docs.test", 2, vec!["/about".into()]),
            ],
            check_interval: Duration::from_millis(50),
            log_dir: dir.to_path_buf(),
            dashboard_every_rounds: 0,
            ..MonitorConfig::default()
        }
    }

    fn prober() -> Arc<StaticProbe> {
        Arc::new(
            StaticProbe::default()
                .route("/", ProbeResult::from_status(200, 50))
                .route("/health", ProbeResult::from_status(503, 80))
                .route("/about", ProbeResult::from_status(200, 20)),
        )
    }

    #[tokio::test]
    async fn test_round_updates_metrics_and_log() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = UptimeMonitor::with_prober(config(dir.path()), prober()).unwrap();

        let snapshots = monitor.run_round().await;
        assert_eq!(snapshots.len(), 2);

        let main = monitor.store().summary("main").await.unwrap();
        assert_eq!(main.total_checks, 1);
        assert_eq!(main.uptime_percent, 0.0);
        assert_eq!(main.avg_response_time, 65.0);
        assert_eq!(main.error_count, 1);

        let docs = monitor.store().summary("docs").await.unwrap();
        assert_eq!(docs.uptime_percent, 100.0);

        let log = std::fs::read_to_string(monitor.reporter().health_log_path()).unwrap();
        assert_eq!(log.lines().count(), 2);
        assert_eq!(monitor.rounds_completed(), 1);
        assert_eq!(monitor.phase().await, MonitorPhase::Idle);
    }

    #[tokio::test]
    async fn test_spawned_loop_runs_immediately_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = Arc::new(UptimeMonitor::with_prober(config(dir.path()), prober()).unwrap());

        let handle = monitor.spawn();
        tokio::time::sleep(Duration::from_millis(130)).await;
        handle.stop().await.unwrap();

        let rounds = monitor.rounds_completed();
        assert!(rounds >= 2, "expected at least two rounds, got {}", rounds);
        let docs = monitor.store().summary("docs").await.unwrap();
        assert_eq!(docs.total_checks, rounds);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(monitor.rounds_completed(), rounds);
    }

    #[tokio::test]
    async fn test_shutdown_writes_export() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = UptimeMonitor::with_prober(config(dir.path()), prober()).unwrap();
        monitor.run_round().await;

        let export = monitor.shutdown().await;
        assert_eq!(monitor.phase().await, MonitorPhase::Terminated);
        assert_eq!(export.projects["main"].total_checks, 1);
        assert_eq!(export.projects["main"].avg_response_time, 65);

        let written: MetricsExport =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("metrics-export.json")).unwrap()).unwrap();
        assert_eq!(written.projects, export.projects);
    }

    #[tokio::test]
    async fn test_export_failure_still_terminates() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the log directory should be makes every write fail.
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let monitor = UptimeMonitor::with_prober(config(&blocker), prober()).unwrap();
        monitor.run_round().await;

        let export = monitor.shutdown().await;

        assert_eq!(monitor.phase().await, MonitorPhase::Terminated);
        assert_eq!(export.projects["main"].total_checks, 1);
        assert!(std::fs::metadata(&blocker).unwrap().is_file());
    }

    #[tokio::test]
    async fn test_interrupt_runs_shutdown_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = Arc::new(UptimeMonitor::with_prober(config(dir.path()), prober()).unwrap());

        let handle = monitor.spawn();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let export = monitor.interrupt(handle).await.unwrap();

        assert_eq!(monitor.phase().await, MonitorPhase::Terminated);
        assert_eq!(export.projects["docs"].total_checks, monitor.rounds_completed());
        assert!(dir.path().join("metrics-export.json").exists());

        // Round phases cannot pull a stopped monitor back into the cycle.
        monitor.run_round().await;
        assert_eq!(monitor.phase().await, MonitorPhase::Terminated);
    }

    #[test]
    fn test_alert_threshold_selects_low_uptime_projects() {
        let summary = |key: &str, uptime: f64| ProjectSummary {
            key: key.to_string(),
            name: key.to_string(),
            url: format!("http://{}.test", key),
            priority: 1,
            uptime_percent: uptime,
            total_checks: 4,
            avg_response_time: 10.0,
            error_count: 0,
            last_check: None,
        };
        let summaries = vec![summary("ok", 100.0), summary("edge", 95.0), summary("low", 94.99)];

        let below: Vec<&str> = below_alert_threshold(&summaries, 95.0)
            .iter()
            .map(|s| s.key.as_str())
            .collect();
        assert_eq!(below, vec!["low"]);
        assert!(below_alert_threshold(&summaries, 0.0).is_empty());
    }

    #[test]
    fn test_dashboard_cadence() {
        assert!(dashboard_due(10, 10));
        assert!(dashboard_due(20, 10));
        assert!(!dashboard_due(9, 10));
        assert!(!dashboard_due(10, 0));
        assert!(dashboard_due(1, 1));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.projects.clear();
        assert!(matches!(
            UptimeMonitor::with_prober(config, prober()),
            Err(MonitorError::Config(_))
        ));
    }
}
