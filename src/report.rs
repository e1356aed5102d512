//! Round logging, NDJSON snapshot log, dashboard and metrics export

use crate::config::MonitorConfig;
use crate::errors::Result;
use crate::health::ProjectHealthSnapshot;
use crate::metrics::ProjectSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Per-project entry of the metrics export
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectExport {
    pub name: String,
    pub url: String,
    pub priority: u32,
    pub uptime_percent: f64,
    pub total_checks: u64,
    pub avg_response_time: u64,
    pub error_count: usize,
    pub last_check: Option<DateTime<Utc>>,
}

/// Document written to `metrics-export.json`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsExport {
    pub exported_at: DateTime<Utc>,
    pub projects: BTreeMap<String, ProjectExport>,
}

impl MetricsExport {
    pub fn new(summaries: &[ProjectSummary], exported_at: DateTime<Utc>) -> Self {
        let projects = summaries
            .iter()
            .map(|s| {
                (
                    s.key.clone(),
                    ProjectExport {
                        name: s.name.clone(),
                        url: s.url.clone(),
                        priority: s.priority,
                        uptime_percent: s.uptime_percent,
                        total_checks: s.total_checks,
                        avg_response_time: s.avg_response_time.round() as u64,
                        error_count: s.error_count,
                        last_check: s.last_check,
                    },
                )
            })
            .collect();

        Self {
            exported_at,
            projects,
        }
    }
}

/// Writes everything the monitor reports
#[derive(Debug)]
pub struct Reporter {
    health_log: PathBuf,
    export_path: PathBuf,
    write_lock: Mutex<()>,
}

impl Reporter {
    pub fn new(health_log: impl Into<PathBuf>, export_path: impl Into<PathBuf>) -> Self {
        Self {
            health_log: health_log.into(),
            export_path: export_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.health_log_path(), config.export_path())
    }

    pub fn health_log_path(&self) -> &Path {
        &self.health_log
    }

    pub fn export_path(&self) -> &Path {
        &self.export_path
    }

    /// Emit the human-readable line for one project's round
    pub fn log_round(&self, snapshot: &ProjectHealthSnapshot, summary: &ProjectSummary) {
        let line = format_round_line(snapshot, summary);
        if snapshot.overall_health {
            info!("{}", line);
        } else {
            warn!("{}", line);
        }
    }

    /// Append one snapshot as a single JSON line
    pub async fn append_snapshot(&self, snapshot: &ProjectHealthSnapshot) -> Result<()> {
        let mut line = serde_json::to_string(snapshot)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        ensure_parent(&self.health_log).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.health_log)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!("Appended snapshot for {} to {}", snapshot.project_key, self.health_log.display());
        Ok(())
    }

    /// Overwrite the export file with the given metrics
    pub async fn write_export(&self, export: &MetricsExport) -> Result<()> {
        let json = serde_json::to_string_pretty(export)?;

        ensure_parent(&self.export_path).await?;
        fs::write(&self.export_path, json).await?;

        info!("Metrics exported to {}", self.export_path.display());
        Ok(())
    }
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

pub fn format_round_line(snapshot: &ProjectHealthSnapshot, summary: &ProjectSummary) -> String {
    let marker = if snapshot.overall_health { "UP" } else { "DOWN" };

    let mut line = format!(
        "[{}] P{} {} ({}) avg={:.0}ms uptime={:.2}%",
        marker,
        summary.priority,
        summary.name,
        summary.url,
        snapshot.avg_response_time_ms,
        summary.uptime_percent
    );

    let failed = snapshot.failed_results();
    if !failed.is_empty() {
        let paths: Vec<String> = failed
            .iter()
            .map(|f| match &f.result.error_message {
                Some(message) => format!("{} ({}: {})", f.path, f.result.status, message),
                None => format!("{} ({})", f.path, f.result.status),
            })
            .collect();
        let _ = write!(line, " failed=[{}]", paths.join(", "));
    }

    line
}

/// Multi-line dashboard, one block per project in the given order
pub fn render_dashboard(summaries: &[ProjectSummary], runtime: Duration) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "==================== UPTIME DASHBOARD ====================");
    let _ = writeln!(out, "Runtime: {}", format_runtime(runtime));

    for s in summaries {
        let _ = writeln!(out);
        let _ = writeln!(out, "{} [P{}]", s.name, s.priority);
        let _ = writeln!(out, "  URL:           {}", s.url);
        let _ = writeln!(out, "  Uptime:        {:.2}% ({} checks)", s.uptime_percent, s.total_checks);
        let _ = writeln!(out, "  Avg response:  {:.0}ms", s.avg_response_time);
        let _ = writeln!(out, "  Errors:        {}", s.error_count);
    }

    let _ = writeln!(out, "==========================================================");
    out
}

pub fn format_runtime(runtime: Duration) -> String {
    let secs = runtime.as_secs();
    format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}
