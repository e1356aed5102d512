//! Per-project health checks and the snapshots they produce

use crate::config::ProjectConfig;
use crate::probe::{Probe, ProbeResult};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// One probed path and what came back
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    pub path: String,
    #[serde(flatten)]
    pub result: ProbeResult,
}

/// Result of one project's round
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectHealthSnapshot {
    pub project_key: String,
    pub round_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub results: Vec<PathResult>,
    pub overall_health: bool,
    pub avg_response_time_ms: f64,
}

impl ProjectHealthSnapshot {
    /// Fold ordered path results into a snapshot
    pub fn from_results(
        project_key: String,
        round_id: Uuid,
        timestamp: DateTime<Utc>,
        results: Vec<PathResult>,
    ) -> Self {
        let overall_health = results.iter().all(|r| r.result.success);

        let avg_response_time_ms = if results.is_empty() {
            0.0
        } else {
            let total: u64 = results.iter().map(|r| r.result.latency_ms).sum();
            total as f64 / results.len() as f64
        };

        Self {
            project_key,
            round_id,
            timestamp,
            results,
            overall_health,
            avg_response_time_ms,
        }
    }

    pub fn failed_results(&self) -> Vec<PathResult> {
        self.results
            .iter()
            .filter(|r| !r.result.success)
            .cloned()
            .collect()
    }
}

/// Runs every configured path of a project through a prober
#[derive(Clone)]
pub struct ProjectHealthChecker {
    prober: Arc<dyn Probe>,
}

impl ProjectHealthChecker {
    pub fn new(prober: Arc<dyn Probe>) -> Self {
        Self { prober }
    }

    /// Probe all paths concurrently; results keep the configured order
    #[instrument(skip(self, project), fields(project = %project.key))]
    pub async fn check(&self, project: &ProjectConfig, round_id: Uuid) -> ProjectHealthSnapshot {
        let timestamp = Utc::now();

        let probes = project.health_check_paths.iter().map(|path| {
            let url = project.url_for(path);
            let prober = Arc::clone(&self.prober);
            async move {
                PathResult {
                    path: path.clone(),
                    result: prober.probe(&url).await,
                }
            }
        });

        let results = join_all(probes).await;

        let snapshot =
            ProjectHealthSnapshot::from_results(project.key.clone(), round_id, timestamp, results);

        debug!(
            "Checked {} paths for {}: healthy={}, avg={:.1}ms",
            snapshot.results.len(),
            project.key,
            snapshot.overall_health,
            snapshot.avg_response_time_ms
        );

        snapshot
    }
}
