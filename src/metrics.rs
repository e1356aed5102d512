//! Rolling per-project uptime and latency metrics

use crate::config::ProjectConfig;
use crate::errors::{MonitorError, Result};
use crate::health::{PathResult, ProjectHealthSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// An unhealthy round kept for diagnostics
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub failed_results: Vec<PathResult>,
}

/// Counters and history for one project
#[derive(Debug)]
pub struct MetricsState {
    up_count: u64,
    down_count: u64,
    response_times: VecDeque<f64>,
    capacity: usize,
    errors: Vec<ErrorRecord>,
    last_check: Option<DateTime<Utc>>,
}

impl MetricsState {
    pub fn new(capacity: usize) -> Self {
        Self {
            up_count: 0,
            down_count: 0,
            response_times: VecDeque::with_capacity(capacity),
            capacity,
            errors: Vec::new(),
            last_check: None,
        }
    }

    /// Fold one round into the counters
    pub fn record(&mut self, snapshot: &ProjectHealthSnapshot) {
        if snapshot.overall_health {
            self.up_count += 1;
        } else {
            self.down_count += 1;
        }

        self.response_times.push_back(snapshot.avg_response_time_ms);
        while self.response_times.len() > self.capacity {
            self.response_times.pop_front();
        }

        if !snapshot.overall_health {
            self.errors.push(ErrorRecord {
                timestamp: snapshot.timestamp,
                failed_results: snapshot.failed_results(),
            });
        }

        self.last_check = Some(snapshot.timestamp);
    }

    pub fn up_count(&self) -> u64 {
        self.up_count
    }

    pub fn down_count(&self) -> u64 {
        self.down_count
    }

    pub fn total_checks(&self) -> u64 {
        self.up_count + self.down_count
    }

    /// Healthy rounds over all rounds, two decimals; 100 before the first round
    pub fn uptime_percent(&self) -> f64 {
        let total = self.total_checks();
        if total == 0 {
            return 100.0;
        }
        round2(self.up_count as f64 / total as f64 * 100.0)
    }

    /// Mean of the rolling response-time window
    pub fn avg_response_time(&self) -> f64 {
        if self.response_times.is_empty() {
            return 0.0;
        }
        self.response_times.iter().sum::<f64>() / self.response_times.len() as f64
    }

    pub fn response_times(&self) -> impl Iterator<Item = f64> + '_ {
        self.response_times.iter().copied()
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        self.last_check
    }
}

/// Immutable view of a project's metrics for reporting
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSummary {
    pub key: String,
    pub name: String,
    pub url: String,
    pub priority: u32,
    pub uptime_percent: f64,
    pub total_checks: u64,
    pub avg_response_time: f64,
    pub error_count: usize,
    pub last_check: Option<DateTime<Utc>>,
}

/// Process-wide metrics, one independently locked state per project
#[derive(Debug)]
pub struct MetricsStore {
    projects: HashMap<String, (ProjectConfig, Arc<RwLock<MetricsState>>)>,
    started_at: Instant,
}

impl MetricsStore {
    pub fn new(projects: &[ProjectConfig], capacity: usize) -> Self {
        let projects = projects
            .iter()
            .map(|p| {
                (
                    p.key.clone(),
                    (p.clone(), Arc::new(RwLock::new(MetricsState::new(capacity)))),
                )
            })
            .collect();

        Self {
            projects,
            started_at: Instant::now(),
        }
    }

    /// Apply a snapshot to its project's state and return the updated summary
    pub async fn record(&self, snapshot: &ProjectHealthSnapshot) -> Result<ProjectSummary> {
        let (project, state) = self
            .projects
            .get(&snapshot.project_key)
            .ok_or_else(|| MonitorError::UnknownProject(snapshot.project_key.clone()))?;

        let mut state = state.write().await;
        state.record(snapshot);

        debug!(
            "Recorded round for {}: {} up / {} down",
            project.key, state.up_count, state.down_count
        );

        Ok(summarize(project, &state))
    }

    pub async fn summary(&self, key: &str) -> Option<ProjectSummary> {
        let (project, state) = self.projects.get(key)?;
        let state = state.read().await;
        Some(summarize(project, &state))
    }

    /// Summaries of every project, most important first
    pub async fn summaries(&self) -> Vec<ProjectSummary> {
        let mut summaries = Vec::with_capacity(self.projects.len());
        for (project, state) in self.projects.values() {
            let state = state.read().await;
            summaries.push(summarize(project, &state));
        }
        summaries.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.key.cmp(&b.key)));
        summaries
    }

    /// Shared handle on one project's raw state
    pub fn state(&self, key: &str) -> Option<Arc<RwLock<MetricsState>>> {
        self.projects.get(key).map(|(_, state)| Arc::clone(state))
    }

    pub fn runtime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

fn summarize(project: &ProjectConfig, state: &MetricsState) -> ProjectSummary {
    ProjectSummary {
        key: project.key.clone(),
        name: project.name.clone(),
        url: project.base_url.clone(),
        priority: project.priority,
        uptime_percent: state.uptime_percent(),
        total_checks: state.total_checks(),
        avg_response_time: state.avg_response_time(),
        error_count: state.errors.len(),
        last_check: state.last_check,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
