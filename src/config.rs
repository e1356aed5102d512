//! Configuration management for the uptime monitor

use crate::errors::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Capacity of each project's rolling response-time window
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// A deployed site monitored as one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Unique short identifier
    pub key: String,

    /// Display name
    pub name: String,

    /// Absolute URL without trailing slash
    pub base_url: String,

    /// Lower is more important, used for display ordering only
    pub priority: u32,

    /// Paths probed each round, in order
    pub health_check_paths: Vec<String>,
}

impl ProjectConfig {
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
        priority: u32,
        health_check_paths: Vec<String>,
    ) -> Self {
        let mut project = Self {
            key: key.into(),
            name: name.into(),
            base_url: base_url.into(),
            priority,
            health_check_paths,
        };
        project.normalize();
        project
    }

    /// Full URL for one of this project's paths
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn normalize(&mut self) {
        while self.base_url.ends_with('/') {
            self.base_url.pop();
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Projects probed every round
    pub projects: Vec<ProjectConfig>,

    /// Delay between the start of two rounds
    pub check_interval: Duration,

    /// Per-probe timeout
    pub request_timeout: Duration,

    /// Directory receiving the health-check log and the metrics export
    pub log_dir: PathBuf,

    /// Number of round averages kept per project
    pub history_capacity: usize,

    /// Print the dashboard every N rounds, 0 disables
    pub dashboard_every_rounds: u64,

    /// Uptime percentage below which a warning is logged
    pub alert_threshold_percent: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            projects: default_projects(),
            check_interval: Duration::from_millis(30_000),
            request_timeout: Duration::from_millis(10_000),
            log_dir: PathBuf::from("monitoring-logs"),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            dashboard_every_rounds: 10,
            alert_threshold_percent: 95.0,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = MonitorConfig::default();

        if let Ok(interval) = env::var("MONITOR_INTERVAL_MS") {
            if let Ok(ms) = interval.parse::<u64>() {
                config.check_interval = Duration::from_millis(ms);
            }
        }

        if let Ok(timeout) = env::var("MONITOR_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse::<u64>() {
                config.request_timeout = Duration::from_millis(ms);
            }
        }

        if let Ok(log_dir) = env::var("MONITOR_LOG_DIR") {
            config.log_dir = PathBuf::from(log_dir);
        }

        if let Ok(capacity) = env::var("MONITOR_HISTORY_CAPACITY") {
            if let Ok(size) = capacity.parse() {
                config.history_capacity = size;
            }
        }

        if let Ok(every) = env::var("MONITOR_DASHBOARD_EVERY") {
            if let Ok(rounds) = every.parse() {
                config.dashboard_every_rounds = rounds;
            }
        }

        if let Ok(threshold) = env::var("MONITOR_ALERT_THRESHOLD") {
            if let Ok(percent) = threshold.parse() {
                config.alert_threshold_percent = percent;
            }
        }

        config
    }

    /// Replace the built-in project list with one read from a JSON file
    pub fn with_projects_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut projects: Vec<ProjectConfig> = serde_json::from_str(&raw)?;
        for project in &mut projects {
            project.normalize();
        }
        self.projects = projects;
        Ok(self)
    }

    pub fn health_log_path(&self) -> PathBuf {
        self.log_dir.join("health-checks.log")
    }

    pub fn export_path(&self) -> PathBuf {
        self.log_dir.join("metrics-export.json")
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.projects.is_empty() {
            return Err("at least one project must be configured".to_string());
        }

        let mut keys = HashSet::new();
        for project in &self.projects {
            if project.key.is_empty() {
                return Err("project key cannot be empty".to_string());
            }

            if !keys.insert(project.key.as_str()) {
                return Err(format!("duplicate project key: {}", project.key));
            }

            if !project.base_url.starts_with("http://") && !project.base_url.starts_with("https://") {
                return Err(format!(
                    "project {} base_url must be an absolute http(s) URL",
                    project.key
                ));
            }

            if project.health_check_paths.is_empty() {
                return Err(format!("project {} has no health check paths", project.key));
            }

            if let Some(path) = project.health_check_paths.iter().find(|p| !p.starts_with('/')) {
                return Err(format!(
                    "project {} path {:?} must start with '/'",
                    project.key, path
                ));
            }
        }

        if self.check_interval.is_zero() {
            return Err("check_interval must be greater than 0".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("request_timeout must be greater than 0".to_string());
        }

        if self.history_capacity == 0 {
            return Err("history_capacity must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Validate, converting failures into the crate error type
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate().map_err(MonitorError::Config)
    }
}

/// Built-in project list: the production and staging dealership sites
pub fn default_projects() -> Vec<ProjectConfig> {
    let site_paths = ["/", "/inventory", "/about", "/services", "/contact"];

    vec![
        ProjectConfig::new(
            "production",
            "Dealership Website (Production)",
            "https://www.premier-auto-sales.com",
            1,
            site_paths.iter().map(|p| p.to_string()).collect(),
        ),
        ProjectConfig::new(
            "staging",
            "Dealership Website (Staging)",
            "https://staging.premier-auto-sales.com",
            2,
            vec!["/".to_string(), "/inventory".to_string(), "/api/health".to_string()],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.check_interval, Duration::from_millis(30_000));
        assert_eq!(config.request_timeout, Duration::from_millis(10_000));
        assert_eq!(config.history_capacity, 100);
        assert_eq!(config.health_log_path(), PathBuf::from("monitoring-logs/health-checks.log"));
        assert_eq!(config.export_path(), PathBuf::from("monitoring-logs/metrics-export.json"));
    }

    #[test]
    fn test_trailing_slash_is_stripped() {
        let project = ProjectConfig::new("p", "P", "https://example.com//", 1, vec!["/".into()]);
        assert_eq!(project.base_url, "https://example.com");
        assert_eq!(project.url_for("/about"), "https://example.com/about");
    }

    #[test]
    fn test_validation_rejects_bad_projects() {
        let mut config = MonitorConfig::default();
        config.projects.push(config.projects[0].clone());
        assert!(config.validate().unwrap_err().contains("duplicate"));

        let mut config = MonitorConfig::default();
        config.projects[0].health_check_paths.clear();
        assert!(config.validate().unwrap_err().contains("no health check paths"));

        let mut config = MonitorConfig::default();
        config.projects[0].base_url = "www.example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.projects.clear();
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.history_capacity = 0;
        assert!(matches!(config.ensure_valid(), Err(MonitorError::Config(_))));
    }

    #[test]
    fn test_projects_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"key":"shop","name":"Shop","baseUrl":"http://localhost:3000/","priority":3,"healthCheckPaths":["/","/health"]}}]"#
        )
        .unwrap();

        let config = MonitorConfig::default().with_projects_file(file.path()).unwrap();
        assert_eq!(config.projects.len(), 1);
        assert_eq!(config.projects[0].base_url, "http://localhost:3000");
        assert_eq!(config.projects[0].health_check_paths, vec!["/", "/health"]);
        assert!(config.validate().is_ok());
    }
}
