//! Site Uptime Monitor Library
//!
//! Polls the public endpoints of a deployed website on an interval, keeps
//! rolling uptime and latency metrics per project, and validates fresh
//! deployments against expected status codes.

pub mod config;
pub mod errors;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod monitor;
pub mod probe;
pub mod report;
pub mod validator;

pub use config::{MonitorConfig, ProjectConfig};
pub use errors::{MonitorError, Result};
pub use health::{PathResult, ProjectHealthChecker, ProjectHealthSnapshot};
pub use metrics::{MetricsState, MetricsStore, ProjectSummary};
pub use monitor::{MonitorHandle, MonitorPhase, UptimeMonitor};
pub use probe::{HttpProber, Probe, ProbeResult, ProbeStatus};
pub use report::{MetricsExport, Reporter};
pub use validator::{DeploymentValidator, EndpointExpectation, ValidationReport};
