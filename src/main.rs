//! Site Uptime Monitor Binary

use clap::Parser;
use site_uptime_monitor::{MonitorConfig, Result, UptimeMonitor, logging};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Poll the configured sites forever; Ctrl-C prints a dashboard and exports metrics
#[derive(Debug, Parser)]
#[command(name = "uptime-monitor", version)]
struct Args {
    /// Milliseconds between rounds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Directory for health-checks.log and metrics-export.json
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// JSON file with the list of projects to monitor
    #[arg(long, env = "MONITOR_PROJECTS_FILE")]
    projects_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::initialize_tracing();

    info!("Starting site uptime monitor v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = match load_config(args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    for project in &config.projects {
        info!(
            "Monitoring {} [P{}] at {} ({} paths)",
            project.name,
            project.priority,
            project.base_url,
            project.health_check_paths.len()
        );
    }

    let monitor = Arc::new(UptimeMonitor::new(config)?);

    if let Err(e) = monitor.start().await {
        error!("Uptime monitor failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn load_config(args: Args) -> Result<MonitorConfig> {
    let mut config = MonitorConfig::from_env();

    if let Some(path) = args.projects_file {
        config = config.with_projects_file(path)?;
    }

    if let Some(ms) = args.interval_ms {
        config.check_interval = Duration::from_millis(ms);
    }

    if let Some(ms) = args.timeout_ms {
        config.request_timeout = Duration::from_millis(ms);
    }

    if let Some(dir) = args.log_dir {
        config.log_dir = dir;
    }

    Ok(config)
}
