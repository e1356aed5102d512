//! Validate a deployment of the site against expected status codes

use clap::Parser;
use site_uptime_monitor::validator::{DeploymentValidator, default_expectations};
use site_uptime_monitor::{HttpProber, Result, logging};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "validate-deployment", version)]
struct Args {
    /// Base URL of the deployment to validate
    #[arg(default_value = "http://localhost:3000")]
    base_url: String,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "MONITOR_TIMEOUT_MS", default_value_t = 10_000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::initialize_tracing();
    let args = Args::parse();

    info!("Validating deployment at {}", args.base_url);

    let prober = HttpProber::new(Duration::from_millis(args.timeout_ms))?;
    let validator = DeploymentValidator::new(Arc::new(prober), default_expectations());
    let report = validator.validate(&args.base_url).await;

    println!("{}", report.render());

    if !report.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
