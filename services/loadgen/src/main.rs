use anyhow::Result;
use common::config::RunConfig;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting expense and payment load generator");

    let config = RunConfig::from_env()?;
    let report = loadgen::harness::run(&config).await?;

    if !report.passed() {
        for failure in report.thresholds.failures() {
            error!("Threshold crossed: {}", failure.threshold);
        }
        anyhow::bail!("{} thresholds crossed", report.thresholds.failures().count());
    }

    info!("All thresholds passed");
    Ok(())
}
