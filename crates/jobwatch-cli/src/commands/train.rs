use anyhow::{Context, Result};
use colored::Colorize;
use jobwatch::{JobMonitor, MonitorConfig};

use super::watch::{self, Begin};

/// Starts a job for `ticker`, then watches it unless `detach` is set.
pub async fn execute(config: &MonitorConfig, ticker: &str, detach: bool) -> Result<()> {
    if !detach {
        return watch::run(config, Begin::Start(ticker)).await;
    }

    let monitor = JobMonitor::from_config(config).context("Failed to create monitor")?;
    let entry = monitor.start(ticker).await?;
    monitor.detach();
    println!(
        "{} Started training {} ({})",
        "✓".green(),
        entry.job_key.bold(),
        entry.task_handle
    );
    println!("  Run {} to watch it", "jobwatch resume".bright_cyan());
    Ok(())
}
