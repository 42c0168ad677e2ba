use anyhow::{Context, Result};
use colored::Colorize;
use jobwatch::{JobMonitor, MonitorConfig};

use crate::display;

/// Lists trained models.
pub async fn execute(config: &MonitorConfig) -> Result<()> {
    let monitor = JobMonitor::from_config(config).context("Failed to create monitor")?;
    let models = monitor
        .refresh_artifacts()
        .await
        .context("Failed to list trained models")?;

    if models.is_empty() {
        println!("{}", "No trained models".yellow());
        return Ok(());
    }

    println!("{}", format!("{} trained model(s)", models.len()).bright_cyan().bold());
    for model in &models {
        println!(
            "  {:<8} {:>10}  {}",
            model.ticker.bold(),
            display::format_size(model.file_size),
            model.trained_at.as_deref().unwrap_or("-").dimmed()
        );
    }
    Ok(())
}
