use anyhow::{Context, Result};
use colored::Colorize;
use jobwatch::{MonitorConfig, RegistryEntry, RegistryError, TaskRegistry};

/// Stops monitoring the registered job by clearing the registry. No status
/// query is made and the job is not aborted on the service.
pub async fn execute(config: &MonitorConfig) -> Result<()> {
    let registry = config.file_registry();
    let Some(entry) = forget(&registry).await? else {
        println!("{}", "No job registered".yellow());
        return Ok(());
    };
    println!(
        "{} Stopped monitoring {} ({})",
        "✓".green(),
        entry.job_key.bold(),
        entry.task_handle
    );
    println!("  The job may still be running on the service");
    Ok(())
}

/// Removes the registered entry. Returns it only if this call removed it; a
/// corrupt record is cleared and reported as nothing registered.
async fn forget(registry: &dyn TaskRegistry) -> Result<Option<RegistryEntry>> {
    let entry = match registry.load().await {
        Ok(entry) => entry,
        Err(RegistryError::Corrupt(reason)) => {
            tracing::warn!(%reason, "Discarding corrupt registry record");
            None
        },
        Err(e) => return Err(e).context("Failed to read task registry"),
    };
    let removed = registry
        .clear()
        .await
        .context("Failed to clear task registry")?;
    Ok(entry.filter(|_| removed))
}
