//! One-shot status query for the registered job.

use anyhow::{Context, Result};
use colored::Colorize;
use jobwatch::{HttpJobService, Job, JobService, MonitorConfig, Observation, TaskRegistry};

use crate::display;

pub async fn execute(config: &MonitorConfig) -> Result<()> {
    let registry = config.file_registry();
    let Some(entry) = registry.load().await.context("Failed to read task registry")? else {
        println!("{}", "No job registered".yellow());
        return Ok(());
    };

    println!("{} {}", "Job:".bold(), entry.job_key);
    println!("{} {}", "Task:".bold(), entry.task_handle);
    if let Some(at) = entry.registered_at {
        println!("{} {}", "Registered:".bold(), at.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    let service = HttpJobService::from_config(config)?;
    let response = service
        .status(&entry.task_handle)
        .await
        .context("Failed to query job status")?;

    let mut job = Job::new(entry.task_handle.clone(), entry.job_key.clone());
    match job.observe(&response)? {
        Observation::Progress(update) => {
            println!(
                "{} {} {}%",
                "Status:".bold(),
                update.status.to_string().bright_cyan(),
                update.progress_percent
            );
            if let Some(message) = update.message {
                println!("  {message}");
            }
            Ok(())
        },
        Observation::Terminal(result) => {
            println!("{} {}", "Status:".bold(), result.status());
            display::report(&entry, &result)
        },
        Observation::Unrecognized => {
            println!("{} {}", "Status:".bold(), "unrecognized".yellow());
            Ok(())
        },
    }
}
