//! Shared watch loop for `train` and `resume`.

use anyhow::{Context, Result};
use colored::Colorize;
use jobwatch::{JobMonitor, MonitorConfig, RegistryEntry, TerminalResult};
use tokio::sync::mpsc;

use crate::display;

/// What to do once the monitor is wired up.
pub enum Begin<'a> {
    /// Launch a new job for this key.
    Start(&'a str),
    /// Pick up the job left in the registry.
    Resume,
}

/// Subscribes to a fresh monitor, begins tracking and blocks until the job
/// ends or the user presses Ctrl-C.
pub async fn run(config: &MonitorConfig, begin: Begin<'_>) -> Result<()> {
    let monitor = JobMonitor::from_config(config).context("Failed to create monitor")?;

    let bar = display::progress_bar()?;
    let progress_bar = bar.clone();
    monitor.on_progress(move |update| display::render(&progress_bar, update));

    let (tx, mut rx) = mpsc::unbounded_channel::<(RegistryEntry, TerminalResult)>();
    monitor.on_terminal(move |entry, result| {
        let _ = tx.send((entry.clone(), result.clone()));
    });

    let begun = match begin {
        Begin::Start(job_key) => monitor.start(job_key).await.map(Some).map_err(anyhow::Error::from),
        Begin::Resume => monitor.init().await.map_err(anyhow::Error::from),
    };
    let entry = match begun {
        Ok(Some(entry)) => entry,
        Ok(None) => {
            bar.finish_and_clear();
            println!("{}", "No job to resume".yellow());
            return Ok(());
        },
        Err(e) => {
            bar.finish_and_clear();
            return Err(e);
        },
    };

    bar.println(format!(
        "{} Watching {} ({})",
        "→".bright_cyan().bold(),
        entry.job_key.bold(),
        entry.task_handle.dimmed()
    ));
    bar.set_prefix(entry.job_key.clone());
    if let Some(snapshot) = monitor.snapshot() {
        display::render(&bar, &snapshot);
    }

    tokio::select! {
        event = rx.recv() => {
            bar.finish_and_clear();
            match event {
                Some((entry, result)) => display::report(&entry, &result),
                None => anyhow::bail!("Monitor stopped without a result"),
            }
        }
        signal = tokio::signal::ctrl_c() => {
            bar.abandon();
            signal.context("Failed to listen for Ctrl-C")?;
            match monitor.detach() {
                Some(entry) => {
                    println!(
                        "\n{} Stopped watching {}; run {} to continue",
                        "■".yellow(),
                        entry.job_key,
                        "jobwatch resume".bright_cyan()
                    );
                    Ok(())
                },
                // The job ended as Ctrl-C arrived; its result is on the way.
                None => match rx.recv().await {
                    Some((entry, result)) => display::report(&entry, &result),
                    None => Ok(()),
                },
            }
        }
    }
}
