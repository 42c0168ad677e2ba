//! Terminal rendering for progress and results.

use std::time::Duration;

use anyhow::{bail, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use jobwatch::{ProgressUpdate, RegistryEntry, TerminalResult};

/// Progress bar showing percent complete and the latest message. The
/// prefix is set once the job key is known.
pub fn progress_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold} [{bar:40.cyan/blue}] {pos:>3}% {wide_msg}")?
            .progress_chars("=> ")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    Ok(bar)
}

/// Applies a progress snapshot to the bar.
pub fn render(bar: &ProgressBar, update: &ProgressUpdate) {
    bar.set_position(u64::from(update.progress_percent));
    let epochs = match (update.current_epoch, update.total_epochs) {
        (Some(current), Some(total)) => format!(" (epoch {current}/{total})"),
        _ => String::new(),
    };
    bar.set_message(format!(
        "{}{}",
        update.message.as_deref().unwrap_or_default(),
        epochs
    ));
}

/// Prints a terminal result. Failures become errors so the exit code is
/// non-zero.
pub fn report(entry: &RegistryEntry, result: &TerminalResult) -> Result<()> {
    let message = result.message().unwrap_or_default();
    match result {
        TerminalResult::Completed(success) => {
            println!("{} {}", "✓".green(), message.green().bold());
            if let Some(path) = &success.model_path {
                println!("  Model: {path}");
            }
            if let Some(summary) = &success.model_summary {
                if let Some(total) = summary.total_params {
                    println!(
                        "  Parameters: {} total, {} trainable (~{:.2} MB)",
                        total,
                        summary.trainable_params.unwrap_or(total),
                        summary.estimated_size_mb()
                    );
                }
            }
            Ok(())
        },
        TerminalResult::Cancelled => {
            println!(
                "{} Stopped monitoring {} ({}); the job may still be running on the service",
                "■".yellow(),
                entry.job_key,
                entry.task_handle
            );
            Ok(())
        },
        TerminalResult::Failed { .. } => bail!("{message}"),
        TerminalResult::ConnectionError { detail, .. } => bail!("{message}: {detail}"),
    }
}

/// Formats a byte count for listings.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let bytes_f = bytes as f64;
    if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.1} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(1_452_032), "1.38 MB");
    }

    #[test]
    fn failures_are_errors() {
        let entry = RegistryEntry::new("t1", "AAPL");
        let failed = TerminalResult::Failed {
            error: "out of memory".to_string(),
        };
        let err = report(&entry, &failed).unwrap_err();
        assert_eq!(err.to_string(), "Training failed: out of memory");
        assert!(report(&entry, &TerminalResult::Cancelled).is_ok());
    }
}
