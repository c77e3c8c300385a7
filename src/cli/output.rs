//! Output formatting for CLI
//!
//! Status lines are dropped under `--quiet`; JSON documents never are.

use std::sync::atomic::{AtomicBool, Ordering};

use console::style;
use serde::Serialize;

static QUIET: AtomicBool = AtomicBool::new(false);

/// Silence status output for the rest of the process
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

fn quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// Print a status line unless `--quiet`
pub fn line(message: &str) {
    if !quiet() {
        println!("{}", message);
    }
}

/// Print a success message
pub fn success(message: &str) {
    line(&format!("{} {}", style("✓").green().bold(), message));
}

/// Print an info message
pub fn info(message: &str) {
    line(&format!("{} {}", style("ℹ").blue().bold(), message));
}

/// Print a warning message
pub fn warning(message: &str) {
    line(&format!("{} {}", style("⚠").yellow().bold(), message));
}

/// Print JSON output
pub fn json<T: Serialize>(data: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Print a divider line
pub fn divider() {
    line(&style("─".repeat(60)).dim().to_string());
}

/// Format a package name with version
pub fn package_version(name: &str, version: &str) -> String {
    format!("{}@{}", style(name).cyan(), style(version).green())
}

/// Format a duration in human-readable form
pub fn format_duration(millis: u128) -> String {
    if millis < 1000 {
        format!("{}ms", millis)
    } else if millis < 60000 {
        format!("{:.2}s", millis as f64 / 1000.0)
    } else {
        let seconds = millis / 1000;
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;
        format!("{}m {}s", minutes, remaining_seconds)
    }
}

/// Format a byte size in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    }
}

/// Create a progress spinner, hidden under `--quiet`
pub fn spinner(message: &str) -> indicatif::ProgressBar {
    if quiet() {
        return indicatif::ProgressBar::hidden();
    }

    let spinner = indicatif::ProgressBar::new_spinner();
    let style = indicatif::ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}
