//! Output formatting utilities

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table, or the raw items as JSON
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No instances reported".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Human-readable age of an RFC3339 timestamp relative to `now`
pub fn format_age(timestamp: &str, now: DateTime<Utc>) -> String {
    let Ok(ts) = DateTime::parse_from_rfc3339(timestamp) else {
        return "invalid".red().to_string();
    };

    let secs = now.signed_duration_since(ts).num_seconds();
    if secs < 0 {
        "in the future".yellow().to_string()
    } else if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

/// Color an image size: green under 10 GB, yellow under 50 GB, red above
pub fn color_size(size_gb: f64) -> String {
    let formatted = format!("{:.2}", size_gb);
    if size_gb < 10.0 {
        formatted.green().to_string()
    } else if size_gb < 50.0 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}
