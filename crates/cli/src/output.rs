//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Parse a stored format name, falling back to table
    pub fn from_config(value: Option<&str>) -> Self {
        value
            .and_then(|v| OutputFormat::from_str(v, true).ok())
            .unwrap_or_default()
    }
}

/// Print rows as a table, or the raw items as JSON
pub fn print_list<R: Tabled, T: Serialize>(
    items: &[T],
    rows: impl FnOnce(&[T]) -> Vec<R>,
    empty_message: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items)?);
        }
        OutputFormat::Table => {
            if items.is_empty() {
                print_warning(empty_message);
                return Ok(());
            }
            let table = Table::new(rows(items)).with(Style::rounded()).to_string();
            println!("{}", table);
            println!("\nTotal: {}", items.len());
        }
    }
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2}Gi", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2}Mi", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}Ki", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// Format a ratio as percentage
pub fn format_percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Color alert levels, recommendation priorities and run states
pub fn color_level(level: &str) -> String {
    match level.to_lowercase().as_str() {
        "emergency" | "critical" | "unhealthy" | "stopped" => level.red().bold().to_string(),
        "high" | "poor" => level.red().to_string(),
        "warning" | "medium" | "degraded" | "fair" | "starting" => level.yellow().to_string(),
        "low" | "good" | "excellent" | "running" | "healthy" => level.green().to_string(),
        _ => level.to_string(),
    }
}

/// Color a 0..1 health or confidence score
pub fn color_score(score: f64) -> String {
    let formatted = format!("{:.2}", score);
    if score >= 0.8 {
        formatted.green().to_string()
    } else if score >= 0.6 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(1536), "1.50Ki");
        assert_eq!(format_bytes(200 * 1024 * 1024), "200.00Mi");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00Gi");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.915), "91.5%");
    }

    #[test]
    fn test_format_from_config() {
        assert_eq!(OutputFormat::from_config(Some("json")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_config(Some("JSON")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_config(Some("yaml")), OutputFormat::Table);
        assert_eq!(OutputFormat::from_config(None), OutputFormat::Table);
    }
}
