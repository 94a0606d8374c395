//! Output formatting utilities

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
    /// JSON format, exactly as served
    Json,
}

/// Print a rounded table, or a notice when there are no rows
pub fn print_table<T: Tabled>(rows: Vec<T>, empty_message: &str) {
    if rows.is_empty() {
        print_warning(empty_message);
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a section heading
pub fn print_heading(title: &str) {
    println!("{}", title.bold());
    println!("{}", "=".repeat(60));
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Color a node condition status
pub fn color_condition(status: &str) -> String {
    match status {
        "True" => status.green().to_string(),
        "False" => status.red().to_string(),
        _ => status.yellow().to_string(),
    }
}

/// Color a temperature reading by how hot it runs
pub fn color_temperature(reading: &str) -> String {
    match reading.parse::<f64>() {
        Ok(celsius) if celsius >= 85.0 => reading.red().bold().to_string(),
        Ok(celsius) if celsius >= 70.0 => reading.yellow().to_string(),
        Ok(_) => reading.green().to_string(),
        Err(_) => reading.to_string(),
    }
}
