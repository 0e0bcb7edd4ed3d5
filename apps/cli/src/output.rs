//! Output formatting for the CLI.

use clap::ValueEnum;
use serde::Serialize;

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print `value` as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn status_message(status: &str, message: &str) -> serde_json::Value {
    serde_json::json!({ "status": status, "message": message })
}

/// Print a success message.
pub fn print_success(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", message),
        OutputFormat::Json => println!("{}", status_message("success", message)),
    }
}

/// Print a progress note. Only text mode shows it, so JSON stdout stays
/// parseable.
pub fn print_progress(message: &str, format: OutputFormat) {
    if shows_progress(format) {
        eprintln!("{}", message);
    }
}

fn shows_progress(format: OutputFormat) -> bool {
    format == OutputFormat::Text
}

/// Print an error message.
pub fn print_error(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => eprintln!("{}", status_message("error", message)),
    }
}

/// Print a labelled value.
pub fn print_row(label: &str, value: &str) {
    println!("  {:<16} {}", format!("{}:", label), value);
}

/// Print a heading with a divider underneath.
pub fn print_heading(text: &str) {
    println!("\n{}", text);
    println!("{}", "-".repeat(50));
}

/// Shorten `text` to at most `width` characters for table cells.
pub fn truncate(text: &str, width: usize) -> String {
    let single_line = text.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= width {
        return single_line;
    }
    let kept: String = single_line.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}
