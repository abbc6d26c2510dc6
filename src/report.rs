//! Purpose: Human-readable lines for the export run (progress, failures, summary, fatal errors).
//! Role: Keeps wording in one place so the CLI and its tests agree.
//! Invariants: Collaborator messages are reproduced verbatim, prefixed only by the file name.
use std::error::Error as StdError;
use std::path::Path;

use nbpdf::api::{BatchReport, Error, ErrorKind, ExportFailure, ExportStatus, ExportSuccess};

pub const TROUBLESHOOTING: &str = "\
Note: The WebPDF exporter renders HTML and prints to PDF using a headless browser. You need a recent
Chromium or Chrome installed and discoverable. If you see errors about Chromium, install it and try again.";

#[derive(Copy, Clone, Debug)]
pub enum AnsiColor {
    Red,
    Yellow,
}

pub fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

pub fn success_line(success: &ExportSuccess) -> String {
    let suffix = match success.exported.status {
        ExportStatus::Written => "",
        ExportStatus::Skipped => " (exists)",
    };
    format!(
        "✓ {} -> {}{suffix}",
        file_name(&success.notebook),
        success.exported.path.display()
    )
}

pub fn failure_line(failure: &ExportFailure) -> String {
    format!(
        "Failed to export {}: {}",
        file_name(&failure.notebook),
        describe_error(&failure.error)
    )
}

pub fn summary_lines(report: &BatchReport) -> Vec<String> {
    let mut lines = vec!["Some notebooks failed to export:".to_string()];
    for failure in &report.failures {
        lines.push(format!(
            " - {}: {}",
            failure.notebook.display(),
            describe_error(&failure.error)
        ));
    }
    lines.push(TROUBLESHOOTING.to_string());
    lines
}

pub fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    )];
    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }
    if let Some(cause) = err.source() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }
    lines.join("\n")
}

/// Message plus the first cause when the message does not already include it.
fn describe_error(err: &Error) -> String {
    let message = error_message(err);
    match err.source().map(|cause| cause.to_string()) {
        Some(cause) if !message.contains(&cause) => format!("{message}: {cause}"),
        _ => message,
    }
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::Parse => "invalid notebook".to_string(),
        ErrorKind::Execute => "notebook execution failed".to_string(),
        ErrorKind::Timeout => "timed out".to_string(),
        ErrorKind::Render => "pdf rendering failed".to_string(),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
