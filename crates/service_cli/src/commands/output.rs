//! Report rendering shared by all commands.

use serde::Serialize;

use crate::config::OutputFormat;
use crate::Result;

/// A command result that can be printed as a table or as JSON.
pub trait Report: Serialize {
    /// Heading printed above the table.
    fn title(&self) -> String;

    /// Key/value rows of the summary table.
    fn rows(&self) -> Vec<(&'static str, String)>;

    /// Free-form lines printed after the table.
    fn details(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Render `report` in the requested format.
pub fn render<R: Report>(report: &R, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Table => Ok(render_table(report)),
    }
}

/// Print `report` to stdout.
pub fn emit<R: Report>(report: &R, format: OutputFormat) -> Result<()> {
    println!("{}", render(report, format)?);
    Ok(())
}

fn render_table<R: Report>(report: &R) -> String {
    let rows = report.rows();
    let key_width = rows.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    let value_width = rows.iter().map(|(_, v)| v.chars().count()).max().unwrap_or(0);
    let rule = |left: char, mid: char, right: char| {
        format!(
            "{}{}{}{}{}",
            left,
            "─".repeat(key_width + 2),
            mid,
            "─".repeat(value_width + 2),
            right
        )
    };

    let mut lines = vec![report.title(), rule('┌', '┬', '┐')];
    for (key, value) in &rows {
        lines.push(format!(
            "│ {:<kw$} │ {:<vw$} │",
            key,
            value,
            kw = key_width,
            vw = value_width
        ));
    }
    lines.push(rule('└', '┴', '┘'));
    lines.extend(report.details());
    lines.join("\n")
}

/// Residual history as `iteration  norm` lines.
pub fn history_lines(label: &str, history: &[f64]) -> Vec<String> {
    if history.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![format!("{}:", label)];
    lines.extend(
        history
            .iter()
            .enumerate()
            .map(|(i, norm)| format!("{:>5}  {:.6e}", i, norm)),
    );
    lines
}
